#[path = "common/mod.rs"]
mod common;

use common::*;
use rprep::{
    load_triplets, new_freq_map, push_pair_counts, save_triplets, EntitySet, PrepError, SparseMatrix, Triplet,
    TripletAccumulator,
};

#[test]
fn consolidation_sums_duplicates_and_drops_zeros() {
    let mut acc = TripletAccumulator::new(100);
    acc.push(0, 0, 2);
    acc.push(1, 2, 0);
    acc.push(0, 0, 3);
    acc.push(1, 1, 4);
    acc.consolidate();
    let once = acc.triplets();
    assert_eq!(once, vec![Triplet::new(0, 0, 5), Triplet::new(1, 1, 4)]);

    // consolidating an already consolidated set changes nothing
    acc.consolidate();
    assert_eq!(acc.triplets(), once);
    assert_eq!(acc.nnz(), 2);

    let again = SparseMatrix::from_triplets(2, 3, once.clone()).unwrap();
    assert_eq!(again.triplets().collect::<Vec<_>>(), once);
}

#[test]
fn threshold_bounds_the_raw_buffer() {
    let mut acc = TripletAccumulator::new(3);
    for i in 0..7u32 {
        acc.push(i % 2, 0, 1);
    }
    assert_eq!(acc.consolidations(), 2);
    assert_eq!(acc.pending_len(), 1);
    assert_eq!(acc.triplets(), vec![Triplet::new(0, 0, 4), Triplet::new(1, 0, 3)]);
}

#[test]
fn merging_accumulators_adds_counts() {
    let mut a = TripletAccumulator::new(10);
    a.extend([Triplet::new(0, 0, 1), Triplet::new(0, 1, 2)]);
    let mut b = TripletAccumulator::new(10);
    b.extend([Triplet::new(0, 1, 3), Triplet::new(2, 2, 1)]);
    a.merge(b);
    assert_eq!(
        a.triplets(),
        vec![Triplet::new(0, 0, 1), Triplet::new(0, 1, 5), Triplet::new(2, 2, 1)]
    );
}

/// With no data at all the matrix still comes back as `R x C` after a save/load.
#[test]
fn shape_survives_persistence_without_data() {
    let base = temp_base();
    let path = base.join("empty.tsv");

    let m = SparseMatrix::from_triplets(4, 3, Vec::new()).unwrap();
    assert_eq!(m.shape(), (4, 3));
    assert_eq!(m.to_persisted(), vec![Triplet::new(3, 2, 0)]);

    save_triplets(&path, &m.to_persisted()).unwrap();
    assert_eq!(read_lines(&path), vec!["3\t2\t0".to_string()]);
    let back = SparseMatrix::from_persisted(load_triplets(&path).unwrap()).unwrap();
    assert_eq!(back.shape(), (4, 3));
    assert_eq!(back.nnz(), 0);
}

#[test]
fn shape_survives_persistence_with_empty_last_row_and_column() {
    let base = temp_base();
    let path = base.join("m.tsv");
    let m = SparseMatrix::from_triplets(5, 5, vec![Triplet::new(0, 0, 1), Triplet::new(2, 1, 7)]).unwrap();
    save_triplets(&path, &m.to_persisted()).unwrap();
    let back = SparseMatrix::from_persisted(load_triplets(&path).unwrap()).unwrap();
    assert_eq!(back, m);
    assert_eq!(back.get(2, 1), 7);
    assert_eq!(back.row_values(4), &[] as &[u64]);
}

#[test]
fn sentinel_on_an_occupied_cell_adds_nothing() {
    let m = SparseMatrix::from_triplets(2, 2, vec![Triplet::new(1, 1, 7)]).unwrap();
    let persisted = m.to_persisted();
    assert_eq!(persisted, vec![Triplet::new(1, 1, 7), Triplet::new(1, 1, 0)]);
    let back = SparseMatrix::from_persisted(persisted).unwrap();
    assert_eq!(back.get(1, 1), 7);
    assert_eq!(back.nnz(), 1);
    assert_eq!(back.shape(), (2, 2));
}

#[test]
fn zero_sized_matrix_has_no_sentinel() {
    let m = SparseMatrix::from_triplets(0, 3, Vec::new()).unwrap();
    assert!(m.to_persisted().is_empty());
    let back = SparseMatrix::from_persisted(Vec::new()).unwrap();
    assert_eq!(back.shape(), (0, 0));
}

/// With the shape known up front, an empty file reads back as `0 x C`, and a
/// sentinel that disagrees with the shape is rejected.
#[test]
fn persisted_triplets_checked_against_expected_shape() {
    let back = SparseMatrix::from_persisted_with_shape(Vec::new(), (0, 3)).unwrap();
    assert_eq!(back.shape(), (0, 3));
    assert_eq!(back.nnz(), 0);

    let err = SparseMatrix::from_persisted_with_shape(vec![Triplet::new(0, 1, 2)], (0, 3)).unwrap_err();
    assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::ShapeMismatch { .. })));

    let m = SparseMatrix::from_triplets(3, 2, vec![Triplet::new(1, 0, 4)]).unwrap();
    let back = SparseMatrix::from_persisted_with_shape(m.to_persisted(), (3, 2)).unwrap();
    assert_eq!(back, m);
    let err = SparseMatrix::from_persisted_with_shape(m.to_persisted(), (4, 2)).unwrap_err();
    assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::ShapeMismatch { .. })));
}

#[test]
fn out_of_bounds_triplet_is_a_shape_mismatch() {
    let err = SparseMatrix::from_triplets(2, 2, vec![Triplet::new(2, 0, 1)]).unwrap_err();
    assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::ShapeMismatch { .. })));
    let err = SparseMatrix::from_triplets(2, 2, vec![Triplet::new(0, 5, 1)]).unwrap_err();
    assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::ShapeMismatch { .. })));
}

#[test]
fn pair_counts_become_triplets() {
    let users: EntitySet = ["alice", "bob"].into_iter().collect();
    let cats: EntitySet = ["python", "rust"].into_iter().collect();
    let (uids, cids) = (users.assign_ids(0).unwrap(), cats.assign_ids(0).unwrap());

    let mut counts = new_freq_map();
    counts.insert("alice rust".to_string(), 3);
    counts.insert("bob python".to_string(), 1);
    counts.insert("mallory rust".to_string(), 9);
    counts.insert("malformed".to_string(), 1);

    let mut acc = TripletAccumulator::new(2);
    let skipped = push_pair_counts(&mut acc, &counts, &uids, &cids);
    assert_eq!(skipped, 2);
    let m = acc.into_matrix(users.len(), cats.len()).unwrap();
    assert_eq!(m.get(0, 1), 3);
    assert_eq!(m.get(1, 0), 1);
    assert_eq!(m.total(), 4);
}
