#[path = "common/mod.rs"]
mod common;

use common::*;
use rprep::{
    BotClassifier, EntitySet, EntryValidator, FileKind, MalformedPolicy, PostRecord, PrepError, Scope, Sources,
    StaticPopularity, YearMonth,
};
use std::fs;

/// Worker A sees "the" 5 times, worker B 3 times, worker C never: the merged count is 8.
#[test]
fn three_workers_merge_token_counts() {
    let base = temp_base();
    let rc = base.join("comments");
    write_zst_lines(
        &rc.join("RC_2006-01.zst"),
        &[comment("u1", "rust", "the cat and the hat"), comment("u2", "rust", "the end, the start, the one")],
    );
    write_zst_lines(&rc.join("RC_2006-02.zst"), &[comment("u3", "rust", "the a the b the c")]);
    write_zst_lines(&rc.join("RC_2006-03.zst"), &[comment("u4", "rust", "nothing here")]);

    let p = prep(&base).workers(3);
    let files = p.discover_inputs().unwrap();
    assert_eq!(files.len(), 3);

    let counts = p.count_tokens(&files, Scope::default()).unwrap();
    assert_eq!(counts.get("the"), Some(&8));
    assert_eq!(counts.get("nothing"), Some(&1));
}

#[test]
fn discovery_orders_and_filters_inputs() {
    let base = temp_base();
    let rc = base.join("comments");
    let rs = base.join("submissions");
    write_zst_lines(&rc.join("RC_2006-01.zst"), &[comment("a", "rust", "x")]);
    write_plain_lines(&rc.join("RC_2006-03.json"), &[comment("a", "rust", "x")]);
    write_plain_lines(&rc.join("RC_2006-02"), &[comment("a", "rust", "x")]);
    write_plain_lines(&rc.join("RC_2005-12.jsonl"), &[comment("a", "rust", "x")]);
    write_plain_lines(&rc.join("README.txt"), &["not a dump".to_string()]);
    write_zst_lines(&rs.join("RS_2006-01.zst"), &[submission("a", "rust", "t", "")]);

    let all_comments = prep(&base).discover_inputs().unwrap();
    let months: Vec<String> = all_comments.iter().map(|f| f.ym.to_string()).collect();
    assert_eq!(months, vec!["2005-12", "2006-01", "2006-02", "2006-03"]);

    let both = prep(&base)
        .sources(Sources::Both)
        .date_range(Some(YearMonth::new(2006, 1)), Some(YearMonth::new(2006, 2)))
        .discover_inputs()
        .unwrap();
    let got: Vec<(FileKind, String)> = both.iter().map(|f| (f.kind, f.ym.to_string())).collect();
    assert_eq!(
        got,
        vec![
            (FileKind::Comment, "2006-01".to_string()),
            (FileKind::Comment, "2006-02".to_string()),
            (FileKind::Submission, "2006-01".to_string()),
        ]
    );
}

#[test]
fn malformed_line_fails_the_pass_by_default() {
    let base = temp_base();
    let rc = base.join("comments");
    write_zst_lines(
        &rc.join("RC_2006-01.zst"),
        &[comment("a", "rust", "fine"), "{not json".to_string(), comment("b", "rust", "also fine")],
    );
    write_zst_lines(&rc.join("RC_2006-02.zst"), &[comment("c", "rust", "sibling shard")]);

    let p = prep(&base).workers(2);
    let files = p.discover_inputs().unwrap();
    let err = p.count_tokens(&files, Scope::default()).unwrap_err();
    match err.downcast_ref::<PrepError>() {
        Some(PrepError::MalformedRecord { line, snippet, path, .. }) => {
            assert_eq!(*line, 2);
            assert_eq!(snippet, "{not json");
            assert!(path.ends_with("RC_2006-01.zst"));
        }
        other => panic!("unexpected error: {other:?} / {err:#}"),
    }
}

#[test]
fn malformed_line_can_be_skipped() {
    let base = temp_base();
    write_zst_lines(
        &base.join("comments").join("RC_2006-01.zst"),
        &[
            comment("a", "rust", "fine"),
            "{not json".to_string(),
            serde_json::json!({"subreddit": "rust", "body": "no author"}).to_string(),
            comment("b", "rust", "fine"),
        ],
    );
    let p = prep(&base).malformed_policy(MalformedPolicy::SkipRecord);
    let files = p.discover_inputs().unwrap();
    let counts = p.count_tokens(&files, Scope::default()).unwrap();
    assert_eq!(counts.get("fine"), Some(&2));
    assert_eq!(counts.get("author"), None);
}

struct Picky;

impl EntryValidator for Picky {
    fn is_valid(&self, record: &PostRecord) -> anyhow::Result<bool> {
        if record.text().contains("explode") {
            anyhow::bail!("cannot judge this one");
        }
        Ok(!record.text().contains("spam"))
    }
}

#[test]
fn validator_rejects_and_errors() {
    let base = temp_base();
    let path = base.join("comments").join("RC_2006-01.zst");
    write_zst_lines(&path, &[comment("a", "rust", "good words"), comment("b", "rust", "spam spam")]);

    let p = prep(&base).validator(Picky);
    let files = p.discover_inputs().unwrap();
    let counts = p.count_tokens(&files, Scope::default()).unwrap();
    assert_eq!(counts.get("good"), Some(&1));
    assert_eq!(counts.get("spam"), None);

    write_zst_lines(&path, &[comment("a", "rust", "good words"), comment("c", "rust", "explode")]);
    let err = p.count_tokens(&files, Scope::default()).unwrap_err();
    let msg = format!("{err:#}");
    assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::MalformedRecord { line: 2, .. })), "{msg}");
    assert!(msg.contains("cannot judge"), "{msg}");

    // plain closures work as predicates too
    let p = prep(&base).validator(|r: &PostRecord| r.author() != Some("c"));
    let counts = p.count_tokens(&files, Scope::default()).unwrap();
    assert_eq!(counts.get("explode"), None);
}

#[test]
fn first_level_only_drops_replies() {
    let base = temp_base();
    write_zst_lines(
        &base.join("comments").join("RC_2006-01.zst"),
        &[comment("alice", "rust", "top"), reply("bob", "rust", "reply")],
    );
    write_zst_lines(&base.join("submissions").join("RS_2006-01.zst"), &[submission("carol", "rust", "title", "")]);
    let cats: EntitySet = ["rust"].into_iter().collect();

    let p = prep(&base).sources(Sources::Both);
    let files = p.discover_inputs().unwrap();
    let all = p.count_activity(&files, &cats).unwrap();
    assert_eq!(all.posts_of("bob"), 1);

    let fl = prep(&base).sources(Sources::Both).first_level_only(true);
    let top = fl.count_activity(&files, &cats).unwrap();
    assert_eq!(top.posts_of("alice"), 1);
    assert_eq!(top.posts_of("carol"), 1);
    assert_eq!(top.posts_of("bob"), 0);
}

#[test]
fn activity_is_cached_per_input_file() {
    let base = temp_base();
    let path = base.join("comments").join("RC_2006-01.zst");
    write_zst_lines(&path, &comments(3, "alice", "rust", "hello"));
    let cats: EntitySet = ["rust"].into_iter().collect();

    let p = prep(&base);
    let files = p.discover_inputs().unwrap();
    let first = p.count_activity(&files, &cats).unwrap();
    assert_eq!(first.posts_of("alice"), 3);
    assert_eq!(first.user_category.get("alice rust"), Some(&3));
    assert!(p.layout().activity_for(&path).exists());

    // the input is no longer readable, but its cached counts are
    write_plain_lines(&path, &["{garbage".to_string()]);
    let again = p.count_activity(&files, &cats).unwrap();
    assert_eq!(again.posts_of("alice"), 3);

    assert!(prep(&base).overwrite(true).count_activity(&files, &cats).is_err());
}

#[test]
fn existing_artifacts_are_reused_unless_overwriting() {
    let base = temp_base();
    let p = prep(&base).min_subscribers(50_000);

    let built = p.valid_categories(&popularity()).unwrap();
    assert!(!built.was_reused());
    let names: Vec<&str> = built.value.iter().collect();
    assert_eq!(names, vec!["python", "rust"]);

    // a different source is not consulted while the artifact exists
    let reused = p.valid_categories(&StaticPopularity::default()).unwrap();
    assert!(reused.was_reused());
    assert_eq!(reused.value, built.value);

    let rebuilt = p.clone().overwrite(true).valid_categories(&StaticPopularity::default()).unwrap();
    assert!(!rebuilt.was_reused());
    assert!(rebuilt.value.is_empty());
}

#[test]
fn text_to_ids_requires_the_text_export() {
    let base = make_corpus_full();
    let p = prep(&base);
    let users: EntitySet = ["alice"].into_iter().collect();
    let cats: EntitySet = ["rust"].into_iter().collect();
    let (vocab, _) = rprep::Vocabulary::from_counts(&rprep::new_freq_map(), 10).unwrap();

    let err = p.text_to_ids(&vocab, &users, &cats).unwrap_err();
    assert!(matches!(err.downcast_ref::<PrepError>(), Some(PrepError::MissingPrerequisite { .. })), "{err:#}");
    assert!(!p.layout().text_ids().exists());
}

#[test]
fn full_pipeline_step_by_step() {
    let base = make_corpus_full();
    let p = prep(&base)
        .workers(4)
        .min_posts(20)
        .min_subscribers(50_000)
        .vocab_size(10)
        .h_index_min(2)
        .consolidate_every(7);
    let layout = p.layout();

    let files = p.discover_inputs().unwrap();
    assert_eq!(files.len(), 3);

    let cats = p.valid_categories(&popularity()).unwrap().into_inner();
    assert_eq!(cats.len(), 2);

    let activity = p.count_activity(&files, &cats).unwrap();
    assert_eq!(activity.posts_of("alice"), 25);
    assert_eq!(activity.posts_of("bob"), 22);
    assert_eq!(activity.user_category.get("alice tiny"), None);

    let mut bots = BotClassifier::new();
    let users = p.valid_users(&activity, &mut bots).unwrap().into_inner();
    let names: Vec<&str> = users.iter().collect();
    assert_eq!(names, vec!["alice", "bob"]);
    let known: Vec<String> = serde_json::from_str(&fs::read_to_string(layout.known_bots()).unwrap()).unwrap();
    assert!(known.iter().any(|n| n == "zzqxv_bot"));

    let vocab = p.build_vocab(&files, &users, &cats).unwrap().into_inner();
    assert_eq!(vocab.len(), 10);
    assert!(vocab.id("the").is_some());
    assert!(vocab.id("borrow").is_some());
    assert!(vocab.id("checker").is_none());
    let report = read_lines(&layout.vocab_report());
    assert_eq!(report[0], "the  37");

    let matrix = p.build_matrix(&files, &users, &cats).unwrap().into_inner();
    assert_eq!(matrix.shape(), (2, 2));
    assert_eq!(matrix.nnz(), 3);
    // alice = 0, bob = 1; python = 0, rust = 1
    assert_eq!(matrix.get(0, 1), 25);
    assert_eq!(matrix.get(1, 0), 10);
    assert_eq!(matrix.get(1, 1), 12);

    let from_activity = p.matrix_from_activity(&activity, &users, &cats).unwrap().into_inner();
    assert_eq!(from_activity, matrix);

    let lm = p.lm_valid_users(&users, &matrix).unwrap().into_inner();
    let lm_names: Vec<&str> = lm.iter().collect();
    assert_eq!(lm_names, vec!["bob"]);

    let text_lines = p.export_text(&files, &users, &cats).unwrap().into_inner();
    assert_eq!(text_lines, 47);
    let text = read_lines(&layout.text());
    assert_eq!(text.iter().filter(|l| l.starts_with("alice\trust\t")).count(), 25);
    assert!(text.iter().all(|l| !l.contains("tiny") && !l.contains("beep")));

    let id_lines = p.text_to_ids(&vocab, &users, &cats).unwrap().into_inner();
    assert_eq!(id_lines, 47);
    let ids = read_lines(&layout.text_ids());
    let v = |t: &str| vocab.id(t).unwrap();
    let alice_line = format!(
        "1\t2\t{} {} {} {}\t{} {}",
        v("rust"),
        v("is"),
        v("great"),
        v("."),
        v("the"),
        v("end")
    );
    let unk = vocab.unk_id();
    let bob_python = format!("2\t1\t{unk} {unk} {unk}");
    assert_eq!(ids.iter().filter(|l| **l == alice_line).count(), 25);
    assert_eq!(ids.iter().filter(|l| **l == bob_python).count(), 10);
}

/// No user survives the filters: the `0 x C` matrix is saved empty and reused as `0 x C`.
#[test]
fn matrix_without_users_is_reused() {
    let base = make_corpus_full();
    let p = prep(&base).workers(2);
    let files = p.discover_inputs().unwrap();
    let cats: EntitySet = ["python", "rust"].into_iter().collect();
    let nobody = EntitySet::new();

    let first = p.build_matrix(&files, &nobody, &cats).unwrap();
    assert!(!first.was_reused());
    assert_eq!(first.value.shape(), (0, 2));

    let second = p.build_matrix(&files, &nobody, &cats).unwrap();
    assert!(second.was_reused());
    assert_eq!(second.value.shape(), (0, 2));
    assert_eq!(second.value.nnz(), 0);
}

#[test]
fn run_twice_reuses_everything() {
    let base = make_corpus_full();
    let p = prep(&base).workers(2).min_posts(20).vocab_size(10).h_index_min(2);

    let first = p.run(&popularity()).unwrap();
    assert_eq!(first.inputs, 3);
    assert_eq!(first.categories, 2);
    assert_eq!(first.users, 2);
    assert_eq!(first.lm_users, 1);
    assert_eq!(first.vocab, 10);
    assert_eq!(first.matrix_shape, (2, 2));
    assert_eq!(first.matrix_nnz, 3);
    assert_eq!(first.text_lines, 47);
    assert_eq!(first.text_id_lines, 47);

    let second = p.run(&StaticPopularity::default()).unwrap();
    assert_eq!(second, first);
}
