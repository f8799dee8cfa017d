use anyhow::Result;
use rprep::{Preprocessor, Sources, TsvPopularity, YearMonth};
use std::path::PathBuf;

const DATA_ROOT: &str = "./data";
const WORK_ROOT: &str = "./prep_work";
const SUBSCRIBERS_TSV: &str = "./data/subscribers.tsv";

fn main() -> Result<()> {
    let base_dir = PathBuf::from(DATA_ROOT);
    let work_dir = PathBuf::from(WORK_ROOT);
    let hw = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(8);

    let start = YearMonth::new(2006, 1);
    let end = YearMonth::new(2006, 4);

    let summary = Preprocessor::new()
        .input_dir(&base_dir)
        .work_dir(&work_dir)
        .sources(Sources::Comments)
        .date_range(Some(start), Some(end))
        .workers(hw)
        .min_subscribers(50_000)
        .min_posts(100)
        .vocab_size(25_000)
        .h_index_min(10)
        .progress(true)
        .run(&TsvPopularity::new(SUBSCRIBERS_TSV))?;

    println!(
        "{} files: {} subreddits, {} users ({} for language modelling), vocab {}, matrix {}x{} ({} nonzero), {} text lines",
        summary.inputs,
        summary.categories,
        summary.users,
        summary.lm_users,
        summary.vocab,
        summary.matrix_shape.0,
        summary.matrix_shape.1,
        summary.matrix_nnz,
        summary.text_lines,
    );
    Ok(())
}
