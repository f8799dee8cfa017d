#![allow(dead_code)]

use rprep::Preprocessor;
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Write a compressed `.zst` file containing the provided JSONL lines.
/// This mirrors the corpus's RC_/RS_ monthly files but with tiny content.
pub fn write_zst_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let f = File::create(path).unwrap();
    let mut enc = zstd::stream::write::Encoder::new(f, 3).unwrap();
    for l in lines {
        writeln!(&mut enc, "{}", l).unwrap();
    }
    enc.finish().unwrap();
}

/// Same, uncompressed (`.jsonl` / no extension).
pub fn write_plain_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut f = File::create(path).unwrap();
    for l in lines {
        writeln!(&mut f, "{}", l).unwrap();
    }
}

/// Read a text file line-by-line into strings (useful for .tsv).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// A top-level comment record.
pub fn comment(author: &str, subreddit: &str, body: &str) -> String {
    json!({
        "controversiality": 0, "body": body, "subreddit_id": "t5_x",
        "link_id": "t3_s1", "stickied": false, "subreddit": subreddit, "score": 1,
        "author": author, "id": "c", "parent_id": "t3_s1", "created_utc": 1136074600
    })
    .to_string()
}

/// A reply to another comment.
pub fn reply(author: &str, subreddit: &str, body: &str) -> String {
    json!({
        "body": body, "subreddit": subreddit, "author": author, "id": "r",
        "parent_id": "t1_c", "link_id": "t3_s1", "created_utc": 1136074700
    })
    .to_string()
}

pub fn submission(author: &str, subreddit: &str, title: &str, selftext: &str) -> String {
    json!({
        "archived": false, "author": author, "created_utc": 1136073600,
        "domain": "self.x", "id": "s1", "is_self": true, "num_comments": 0,
        "selftext": selftext, "title": title, "subreddit": subreddit, "score": 1
    })
    .to_string()
}

/// `n` copies of the same comment.
pub fn comments(n: usize, author: &str, subreddit: &str, body: &str) -> Vec<String> {
    (0..n).map(|_| comment(author, subreddit, body)).collect()
}

/// Fresh temp dir that outlives the test (the OS cleans it up).
pub fn temp_base() -> PathBuf {
    tempfile::tempdir().unwrap().into_path()
}

/// Preprocessor over `base/{comments,submissions}` writing to `base/work`, quiet.
pub fn prep(base: &Path) -> Preprocessor {
    Preprocessor::new()
        .input_dir(base)
        .work_dir(base.join("work"))
        .progress(false)
}

/// Three comment months for a small but complete run:
/// - alice: 25 posts in r/rust (+3 in the unpopular r/tiny)
/// - bob: 12 in r/rust, 10 in r/python
/// - carol: 5 in r/rust (too few)
/// - zzqxv_bot: 30 in r/rust (heuristic bot), AutoModerator: 30 (known bot)
pub fn make_corpus_full() -> PathBuf {
    let base = temp_base();
    let rc = base.join("comments");

    let mut jan = comments(15, "alice", "rust", "rust is great. the end");
    jan.extend(comments(3, "alice", "tiny", "nobody reads this"));
    jan.extend(comments(12, "bob", "rust", "the borrow checker"));
    jan.extend(comments(30, "zzqxv_bot", "rust", "beep boop"));
    write_zst_lines(&rc.join("RC_2006-01.zst"), &jan);

    let mut feb = comments(10, "alice", "rust", "rust is great. the end");
    feb.extend(comments(10, "bob", "python", "snakes are fine"));
    feb.extend(comments(30, "AutoModerator", "python", "rule reminder"));
    write_zst_lines(&rc.join("RC_2006-02.zst"), &feb);

    write_plain_lines(&rc.join("RC_2006-03.jsonl"), &comments(5, "carol", "rust", "hi there"));
    base
}

pub fn popularity() -> rprep::StaticPopularity {
    rprep::StaticPopularity(
        [("rust", 100_000u64), ("python", 80_000), ("tiny", 10)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}
