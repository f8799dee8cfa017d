//! Line streaming over monthly dump files (plain or zstd JSONL) and the record schema
//! the counters read.

use crate::mem::maybe_throttle_low_memory;
use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use zstd::stream::read::Decoder;

/// The fields of a Reddit comment/submission the pipeline looks at.
/// Extra fields are ignored by serde.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostRecord {
    pub author: Option<String>,
    pub subreddit: Option<String>,
    pub id: Option<String>,

    pub body: Option<String>,     // comments
    pub title: Option<String>,    // submissions
    pub selftext: Option<String>, // submissions

    pub parent_id: Option<String>, // comments: t3_ = top level, t1_ = reply
}

impl PostRecord {
    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn subreddit(&self) -> Option<&str> {
        self.subreddit.as_deref()
    }

    /// Comment body, or title + selftext for submissions.
    pub fn text(&self) -> String {
        if let Some(body) = self.body.as_deref() {
            return body.to_string();
        }
        let mut s = String::new();
        if let Some(title) = self.title.as_deref() {
            s.push_str(title);
        }
        if let Some(selftext) = self.selftext.as_deref().filter(|t| !t.is_empty()) {
            if !s.is_empty() {
                s.push('\n');
            }
            s.push_str(selftext);
        }
        s
    }
}

/// Parse one JSON line. Records without an author or a subreddit are rejected.
pub fn parse_record(line: &str) -> Result<PostRecord> {
    let rec: PostRecord = serde_json::from_str(line)?;
    if rec.author.is_none() {
        anyhow::bail!("missing `author`");
    }
    if rec.subreddit.is_none() {
        anyhow::bail!("missing `subreddit`");
    }
    Ok(rec)
}

fn is_zstd(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("zst")
}

/// Stream `path` line by line, calling `on_line(line_no, line)` with 1-based line numbers.
/// `.zst` files are decoded on the fly. Blank lines are skipped. The first error from the
/// file or from `on_line` stops the stream and is returned.
pub fn for_each_line(
    path: &Path,
    read_buf_bytes: usize,
    mut on_line: impl FnMut(u64, &str) -> Result<()>,
) -> Result<()> {
    let file = open_with_backoff(path).with_context(|| format!("open {}", path.display()))?;
    let inner: Box<dyn Read> = if is_zstd(path) {
        let mut decoder = Decoder::new(file)?;
        // large frames in the monthly dumps need the full window
        decoder.window_log_max(31)?;
        Box::new(decoder)
    } else {
        Box::new(file)
    };
    let mut reader = BufReader::with_capacity(read_buf_bytes.max(8 * 1024), inner);

    let mut buf = String::with_capacity(16 * 1024);
    let mut line_no = 0u64;
    loop {
        buf.clear();
        let n = reader
            .read_line(&mut buf)
            .with_context(|| format!("read {} after line {}", path.display(), line_no))?;
        if n == 0 {
            break;
        }
        line_no += 1;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        if buf.trim().is_empty() {
            continue;
        }
        on_line(line_no, &buf)?;
        maybe_throttle_low_memory(0.10);
    }
    Ok(())
}
