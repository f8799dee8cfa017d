//! Persistence of intermediate structures and the idempotent build contract:
//! an artifact that already exists is loaded, not rebuilt, unless overwrite is set.

use crate::sparse::Triplet;
use crate::util::{create_with_backoff, open_with_backoff, replace_file_atomic_backoff};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Whether an artifact was computed by this call or found on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Built,
    Reused,
}

#[derive(Debug)]
pub struct Artifact<T> {
    pub value: T,
    pub origin: Origin,
    pub path: PathBuf,
}

impl<T> Artifact<T> {
    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn was_reused(&self) -> bool {
        self.origin == Origin::Reused
    }
}

/// Load `path` if it exists and `overwrite` is off; otherwise run `build`, which is
/// responsible for writing `path`.
pub fn ensure_with<T>(
    path: &Path,
    overwrite: bool,
    load: impl FnOnce(&Path) -> Result<T>,
    build: impl FnOnce() -> Result<T>,
) -> Result<Artifact<T>> {
    if path.exists() && !overwrite {
        tracing::info!(path = %path.display(), "exists, reusing");
        let value = load(path).with_context(|| format!("load {}", path.display()))?;
        return Ok(Artifact { value, origin: Origin::Reused, path: path.to_path_buf() });
    }
    tracing::info!(path = %path.display(), "making");
    let value = build()?;
    Ok(Artifact { value, origin: Origin::Built, path: path.to_path_buf() })
}

/// [`ensure_with`] for JSON-serialisable values: `build` only computes, saving is done here.
pub fn ensure_json<T>(path: &Path, overwrite: bool, build: impl FnOnce() -> Result<T>) -> Result<Artifact<T>>
where
    T: Serialize + DeserializeOwned,
{
    ensure_with(path, overwrite, load_json, || {
        let value = build()?;
        save_json(path, &value)?;
        Ok(value)
    })
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("artifact"));
    name.push(".inprogress");
    path.with_file_name(name)
}

const DEFAULT_WRITE_BUF: usize = 256 * 1024;

/// Write through a buffered temp file next to `path`, then promote it.
/// Readers never see a half-written artifact.
pub fn write_atomic(path: &Path, f: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    write_atomic_with(path, DEFAULT_WRITE_BUF, f)
}

pub fn write_atomic_with(path: &Path, buf_bytes: usize, f: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let tmp = staging_path(path);
    {
        let file = create_with_backoff(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut w = BufWriter::with_capacity(buf_bytes, file);
        f(&mut w)?;
        w.flush().with_context(|| format!("flush {}", tmp.display()))?;
    }
    replace_file_atomic_backoff(&tmp, path)
}

pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |w| {
        serde_json::to_writer(&mut *w, value)?;
        Ok(())
    })
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let f = open_with_backoff(path).with_context(|| format!("open {}", path.display()))?;
    let r = BufReader::new(f);
    serde_json::from_reader(r).with_context(|| format!("parse {}", path.display()))
}

/// `row\tcol\tvalue` lines.
pub fn save_triplets(path: &Path, triplets: &[Triplet]) -> Result<()> {
    write_atomic(path, |w| {
        for t in triplets {
            writeln!(w, "{}\t{}\t{}", t.row, t.col, t.value)?;
        }
        Ok(())
    })
}

pub fn load_triplets(path: &Path) -> Result<Vec<Triplet>> {
    let f = open_with_backoff(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut it = line.split('\t');
        let mut field = |what: &str| -> Result<u64> {
            let raw = it.next().with_context(|| format!("{}:{}: missing {what}", path.display(), i + 1))?;
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{}:{}: bad {what} {raw:?}", path.display(), i + 1))
        };
        let row = field("row")?;
        let col = field("col")?;
        let value = field("value")?;
        out.push(Triplet::new(u32::try_from(row)?, u32::try_from(col)?, value));
    }
    Ok(out)
}

/// Human-readable `(token, count)` report, two-space separated.
pub fn save_report(path: &Path, rows: &[(String, u64)]) -> Result<()> {
    write_atomic(path, |w| {
        for (token, count) in rows {
            writeln!(w, "{token}  {count}")?;
        }
        Ok(())
    })
}

/// One string per line.
pub fn save_lines<S: AsRef<str>>(path: &Path, lines: &[S]) -> Result<()> {
    write_atomic(path, |w| {
        for l in lines {
            w.write_all(l.as_ref().as_bytes())?;
            w.write_all(b"\n")?;
        }
        Ok(())
    })
}
