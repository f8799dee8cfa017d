use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

static INIT_ONCE: std::sync::Once = std::sync::Once::new();
pub fn init_tracing_once() {
    INIT_ONCE.call_once(|| {
        let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();
    });
}

const TRIES: usize = 16;
const DELAY_MS: u64 = 50;

/// Transient errors seen on network volumes and under AV/backup filter drivers
/// (Windows sharing/lock violations, device-not-ready and friends).
fn is_retriable_io_error(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(5) | Some(21) | Some(32) | Some(33) | Some(225) | Some(433) | Some(1006) | Some(1117) | Some(1224)
    )
}

/// Run `op` until it succeeds, fails permanently, or the retries run out.
/// Delay grows linearly with the attempt number.
fn with_backoff<T>(mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) if is_retriable_io_error(&e) && attempt + 1 < TRIES => {
                attempt += 1;
                sleep(Duration::from_millis(DELAY_MS.saturating_mul(attempt as u64)));
            }
            Err(e) => return Err(e),
        }
    }
}

pub fn open_with_backoff(path: &Path) -> io::Result<File> {
    with_backoff(|| File::open(path))
}

/// Create `path` (and its parent directories).
pub fn create_with_backoff(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    with_backoff(|| File::create(path))
}

/// Remove a file; a missing file is fine.
pub fn remove_with_backoff(path: &Path) -> Result<()> {
    match with_backoff(|| fs::remove_file(path)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}

/// Promote a finished temp file to `dest`. Falls back to copy+remove when the
/// rename is refused (cross-device, sharing).
pub fn replace_file_atomic_backoff(tmp: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        remove_with_backoff(dest)?;
    }
    if with_backoff(|| fs::rename(tmp, dest)).is_ok() {
        return Ok(());
    }
    with_backoff(|| fs::copy(tmp, dest))
        .with_context(|| format!("copy {} -> {}", tmp.display(), dest.display()))?;
    remove_with_backoff(tmp)
}
