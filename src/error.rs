//! Classified failures. They travel inside `anyhow::Error`; callers that care
//! about the class use `err.downcast_ref::<PrepError>()`.

use std::path::PathBuf;

const SNIPPET_MAX: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum PrepError {
    #[error("malformed record at {}:{line}: {reason}\n  record: {snippet}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        reason: String,
        snippet: String,
    },

    #[error("{what} must be created first: {} does not exist", path.display())]
    MissingPrerequisite { what: String, path: PathBuf },

    #[error("shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("duplicate name in id assignment: {name}")]
    DuplicateKey { name: String },

    #[error("duplicate id in id assignment: {id}")]
    DuplicateId { id: u32 },
}

impl PrepError {
    pub fn malformed(path: impl Into<PathBuf>, line: u64, reason: impl ToString, raw: &str) -> Self {
        let snippet = if raw.len() > SNIPPET_MAX {
            let mut end = SNIPPET_MAX;
            while !raw.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &raw[..end])
        } else {
            raw.to_string()
        };
        PrepError::MalformedRecord {
            path: path.into(),
            line,
            reason: reason.to_string(),
            snippet,
        }
    }

    pub fn shape(what: impl Into<String>, expected: usize, got: usize) -> Self {
        PrepError::ShapeMismatch { what: what.into(), expected, got }
    }
}
