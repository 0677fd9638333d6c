use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort building an index.
///
/// Per-record problems are never reported here; see [`crate::RecordError`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("corpus source {path} is unreadable: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus source {0} contains no corpus files")]
    EmptySource(PathBuf),
}

impl Error {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::SourceUnreadable { path: path.into(), source }
    }
}
