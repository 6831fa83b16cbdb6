use std::path::PathBuf;

/// Result alias that carries the custom [`WaveVizError`] type.
pub type Result<T> = std::result::Result<T, WaveVizError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum WaveVizError {
    /// A command line or configuration value was rejected before any I/O.
    #[error("invalid value for `{option}`: {reason}")]
    InvalidArgument { option: String, reason: String },
    /// `ffprobe` could not be run or returned metadata we cannot use.
    #[error("failed to probe `{}`: {reason}", .path.display())]
    Probe { path: PathBuf, reason: String },
    /// A filter graph references pads that do not exist or reuses them.
    #[error("invalid filter graph: {0}")]
    Graph(String),
    /// The final `ffmpeg` invocation failed.
    #[error("ffmpeg failed: {0}")]
    Execution(String),
    /// The user interrupted the run.
    #[error("interrupted")]
    Interrupted,
    /// Free-form failure that fits none of the other variants.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl WaveVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_argument(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            option: option.into(),
            reason: reason.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Probe {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the downstream consumer of our output went away (EPIPE).
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::BrokenPipe)
    }
}
