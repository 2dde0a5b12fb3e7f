use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipeError>;

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("{0}")]
    Argument(String),

    #[error("{0}")]
    Evaluation(String),

    #[error("{0}")]
    OutputNode(String),

    #[error("Can only apply y4m headers to YUV and Gray format clips")]
    UnsupportedFormat,

    #[error("frame {0} completed twice")]
    DuplicateIndex(usize),

    #[error("{0}")]
    Frame(#[from] FrameError),

    #[error("write failed: {0}")]
    WriteFailed(#[source] std::io::Error),
}

/// Failure reported by a frame source for a single request.
#[derive(Debug, Clone, Error)]
pub struct FrameError {
    pub index: usize,
    pub message: Option<String>,
}

impl FrameError {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: Some(message.into()),
        }
    }
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(msg) => write!(
                f,
                "Failed to retrieve frame {} with error: {}",
                self.index, msg
            ),
            None => write!(f, "Failed to retrieve frame {}", self.index),
        }
    }
}
