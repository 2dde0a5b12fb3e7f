use crate::error::FrameError;
use crate::format::VideoInfo;
use crate::frame::Frame;

pub type FrameResult = Result<Frame, FrameError>;

/// Completion notification for one frame request. Called exactly once, with
/// the requested index, from whatever worker produced the frame.
pub type Completion = Box<dyn FnOnce(usize, FrameResult) + Send + 'static>;

/// Asynchronous producer of decoded frames.
pub trait FrameSource: Send + Sync {
    fn video_info(&self) -> VideoInfo;

    /// Number of workers the source renders with; used as the default
    /// number of concurrent requests.
    fn worker_count(&self) -> usize;

    /// Starts producing frame `index`. The completion may run on another
    /// thread or synchronously before this call returns.
    fn request_frame(&self, index: usize, done: Completion);
}
