//! Bounded, ordered frame pipeline.
//!
//! A [`Pipeline`] keeps at most `requests` frame requests outstanding against
//! its [`FrameSource`]. Completions arrive on the source's workers in any
//! order; each one is handled under a single lock: the frame is parked in the
//! [`ReorderBuffer`], the contiguous run starting at the next output index is
//! written, and one new request is admitted. The driving thread sleeps on a
//! [`Gate`] until every issued request has completed.
//!
//! A source may complete a frame synchronously inside `request_frame`. The
//! follow-up request that completion admits is queued on the calling thread
//! and sent by the outermost `request` on that thread, so such a source runs
//! in a loop instead of recursing once per frame.
//!
//! The first failure (a frame error or a write error) is sticky. It shrinks
//! the target to the requests already issued, so nothing new is requested,
//! and the pipeline keeps draining the in-flight completions before
//! reporting the error.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::{FrameError, PipeError, Result};
use crate::format::VideoInfo;
use crate::frame::Frame;
use crate::gate::Gate;
use crate::output::OutputWriter;
use crate::reorder::ReorderBuffer;
use crate::source::{FrameResult, FrameSource};

#[derive(Clone, Debug)]
pub struct PipelineReport {
    pub frames_written: usize,
    pub bytes_written: u64,
    pub requests: usize,
    pub elapsed: Duration,
}

impl PipelineReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames_written as f64 / secs
        } else {
            0.0
        }
    }
}

struct State {
    writer: OutputWriter,
    reorder: ReorderBuffer,
    output_index: usize,
    requested: usize,
    completed: usize,
    total: usize,
    error: Option<PipeError>,
    // lowest index reported as failed; nothing at or past it is ever written
    failed_at: Option<usize>,
    write_failed: bool,
}

impl State {
    fn finished(&self) -> bool {
        self.completed == self.total
    }

    fn fail(&mut self, err: PipeError) {
        if self.error.is_none() {
            log::error!("pipeline failed: {}", err);
            self.error = Some(err);
        } else {
            log::debug!("pipeline already failed, ignoring: {}", err);
        }
        self.total = self.requested;
    }

    fn fail_frame(&mut self, err: FrameError) {
        let index = err.index;
        if self.failed_at.is_none_or(|k| index < k) {
            self.failed_at = Some(index);
            let dropped = self.reorder.discard_from(index);
            if dropped > 0 {
                log::debug!("discarded {} buffered frames past {}", dropped, index);
            }
        }
        self.fail(err.into());
    }

    fn deliver(&mut self, index: usize, frame: Frame) {
        if self.write_failed || self.failed_at.is_some_and(|k| index > k) {
            log::trace!("discarding frame {}", index);
            return;
        }
        if index < self.output_index {
            self.fail(PipeError::DuplicateIndex(index));
            return;
        }
        if let Err(e) = self.reorder.insert(index, frame) {
            self.fail(e);
            return;
        }

        let start = self.output_index;
        let mut write_error = None;
        for (n, frame) in self.reorder.drain_prefix(start) {
            self.output_index = n + 1;
            if self.write_failed {
                log::trace!("discarding frame {} after write error", n);
                continue;
            }
            match self.writer.write_frame(&frame) {
                Ok(()) => log::trace!("wrote frame {}", n),
                Err(e) => {
                    self.write_failed = true;
                    write_error = Some(e);
                }
            }
        }
        if let Some(e) = write_error {
            self.fail(e);
        }
    }

    /// Claims the next index to request, if the target allows one more.
    fn admit(&mut self) -> Option<usize> {
        if self.requested < self.total {
            let n = self.requested;
            self.requested += 1;
            Some(n)
        } else {
            None
        }
    }
}

thread_local! {
    // Some while this thread is inside `Shared::request`; nested requests
    // land here and are sent by the outermost call.
    static DEFERRED: RefCell<Option<VecDeque<(Arc<Shared>, usize)>>> =
        const { RefCell::new(None) };
}

/// Ends the outermost `request` on this thread, even if the source panics.
struct DeferScope;

impl DeferScope {
    /// Returns None when this thread is already inside `request`, after
    /// queueing the request for the outer call.
    fn enter(shared: &Arc<Shared>, index: usize) -> Option<Self> {
        DEFERRED.with(|deferred| {
            let mut deferred = deferred.borrow_mut();
            if let Some(queue) = deferred.as_mut() {
                queue.push_back((Arc::clone(shared), index));
                return None;
            }
            *deferred = Some(VecDeque::new());
            Some(DeferScope)
        })
    }

    fn pop(&self) -> Option<(Arc<Shared>, usize)> {
        DEFERRED.with(|deferred| deferred.borrow_mut().as_mut()?.pop_front())
    }
}

impl Drop for DeferScope {
    fn drop(&mut self) {
        let leftover = DEFERRED.with(|deferred| deferred.borrow_mut().take());
        drop(leftover);
    }
}

struct Shared {
    source: Arc<dyn FrameSource>,
    state: Mutex<State>,
    gate: Gate,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Requests go out with the lock released: a source may complete the
    // frame synchronously, re-entering `complete` on this thread.
    fn request(shared: &Arc<Shared>, index: usize) {
        let Some(scope) = DeferScope::enter(shared, index) else {
            return;
        };
        Shared::send(shared, index);
        while let Some((owner, index)) = scope.pop() {
            Shared::send(&owner, index);
        }
    }

    fn send(shared: &Arc<Shared>, index: usize) {
        log::trace!("request frame {}", index);
        let owner = Arc::clone(shared);
        shared.source.request_frame(
            index,
            Box::new(move |n, result| Shared::complete(&owner, n, result)),
        );
    }

    fn complete(shared: &Arc<Shared>, index: usize, result: FrameResult) {
        let (next, finished) = {
            let mut state = shared.lock();
            state.completed += 1;
            match result {
                Ok(frame) => state.deliver(index, frame),
                Err(err) => state.fail_frame(err),
            }
            (state.admit(), state.finished())
        };
        if let Some(n) = next {
            Shared::request(shared, n);
        }
        if finished && shared.gate.open() {
            log::debug!("all requested frames completed");
        }
    }
}

pub struct Pipeline {
    shared: Arc<Shared>,
    video_info: VideoInfo,
    requests: usize,
}

impl Pipeline {
    /// `requests` bounds the outstanding frame requests; 0 uses the source's
    /// worker count.
    pub fn new(
        source: Arc<dyn FrameSource>,
        writer: OutputWriter,
        requests: usize,
    ) -> Result<Self> {
        let video_info = source.video_info();
        Self::check_streamable(&video_info)?;
        let requests = if requests < 1 {
            source.worker_count().max(1)
        } else {
            requests
        };
        let state = State {
            writer,
            reorder: ReorderBuffer::with_capacity(requests),
            output_index: 0,
            requested: 0,
            completed: 0,
            total: video_info.num_frames,
            error: None,
            failed_at: None,
            write_failed: false,
        };
        Ok(Self {
            shared: Arc::new(Shared {
                source,
                state: Mutex::new(state),
                gate: Gate::new(),
            }),
            video_info,
            requests,
        })
    }

    /// Only clips with one known format and a known, non-zero length can be
    /// streamed.
    pub fn check_streamable(video_info: &VideoInfo) -> Result<()> {
        if !video_info.is_constant_format() || video_info.num_frames == 0 {
            return Err(PipeError::OutputNode(
                "Cannot output clips with varying dimensions or unknown length".to_string(),
            ));
        }
        Ok(())
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn video_info(&self) -> &VideoInfo {
        &self.video_info
    }

    /// Streams every frame, blocking until the last request has completed.
    pub fn run(self) -> Result<PipelineReport> {
        let started = Instant::now();
        log::info!(
            "pipeline start: {}, {} concurrent requests",
            self.video_info,
            self.requests
        );

        let initial = {
            let mut state = self.shared.lock();
            state.writer.write_header(&self.video_info)?;
            let initial = self.requests.min(state.total);
            state.requested = initial;
            initial
        };
        for n in 0..initial {
            Shared::request(&self.shared, n);
        }

        let mut state = self.shared.gate.wait(self.shared.lock(), State::finished);

        let leftover = state.reorder.clear();
        if leftover > 0 {
            log::debug!("released {} frames that could not be written", leftover);
        }
        let flushed = state.writer.flush();
        if let Some(err) = state.error.take() {
            return Err(err);
        }
        flushed?;

        let report = PipelineReport {
            frames_written: state.writer.frames_written(),
            bytes_written: state.writer.bytes_written(),
            requests: self.requests,
            elapsed: started.elapsed(),
        };
        log::info!(
            "pipeline finished: {} frames, {} bytes in {:.2}s ({:.2} fps)",
            report.frames_written,
            report.bytes_written,
            report.elapsed.as_secs_f64(),
            report.fps()
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
