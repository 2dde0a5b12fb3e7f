//! Reference frame engine: renders synthetic clips on a tokio worker pool.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::runtime::{Handle, Runtime};

use crate::error::FrameError;
use crate::format::VideoInfo;
use crate::frame::FrameBuilder;
use crate::source::{Completion, FrameResult, FrameSource};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Every sample holds the node's `value`.
    #[default]
    Blank,
    /// Diagonal ramp that shifts by one sample per frame.
    Gradient,
    /// Every sample holds the frame index.
    Counter,
}

/// A clip the engine can render.
#[derive(Clone, Debug)]
pub struct Node {
    info: VideoInfo,
    pattern: Pattern,
    value: u32,
    fail_frames: HashSet<usize>,
    jitter_ms: u64,
}

impl Node {
    pub fn new(info: VideoInfo) -> Self {
        Self {
            info,
            pattern: Pattern::default(),
            value: 0,
            fail_frames: HashSet::new(),
            jitter_ms: 0,
        }
    }

    pub fn with_pattern(mut self, pattern: Pattern, value: u32) -> Self {
        self.pattern = pattern;
        self.value = value;
        self
    }

    /// Frames that complete with an error instead of data.
    pub fn with_failures(mut self, frames: impl IntoIterator<Item = usize>) -> Self {
        self.fail_frames = frames.into_iter().collect();
        self
    }

    /// Upper bound of the per-frame completion delay.
    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    pub fn video_info(&self) -> &VideoInfo {
        &self.info
    }

    fn jitter(&self, index: usize) -> Duration {
        if self.jitter_ms == 0 {
            return Duration::ZERO;
        }
        let ms = (index as u64).wrapping_mul(7919) % (self.jitter_ms + 1);
        Duration::from_millis(ms)
    }

    pub fn render(&self, index: usize) -> FrameResult {
        if index >= self.info.num_frames {
            return Err(FrameError::new(index, "frame index out of range"));
        }
        if self.fail_frames.contains(&index) {
            return Err(FrameError::new(index, "frame marked as failing by the script"));
        }
        let format = match self.info.format {
            Some(format) if self.info.is_constant_format() => format,
            _ => return Err(FrameError::new(index, "clip has no constant format")),
        };

        let mut builder = FrameBuilder::alloc(format, self.info.width, self.info.height);
        let mask = if format.bits_per_sample >= 32 {
            u32::MAX
        } else {
            (1u32 << format.bits_per_sample) - 1
        };
        let bps = format.bytes_per_sample;
        for p in 0..format.num_planes {
            let (w, h) = builder.plane_dimensions(p);
            for y in 0..h {
                let row = builder.row_mut(p, y);
                for x in 0..w {
                    let sample = match self.pattern {
                        Pattern::Blank => self.value,
                        Pattern::Gradient => (x + y + index + p * 64) as u32,
                        Pattern::Counter => index as u32,
                    } & mask;
                    row[x * bps..(x + 1) * bps].copy_from_slice(&sample.to_le_bytes()[..bps]);
                }
            }
        }
        Ok(builder.freeze())
    }
}

/// Runs `render`, turning a panic into a [`FrameError`] so the request still
/// completes.
fn render_guarded(index: usize, render: impl FnOnce() -> FrameResult) -> FrameResult {
    panic::catch_unwind(AssertUnwindSafe(render)).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("render of frame {} panicked: {}", index, reason);
        Err(FrameError::new(index, format!("render panicked: {}", reason)))
    })
}

/// Owns the worker pool that renders frames.
pub struct Engine {
    runtime: Option<Runtime>,
    threads: usize,
}

impl Engine {
    /// `threads == 0` uses the available parallelism.
    pub fn new(threads: usize) -> anyhow::Result<Self> {
        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            threads
        };
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(threads)
            .thread_name("frame-worker")
            .enable_time()
            .build()?;
        log::debug!("engine started with {} worker threads", threads);
        Ok(Self {
            runtime: Some(runtime),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn source(&self, node: Arc<Node>) -> anyhow::Result<EngineSource> {
        let handle = self
            .runtime
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("engine is shut down"))?
            .handle()
            .clone();
        Ok(EngineSource {
            node,
            handle,
            workers: self.threads,
        })
    }

    pub fn stop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// [`FrameSource`] view of one engine node.
pub struct EngineSource {
    node: Arc<Node>,
    handle: Handle,
    workers: usize,
}

impl FrameSource for EngineSource {
    fn video_info(&self) -> VideoInfo {
        self.node.info
    }

    fn worker_count(&self) -> usize {
        self.workers
    }

    fn request_frame(&self, index: usize, done: Completion) {
        let node = self.node.clone();
        let delay = node.jitter(index);
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let rendered = tokio::task::spawn_blocking(move || {
                let result = render_guarded(index, || node.render(index));
                done(index, result);
            })
            .await;
            if let Err(e) = rendered {
                log::error!("render task for frame {} failed: {}", index, e);
            }
        });
    }
}
