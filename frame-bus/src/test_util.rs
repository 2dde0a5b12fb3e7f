//! Sinks and frame sources shared by the unit tests.

use std::collections::HashSet;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::FrameError;
use crate::format::{Format, VideoInfo};
use crate::frame::{Frame, FrameBuilder};
use crate::source::{Completion, FrameSource};

#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Accepts `remaining` bytes, then reports a broken pipe.
pub struct FailingSink {
    remaining: usize,
    inner: SharedBuf,
}

impl FailingSink {
    pub fn after(remaining: usize) -> Self {
        Self::with_buf(remaining, SharedBuf::new())
    }

    pub fn with_buf(remaining: usize, inner: SharedBuf) -> Self {
        Self { remaining, inner }
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        let n = buf.len().min(self.remaining);
        self.remaining -= n;
        self.inner.write(&buf[..n])
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Frame whose every sample holds `value`, little-endian.
pub fn filled_frame(format: Format, width: usize, height: usize, value: u32) -> Frame {
    let mut builder = FrameBuilder::alloc(format, width, height);
    let bytes = value.to_le_bytes();
    let sample = &bytes[..format.bytes_per_sample];
    for p in 0..format.num_planes {
        let (_, h) = builder.plane_dimensions(p);
        for y in 0..h {
            for chunk in builder.row_mut(p, y).chunks_mut(sample.len()) {
                chunk.copy_from_slice(sample);
            }
        }
    }
    builder.freeze()
}

pub const TEST_WIDTH: usize = 3;
pub const TEST_HEIGHT: usize = 2;

/// 3x2 Gray8 frame filled with the low byte of `index`.
pub fn index_frame(index: usize) -> Frame {
    filled_frame(Format::GRAY8, TEST_WIDTH, TEST_HEIGHT, index as u32 & 0xFF)
}

/// Expected raw output for the given [`index_frame`] indices, in order.
pub fn expected_raw(indices: impl IntoIterator<Item = usize>) -> Vec<u8> {
    indices
        .into_iter()
        .flat_map(|i| vec![(i & 0xFF) as u8; TEST_WIDTH * TEST_HEIGHT])
        .collect()
}

pub fn test_video_info(num_frames: usize) -> VideoInfo {
    VideoInfo {
        format: Some(Format::GRAY8),
        width: TEST_WIDTH,
        height: TEST_HEIGHT,
        fps_num: 25,
        fps_den: 1,
        num_frames,
    }
}

#[derive(Default)]
pub struct RequestLog {
    pub requested: Vec<usize>,
    pub outstanding: usize,
    pub max_outstanding: usize,
}

/// Hands every request to the test through a channel; the test decides when
/// and in which order completions fire.
pub struct ManualSource {
    info: VideoInfo,
    workers: usize,
    tx: Mutex<Sender<(usize, Completion)>>,
    pub log: Arc<Mutex<RequestLog>>,
}

impl ManualSource {
    pub fn new(num_frames: usize, workers: usize) -> (Arc<Self>, Receiver<(usize, Completion)>) {
        let (tx, rx) = channel();
        let source = Arc::new(Self {
            info: test_video_info(num_frames),
            workers,
            tx: Mutex::new(tx),
            log: Arc::new(Mutex::new(RequestLog::default())),
        });
        (source, rx)
    }
}

impl FrameSource for ManualSource {
    fn video_info(&self) -> VideoInfo {
        self.info
    }

    fn worker_count(&self) -> usize {
        self.workers
    }

    fn request_frame(&self, index: usize, done: Completion) {
        {
            let mut log = self.log.lock().unwrap();
            log.requested.push(index);
            log.outstanding += 1;
            log.max_outstanding = log.max_outstanding.max(log.outstanding);
        }
        let log = self.log.clone();
        let done: Completion = Box::new(move |n, result| {
            log.lock().unwrap().outstanding -= 1;
            done(n, result)
        });
        self.tx.lock().unwrap().send((index, done)).unwrap();
    }
}

/// Completes every request synchronously inside `request_frame`.
pub struct InlineSource {
    info: VideoInfo,
    fail: HashSet<usize>,
    pub log: Mutex<RequestLog>,
}

impl InlineSource {
    pub fn new(num_frames: usize, fail: impl IntoIterator<Item = usize>) -> Arc<Self> {
        Arc::new(Self {
            info: test_video_info(num_frames),
            fail: fail.into_iter().collect(),
            log: Mutex::new(RequestLog::default()),
        })
    }
}

impl FrameSource for InlineSource {
    fn video_info(&self) -> VideoInfo {
        self.info
    }

    fn worker_count(&self) -> usize {
        1
    }

    fn request_frame(&self, index: usize, done: Completion) {
        self.log.lock().unwrap().requested.push(index);
        if self.fail.contains(&index) {
            done(index, Err(FrameError::new(index, "inline failure")));
        } else {
            done(index, Ok(index_frame(index)));
        }
    }
}

/// Completes each request on its own thread after a per-index delay, so
/// completions land in an order unrelated to the request order.
pub struct ThreadedSource {
    info: VideoInfo,
    delay: fn(usize) -> Duration,
    fail: HashSet<usize>,
    pub log: Arc<Mutex<RequestLog>>,
}

impl ThreadedSource {
    pub fn new(
        num_frames: usize,
        delay: fn(usize) -> Duration,
        fail: impl IntoIterator<Item = usize>,
    ) -> Arc<Self> {
        Arc::new(Self {
            info: test_video_info(num_frames),
            delay,
            fail: fail.into_iter().collect(),
            log: Arc::new(Mutex::new(RequestLog::default())),
        })
    }
}

impl FrameSource for ThreadedSource {
    fn video_info(&self) -> VideoInfo {
        self.info
    }

    fn worker_count(&self) -> usize {
        4
    }

    fn request_frame(&self, index: usize, done: Completion) {
        {
            let mut log = self.log.lock().unwrap();
            log.requested.push(index);
            log.outstanding += 1;
            log.max_outstanding = log.max_outstanding.max(log.outstanding);
        }
        let delay = (self.delay)(index);
        let fails = self.fail.contains(&index);
        let log = self.log.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            log.lock().unwrap().outstanding -= 1;
            if fails {
                done(index, Err(FrameError::new(index, "threaded failure")));
            } else {
                done(index, Ok(index_frame(index)));
            }
        });
    }
}
