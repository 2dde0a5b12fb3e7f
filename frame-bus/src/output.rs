//! Serializes frames to a sequential sink, optionally as YUV4MPEG2.

use std::io::Write;

use crate::error::{PipeError, Result};
use crate::format::{ColorFamily, Format, VideoInfo};
use crate::frame::Frame;

pub const Y4M_FRAME_MARKER: &[u8] = b"FRAME\n";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Framing {
    /// Planes back to back, no separators.
    #[default]
    Raw,
    /// YUV4MPEG2 stream header plus a marker before each frame.
    Y4m,
}

/// Colorspace tag for the `C` field of a YUV4MPEG2 header. `Ok(None)` for
/// YUV subsamplings the container has no name for.
pub fn y4m_colorspace(format: &Format) -> Result<Option<String>> {
    let tag = match format.color_family {
        ColorFamily::Gray => {
            let mut tag = "mono".to_string();
            if format.bits_per_sample > 8 {
                tag.push_str(&format.bits_per_sample.to_string());
            }
            tag
        }
        ColorFamily::Yuv => {
            let base = match (format.sub_sampling_w, format.sub_sampling_h) {
                (1, 1) => "420",
                (1, 0) => "422",
                (0, 0) => "444",
                (2, 2) => "410",
                (2, 0) => "411",
                (0, 1) => "440",
                _ => return Ok(None),
            };
            if format.bits_per_sample > 8 {
                format!("{}p{}", base, format.bits_per_sample)
            } else {
                base.to_string()
            }
        }
        ColorFamily::Rgb => return Err(PipeError::UnsupportedFormat),
    };
    Ok(Some(tag))
}

/// Builds the single YUV4MPEG2 stream header line.
pub fn y4m_header(vi: &VideoInfo) -> Result<String> {
    let format = vi.format.ok_or(PipeError::UnsupportedFormat)?;
    let colorspace = match y4m_colorspace(&format)? {
        Some(tag) => format!("C{} ", tag),
        None => String::new(),
    };
    Ok(format!(
        "YUV4MPEG2 {}W{} H{} F{}:{} Ip A0:0\n",
        colorspace, vi.width, vi.height, vi.fps_num, vi.fps_den
    ))
}

pub struct OutputWriter {
    sink: Box<dyn Write + Send>,
    framing: Framing,
    header_written: bool,
    frames_written: usize,
    bytes_written: u64,
}

impl OutputWriter {
    pub fn new(sink: Box<dyn Write + Send>, framing: Framing) -> Self {
        Self {
            sink,
            framing,
            header_written: false,
            frames_written: 0,
            bytes_written: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Writes the container header if the framing mode has one. Does nothing
    /// once the header is out.
    pub fn write_header(&mut self, vi: &VideoInfo) -> Result<()> {
        if self.framing != Framing::Y4m || self.header_written {
            return Ok(());
        }
        let header = y4m_header(vi)?;
        self.write_bytes(header.as_bytes())?;
        self.header_written = true;
        log::debug!("y4m header: {}", header.trim_end());
        Ok(())
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.framing == Framing::Y4m {
            self.write_bytes(Y4M_FRAME_MARKER)?;
        }
        let bytes_per_sample = frame.format().bytes_per_sample;
        for plane in frame.planes() {
            for y in 0..plane.height() {
                self.write_bytes(plane.row(y, bytes_per_sample))?;
            }
        }
        self.frames_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush().map_err(PipeError::WriteFailed)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.sink.write_all(buf).map_err(PipeError::WriteFailed)?;
        self.bytes_written += buf.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod output_test;
