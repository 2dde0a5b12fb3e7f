//! Pixel format descriptors and clip-level video info.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorFamily {
    Gray,
    Yuv,
    Rgb,
}

/// Planar pixel format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Format {
    pub name: &'static str,
    pub color_family: ColorFamily,
    pub bits_per_sample: u32,
    pub bytes_per_sample: usize,
    /// log2 horizontal chroma subsampling
    pub sub_sampling_w: u32,
    /// log2 vertical chroma subsampling
    pub sub_sampling_h: u32,
    pub num_planes: usize,
}

const fn preset(
    name: &'static str,
    color_family: ColorFamily,
    bits_per_sample: u32,
    sub_sampling_w: u32,
    sub_sampling_h: u32,
) -> Format {
    Format {
        name,
        color_family,
        bits_per_sample,
        bytes_per_sample: if bits_per_sample > 8 { 2 } else { 1 },
        sub_sampling_w,
        sub_sampling_h,
        num_planes: match color_family {
            ColorFamily::Gray => 1,
            _ => 3,
        },
    }
}

impl Format {
    pub const GRAY8: Format = preset("Gray8", ColorFamily::Gray, 8, 0, 0);
    pub const GRAY16: Format = preset("Gray16", ColorFamily::Gray, 16, 0, 0);
    pub const YUV420P8: Format = preset("YUV420P8", ColorFamily::Yuv, 8, 1, 1);
    pub const YUV422P8: Format = preset("YUV422P8", ColorFamily::Yuv, 8, 1, 0);
    pub const YUV444P8: Format = preset("YUV444P8", ColorFamily::Yuv, 8, 0, 0);
    pub const YUV410P8: Format = preset("YUV410P8", ColorFamily::Yuv, 8, 2, 2);
    pub const YUV411P8: Format = preset("YUV411P8", ColorFamily::Yuv, 8, 2, 0);
    pub const YUV440P8: Format = preset("YUV440P8", ColorFamily::Yuv, 8, 0, 1);
    pub const YUV420P10: Format = preset("YUV420P10", ColorFamily::Yuv, 10, 1, 1);
    pub const YUV420P16: Format = preset("YUV420P16", ColorFamily::Yuv, 16, 1, 1);
    pub const YUV422P10: Format = preset("YUV422P10", ColorFamily::Yuv, 10, 1, 0);
    pub const YUV444P10: Format = preset("YUV444P10", ColorFamily::Yuv, 10, 0, 0);
    pub const YUV444P16: Format = preset("YUV444P16", ColorFamily::Yuv, 16, 0, 0);
    pub const RGB24: Format = preset("RGB24", ColorFamily::Rgb, 8, 0, 0);
    pub const RGB48: Format = preset("RGB48", ColorFamily::Rgb, 16, 0, 0);

    pub const PRESETS: [Format; 15] = [
        Self::GRAY8,
        Self::GRAY16,
        Self::YUV420P8,
        Self::YUV422P8,
        Self::YUV444P8,
        Self::YUV410P8,
        Self::YUV411P8,
        Self::YUV440P8,
        Self::YUV420P10,
        Self::YUV420P16,
        Self::YUV422P10,
        Self::YUV444P10,
        Self::YUV444P16,
        Self::RGB24,
        Self::RGB48,
    ];

    /// Plane dimensions for a frame of `width` x `height`. Only YUV chroma
    /// planes are subsampled.
    pub fn plane_dimensions(&self, plane: usize, width: usize, height: usize) -> (usize, usize) {
        if plane == 0 || self.color_family != ColorFamily::Yuv {
            (width, height)
        } else {
            (width >> self.sub_sampling_w, height >> self.sub_sampling_h)
        }
    }

    /// Size in bytes of one frame's planes with stride padding removed.
    pub fn frame_size(&self, width: usize, height: usize) -> usize {
        (0..self.num_planes)
            .map(|p| {
                let (w, h) = self.plane_dimensions(p, width, height);
                w * h * self.bytes_per_sample
            })
            .sum()
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRESETS
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown format: {}", s))
    }
}

/// Clip-level properties reported by a frame source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoInfo {
    /// None when the clip changes format between frames.
    pub format: Option<Format>,
    /// 0 when the clip changes dimensions between frames.
    pub width: usize,
    pub height: usize,
    pub fps_num: u64,
    pub fps_den: u64,
    pub num_frames: usize,
}

impl VideoInfo {
    pub fn is_constant_format(&self) -> bool {
        self.format.is_some() && self.width > 0 && self.height > 0
    }

    pub fn frame_size(&self) -> usize {
        self.format
            .map(|f| f.frame_size(self.width, self.height))
            .unwrap_or(0)
    }
}

impl Display for VideoInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let format = self.format.map(|f| f.name).unwrap_or("variable");
        write!(
            f,
            "{} {}x{} {}/{} fps, {} frames",
            format, self.width, self.height, self.fps_num, self.fps_den, self.num_frames
        )
    }
}
