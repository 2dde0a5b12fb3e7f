use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::format::Format;

/// Row alignment used when allocating planes.
pub const STRIDE_ALIGN: usize = 32;

#[derive(Clone, Debug)]
pub struct Plane {
    data: Bytes,
    stride: usize,
    width: usize,
    height: usize,
}

impl Plane {
    pub fn new(data: Bytes, stride: usize, width: usize, height: usize) -> Self {
        Self {
            data,
            stride,
            width,
            height,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Visible bytes of row `y`, without stride padding.
    pub fn row(&self, y: usize, bytes_per_sample: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width * bytes_per_sample]
    }
}

struct FrameInner {
    format: Format,
    planes: Vec<Plane>,
}

/// Immutable, cheaply clonable handle to decoded planar data.
#[derive(Clone)]
pub struct Frame {
    inner: Arc<FrameInner>,
}

impl Frame {
    pub fn new(format: Format, planes: Vec<Plane>) -> anyhow::Result<Self> {
        if planes.len() != format.num_planes {
            anyhow::bail!(
                "{} expects {} planes, got {}",
                format,
                format.num_planes,
                planes.len()
            );
        }
        for (p, plane) in planes.iter().enumerate() {
            let row_size = plane.width * format.bytes_per_sample;
            if plane.stride < row_size {
                anyhow::bail!(
                    "plane {} stride {} shorter than row size {}",
                    p,
                    plane.stride,
                    row_size
                );
            }
            let needed = plane.height.saturating_sub(1) * plane.stride + row_size;
            if plane.height > 0 && plane.data.len() < needed {
                anyhow::bail!(
                    "plane {} holds {} bytes, needs {}",
                    p,
                    plane.data.len(),
                    needed
                );
            }
        }
        Ok(Self {
            inner: Arc::new(FrameInner { format, planes }),
        })
    }

    pub fn format(&self) -> &Format {
        &self.inner.format
    }

    pub fn num_planes(&self) -> usize {
        self.inner.planes.len()
    }

    pub fn plane(&self, index: usize) -> &Plane {
        &self.inner.planes[index]
    }

    pub fn planes(&self) -> &[Plane] {
        &self.inner.planes
    }

    pub fn width(&self) -> usize {
        self.inner.planes.first().map(|p| p.width).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.inner.planes.first().map(|p| p.height).unwrap_or(0)
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("format", &self.format().name)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("planes", &self.num_planes())
            .finish()
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "Frame format: {}, width: {}, height: {}, planes: {}",
            self.format(),
            self.width(),
            self.height(),
            self.num_planes()
        )
    }
}

/// Mutable planes being filled by a producer, frozen into a [`Frame`].
pub struct FrameBuilder {
    format: Format,
    planes: Vec<(BytesMut, usize, usize, usize)>,
}

impl FrameBuilder {
    /// Allocates zeroed planes with strides rounded up to [`STRIDE_ALIGN`].
    pub fn alloc(format: Format, width: usize, height: usize) -> Self {
        let planes = (0..format.num_planes)
            .map(|p| {
                let (w, h) = format.plane_dimensions(p, width, height);
                let stride = (w * format.bytes_per_sample).next_multiple_of(STRIDE_ALIGN);
                (BytesMut::zeroed(stride * h), stride, w, h)
            })
            .collect();
        Self { format, planes }
    }

    pub fn format(&self) -> &Format {
        &self.format
    }

    /// Plane dimensions as (width, height).
    pub fn plane_dimensions(&self, plane: usize) -> (usize, usize) {
        let (_, _, w, h) = &self.planes[plane];
        (*w, *h)
    }

    /// Writable visible bytes of row `y` in `plane`.
    pub fn row_mut(&mut self, plane: usize, y: usize) -> &mut [u8] {
        let row_size = self.planes[plane].2 * self.format.bytes_per_sample;
        let (data, stride, _, _) = &mut self.planes[plane];
        let start = y * *stride;
        &mut data[start..start + row_size]
    }

    pub fn freeze(self) -> Frame {
        let planes = self
            .planes
            .into_iter()
            .map(|(data, stride, w, h)| Plane::new(data.freeze(), stride, w, h))
            .collect();
        Frame {
            inner: Arc::new(FrameInner {
                format: self.format,
                planes,
            }),
        }
    }
}
