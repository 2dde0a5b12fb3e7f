//! Ordered frame streaming: requests frames from an asynchronous
//! [`source::FrameSource`], restores index order and writes planes to a sink.
//!
//! ```text
//!  Pipeline ──request_frame(n)──► FrameSource (worker pool)
//!     ▲                                 │
//!     └──── completion(n, frame) ◄──────┘
//!     │
//!     └─► ReorderBuffer ─► OutputWriter ─► stdout / file
//! ```

pub mod engine;
pub mod error;
pub mod format;
pub mod frame;
pub mod gate;
pub mod output;
pub mod pipeline;
pub mod reorder;
pub mod script;
pub mod source;

#[cfg(test)]
mod test_util;

pub use error::{PipeError, Result};
