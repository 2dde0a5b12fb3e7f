//! Restores index order for frames that complete out of order.

use std::collections::HashMap;

use crate::error::{PipeError, Result};
use crate::frame::Frame;

#[derive(Default)]
pub struct ReorderBuffer {
    frames: HashMap<usize, Frame>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: HashMap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, index: usize, frame: Frame) -> Result<()> {
        if self.frames.contains_key(&index) {
            return Err(PipeError::DuplicateIndex(index));
        }
        self.frames.insert(index, frame);
        Ok(())
    }

    /// Removes and yields frames `start, start + 1, ...` until the first
    /// missing index.
    pub fn drain_prefix(&mut self, start: usize) -> DrainPrefix<'_> {
        DrainPrefix {
            buffer: self,
            next: start,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.frames.contains_key(&index)
    }

    /// Drops buffered frames with index >= `index`, returning how many.
    pub fn discard_from(&mut self, index: usize) -> usize {
        let before = self.frames.len();
        self.frames.retain(|&k, _| k < index);
        before - self.frames.len()
    }

    /// Drops every buffered frame, returning how many were held.
    pub fn clear(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }
}

pub struct DrainPrefix<'a> {
    buffer: &'a mut ReorderBuffer,
    next: usize,
}

impl Iterator for DrainPrefix<'_> {
    type Item = (usize, Frame);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let frame = self.buffer.frames.remove(&index)?;
        self.next += 1;
        Some((index, frame))
    }
}
