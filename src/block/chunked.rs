//! Chunked Writer
//!
//! Re-slices a stream of arbitrary-sized writes into fixed-size blocks.

use crate::error::{FsError, Result};

use super::BlockSink;

/// Buffers writes and emits exactly `block_size`-byte blocks to a sink.
/// Only the final block, emitted by [`ChunkedWriter::close`], may be short.
pub struct ChunkedWriter<S> {
    sink: S,
    block_size: usize,
    /// Partially filled block; never holds a full block between calls
    buf: Vec<u8>,
    closed: bool,
}

impl<S: BlockSink> ChunkedWriter<S> {
    pub fn new(sink: S, block_size: usize) -> Self {
        debug_assert!(block_size > 0, "block size must be positive");
        Self {
            sink,
            block_size,
            buf: Vec::with_capacity(block_size),
            closed: false,
        }
    }

    /// Accept `data`, emitting every block it completes
    ///
    /// Returns the number of bytes consumed. If the sink fails after at least
    /// one block of this call went out, the count stops at that block and the
    /// rest of `data` is left unconsumed (a short write) for the caller to
    /// pass again; the sink error is only logged. A failure before any
    /// progress is returned as an error and leaves the buffer as it was.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(FsError::Closed);
        }

        let fill = self.buf.len();
        if fill + data.len() < self.block_size {
            self.buf.extend_from_slice(data);
            return Ok(data.len());
        }

        let mut consumed = 0;
        let mut rest = data;

        // Finish the pending block first
        if fill > 0 {
            let take = self.block_size - fill;
            self.buf.extend_from_slice(&rest[..take]);
            if let Err(e) = self.sink.write_block(&self.buf) {
                self.buf.truncate(fill);
                return Err(e);
            }
            self.buf.clear();
            consumed = take;
            rest = &rest[take..];
        }

        // Whole blocks go straight from the caller's slice
        while rest.len() >= self.block_size {
            let (block, tail) = rest.split_at(self.block_size);
            if let Err(e) = self.sink.write_block(block) {
                if consumed == 0 {
                    return Err(e);
                }
                tracing::debug!(consumed, "short write: {}", e);
                return Ok(consumed);
            }
            consumed += block.len();
            rest = tail;
        }

        self.buf.extend_from_slice(rest);
        Ok(consumed + rest.len())
    }

    /// Emit the buffered remainder as the final (short) block and seal
    ///
    /// Closing an already closed writer does nothing. If the sink fails the
    /// writer stays open with its buffer intact.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if !self.buf.is_empty() {
            self.sink.write_block(&self.buf)?;
            self.buf.clear();
        }
        self.closed = true;
        Ok(())
    }

    /// Bytes waiting for a full block
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}
