//! Reassembly of `[type][length][payload]` frames from a byte stream.
//!
//! Bytes read from the socket are appended into a fixed buffer. Complete
//! frames are popped off the front and whatever follows them slides down to
//! offset zero.

/// Type byte plus payload length byte
pub const HEADER_LENGTH: usize = 2;
pub const MAX_PAYLOAD_LENGTH: usize = u8::MAX as usize;
pub const MAX_FRAME_LENGTH: usize = HEADER_LENGTH + MAX_PAYLOAD_LENGTH;

const BUFFER_SIZE: usize = 512;

pub struct FrameBuffer {
    buf: [u8; BUFFER_SIZE],
    filled: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; BUFFER_SIZE],
            filled: 0,
        }
    }

    /// Free space to read into. Never empty once every complete frame has been
    /// popped, since a partial frame is always shorter than the buffer.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Marks `n` bytes written through [`spare_mut`](Self::spare_mut) as filled
    pub fn commit(&mut self, n: usize) {
        self.filled = (self.filled + n).min(BUFFER_SIZE);
    }

    /// Appends bytes, returning how many fitted
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(BUFFER_SIZE - self.filled);
        self.buf[self.filled..self.filled + n].copy_from_slice(&bytes[..n]);
        self.filled += n;
        n
    }

    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Removes the first complete frame, header included
    pub fn pop_frame(&mut self) -> Option<Vec<u8>> {
        if self.filled < HEADER_LENGTH {
            return None;
        }

        let frame_length = HEADER_LENGTH + self.buf[1] as usize;
        if self.filled < frame_length {
            return None;
        }

        let frame = self.buf[..frame_length].to_vec();
        self.buf.copy_within(frame_length..self.filled, 0);
        self.filled -= frame_length;
        Some(frame)
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
