use bytes::Bytes;

use crate::error::{DownloadError, ProtocolFault};

/// Snapshot emitted to observers after every fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub received: u64,
    pub total: u64,
    pub percent: u8,
}

/// State of one in-flight download. Created per attempt and consumed by
/// [`TransferSession::finish`], so nothing carries over between attempts.
#[derive(Debug)]
pub struct TransferSession {
    total_bytes: u64,
    received_bytes: u64,
    chunks: Vec<Bytes>,
}

impl TransferSession {
    pub fn new(total_bytes: u64) -> Self {
        Self {
            total_bytes,
            received_bytes: 0,
            chunks: Vec::new(),
        }
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Floored percentage, clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        let pct = (self.received_bytes as u128 * 100) / self.total_bytes as u128;
        pct.min(100) as u8
    }

    pub fn progress(&self) -> Progress {
        Progress {
            received: self.received_bytes,
            total: self.total_bytes,
            percent: self.percent(),
        }
    }

    pub fn append(&mut self, chunk: Bytes) -> Result<Progress, DownloadError> {
        let len = chunk.len() as u64;
        if len == 0 {
            return Ok(self.progress());
        }

        let received = self.received_bytes.saturating_add(len);
        if received > self.total_bytes {
            return Err(ProtocolFault::Overrun {
                declared: self.total_bytes,
            }
            .into());
        }

        self.chunks.push(chunk);
        self.received_bytes = received;
        Ok(self.progress())
    }

    /// Concatenates the fragments in receipt order.
    pub fn finish(self) -> Result<Vec<u8>, DownloadError> {
        if self.received_bytes != self.total_bytes {
            return Err(ProtocolFault::Truncated {
                received: self.received_bytes,
                declared: self.total_bytes,
            }
            .into());
        }

        let mut artifact = Vec::with_capacity(self.total_bytes as usize);
        for chunk in self.chunks {
            artifact.extend_from_slice(&chunk);
        }
        Ok(artifact)
    }
}
