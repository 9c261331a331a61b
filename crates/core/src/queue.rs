use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::record::QueuedMutation;

/// Current on-disk format. Version 1 is the notional legacy un-scoped layout,
/// migrated by key relocation rather than by rewriting envelopes.
pub const QUEUE_FORMAT_VERSION: u32 = 2;

/// Persisted form of one scope's queue. Records are framed individually so a
/// single entry of an unknown or corrupted shape can be quarantined on read
/// without discarding the rest of the queue; the checksum covers the
/// concatenated record bytes and detects whole-envelope corruption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEnvelope {
    pub version: u32,
    pub checksum: [u8; 32],
    pub records: Vec<Vec<u8>>,
}

impl Default for QueueEnvelope {
    fn default() -> Self {
        Self::empty()
    }
}

/// Outcome of opening an envelope: the records that decoded plus the number
/// that were quarantined.
#[derive(Debug)]
pub struct DecodedQueue<R> {
    pub records: Vec<QueuedMutation<R>>,
    pub quarantined: usize,
}

impl QueueEnvelope {
    pub fn empty() -> Self {
        Self {
            version: QUEUE_FORMAT_VERSION,
            checksum: *blake3::Hasher::new().finalize().as_bytes(),
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn seal<R: Serialize>(records: &[QueuedMutation<R>]) -> Result<Self, CoreError> {
        let mut encoded = Vec::with_capacity(records.len());
        let mut hasher = blake3::Hasher::new();
        for record in records {
            let bytes = record.to_msgpack()?;
            hasher.update(&bytes);
            encoded.push(bytes);
        }
        Ok(Self {
            version: QUEUE_FORMAT_VERSION,
            checksum: *hasher.finalize().as_bytes(),
            records: encoded,
        })
    }

    /// Verify the checksum and decode each record. Envelope-level damage
    /// (version we don't understand, checksum mismatch) is an error the caller
    /// degrades to an empty queue; a record that individually fails to decode
    /// is dropped and counted, the rest survive.
    pub fn open<R: DeserializeOwned>(&self) -> Result<DecodedQueue<R>, CoreError> {
        if self.version > QUEUE_FORMAT_VERSION {
            return Err(CoreError::UnsupportedVersion(self.version));
        }

        let mut hasher = blake3::Hasher::new();
        for bytes in &self.records {
            hasher.update(bytes);
        }
        if *hasher.finalize().as_bytes() != self.checksum {
            return Err(CoreError::ChecksumMismatch);
        }

        let mut records = Vec::with_capacity(self.records.len());
        let mut quarantined = 0;
        for bytes in &self.records {
            match QueuedMutation::from_msgpack(bytes) {
                Ok(record) => records.push(record),
                Err(_) => quarantined += 1,
            }
        }
        Ok(DecodedQueue {
            records,
            quarantined,
        })
    }
}
