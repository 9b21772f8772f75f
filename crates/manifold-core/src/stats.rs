use serde::{Deserialize, Serialize};

/// Byte-level accounting for one pass of tool-result compression
///
/// Purely observational: accumulated across all tool messages of one
/// request and reported in logs, never read back into the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionStats {
    /// Bytes of tool content before compression
    pub original_bytes: u64,
    /// Bytes of tool content after compression
    pub compressed_bytes: u64,
    /// Bytes dropped by hard-cap removal
    pub removed_bytes: u64,
    /// Number of tool results substituted with the compact encoding
    pub compressed_count: u64,
    /// Number of tool results elided entirely
    pub removed_count: u64,
}

impl CompressionStats {
    /// Fold another pass's counters into this one
    pub fn merge(&mut self, other: &Self) {
        self.original_bytes += other.original_bytes;
        self.compressed_bytes += other.compressed_bytes;
        self.removed_bytes += other.removed_bytes;
        self.compressed_count += other.compressed_count;
        self.removed_count += other.removed_count;
    }

    /// Bytes saved by substitution, saturating when nothing shrank
    pub fn saved_bytes(&self) -> u64 {
        self.original_bytes.saturating_sub(self.compressed_bytes)
    }
}
