//! Reader configuration

use serde::{Deserialize, Serialize};

/// Default cap on a single decompressed payload (256 MiB)
pub const DEFAULT_MAX_DECOMPRESSED_SIZE: usize = 256 * 1024 * 1024;

/// What the plugin scan does with a record whose type tag is not four
/// uppercase letters, digits or underscores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRecordPolicy {
    /// Log a warning and continue after the record using its declared size
    #[default]
    Skip,
    /// Fail the scan with `UnknownRecordType`
    Abort,
}

/// Configuration shared by the plugin and archive readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Handling of unrecognized record type tags during the plugin scan
    pub unknown_record_policy: UnknownRecordPolicy,

    /// Upper bound for any single decompressed payload, in bytes
    pub max_decompressed_size: usize,

    /// Fail archive opening when a folder name does not hash to its stored key
    pub verify_folder_hashes: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            unknown_record_policy: UnknownRecordPolicy::Skip,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_SIZE,
            verify_folder_hashes: true,
        }
    }
}

impl ReaderConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unknown record policy
    #[must_use]
    pub const fn with_unknown_record_policy(mut self, policy: UnknownRecordPolicy) -> Self {
        self.unknown_record_policy = policy;
        self
    }

    /// Set the decompression limit
    #[must_use]
    pub const fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Enable or disable folder hash verification
    #[must_use]
    pub const fn with_folder_hash_verification(mut self, enable: bool) -> Self {
        self.verify_folder_hashes = enable;
        self
    }
}
