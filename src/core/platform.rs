//! Target platform capability queries
//!
//! Install actions ask these questions instead of probing `uname` on their
//! own. The answers are exported into the action environment.

use std::fmt;

/// Capability query interface handed to every install action
pub trait Platform: fmt::Debug + Send + Sync {
    /// Target platform as `<arch>-<os>`, e.g. `x86_64-linux`
    fn target_platform(&self) -> String;

    /// Pointer width in bits
    fn word_size(&self) -> u32;
}

/// The platform this binary was compiled for
#[derive(Debug, Clone, Copy, Default)]
pub struct HostPlatform;

impl Platform for HostPlatform {
    fn target_platform(&self) -> String {
        format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS)
    }

    fn word_size(&self) -> u32 {
        usize::BITS
    }
}

/// A platform with fixed answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPlatform {
    /// Reported target platform
    pub target: String,
    /// Reported word size
    pub word_size: u32,
}

impl FixedPlatform {
    /// Create a platform with the given answers
    pub fn new(target: impl Into<String>, word_size: u32) -> Self {
        Self {
            target: target.into(),
            word_size,
        }
    }
}

impl Platform for FixedPlatform {
    fn target_platform(&self) -> String {
        self.target.clone()
    }

    fn word_size(&self) -> u32 {
        self.word_size
    }
}
