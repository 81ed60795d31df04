//! Engine configuration.

/// Default bound on keys derived ahead in one receive call.
pub const DEFAULT_MAX_SKIP: u32 = 1000;

/// Tunables for [`crate::RatchetEngine`].
///
/// Key sizes are not here: they belong to the
/// [`ratchet_crypto::KeyRepository`] the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of skipped message keys one receive call may derive
    /// and cache. Headers claiming a larger gap are rejected before any
    /// state changes, which bounds cache growth from hostile input.
    pub max_skip: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_skip: DEFAULT_MAX_SKIP }
    }
}
