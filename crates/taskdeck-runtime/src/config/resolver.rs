//! Configuration resolver trait for layered overrides.
//!
//! ```text
//! ConfigLoader.load()  →  TaskdeckConfig (base)
//!                              │
//!                              ▼
//!                     ConfigResolver.apply()   (CLI flags)
//!                              │
//!                              ▼
//!                     TaskdeckConfig (final)
//! ```

use super::TaskdeckConfig;

/// Trait for applying configuration overrides.
///
/// Only values the caller actually specified should be applied.
pub trait ConfigResolver {
    fn apply(&self, config: &mut TaskdeckConfig);
}

/// No-op resolver that makes no changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpResolver;

impl ConfigResolver for NoOpResolver {
    fn apply(&self, _config: &mut TaskdeckConfig) {}
}
