// Error utilities for ndn_common

// Use standard error utilities from third-party libraries
pub use anyhow::{anyhow, Result};
pub use thiserror::Error;
