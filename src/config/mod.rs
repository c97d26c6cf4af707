//! Tiered configuration.
//!
//! Tiers, lowest to highest priority:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/onboarding/config.yaml`
//! 3. **User** - `~/.onboarding/config.yaml`
//! 4. **Environment** - path overrides
//!
//! YAML tiers are deep-merged field by field.
//!
//! ## Environment Variables
//! - `ONBOARD_CONFIG_PATH` - Explicit config file (replaces the file tiers)
//! - `ONBOARD_DB_PATH` - Database path
//! - `ONBOARD_BLOB_DIR` - Blob store directory
//! - `ONBOARD_LOG_DIR` - Log directory
//! - `ONBOARD_USER_DIR` - User config dir (default: `~/.onboarding`)
//! - `ONBOARD_PROJECT_DIR` - Project config dir (default: `./onboarding`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all};
pub use types::*;
