//! # secchat-settings
//!
//! Client settings loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`ClientSettings::default()`]
//! 2. **User file**: `~/.secchat/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SECCHAT_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, normalize,
    settings_path, validate,
};
pub use types::*;
