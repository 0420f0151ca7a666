//! # sanchar-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`SancharSettings::default()`]
//! 2. **User file**: `~/.sanchar/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `SANCHAR_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = SancharSettings::default();
        assert_eq!(settings.server.port, 5000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert!(settings.push.enabled);
        assert!(settings.relay.push_only_when_offline);
        assert_eq!(settings.logging.level, "info");
    }
}
