//! Configuration for preset-handler
//!
//! - **settings**: user-tunable behaviour loaded from `settings.json`
//! - **catalog**: the presets seeded on first run

pub mod catalog;
pub mod settings;

pub use catalog::default_catalog;
pub use settings::Settings;
