pub mod cancel;
pub mod config;
pub mod logger;
pub mod secret;
pub mod settings;

pub use cancel::CancelFlag;
pub use config::*;
pub use logger::setup_logging;
pub use secret::resolve_secret;
pub use settings::{RunConfig, Settings, SettingsOverrides, load_settings};
