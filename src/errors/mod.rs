mod bot_error;
mod config_error;

pub use bot_error::{BotError, BotErrorKind};
pub use config_error::ConfigError;
