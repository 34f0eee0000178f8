use super::BotError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl From<ConfigError> for BotError {
    fn from(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Missing(var) => format!("Export {} before starting the bot.", var),
            ConfigError::Invalid { var, .. } => format!("Fix the value of {}.", var),
        };
        BotError::invalid_params(err.to_string()).with_hint(hint)
    }
}
