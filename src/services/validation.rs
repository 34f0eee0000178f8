use crate::constants::limits::MAX_CONFIG_NAME_LEN;
use crate::errors::BotError;
use once_cell::sync::Lazy;
use regex::Regex;

static CONFIG_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("config name regex"));

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &str, label: &str) -> Result<String, BotError> {
        let normalized = value.trim();
        if normalized.is_empty() {
            return Err(BotError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        if normalized.contains('\0') {
            return Err(BotError::invalid_params(format!(
                "{} must not contain null bytes",
                label
            )));
        }
        Ok(normalized.to_string())
    }

    /// Configuration names end up in remote and local file paths and on the
    /// remote program's stdin, so only a conservative file-name alphabet passes.
    pub fn ensure_config_name(&self, value: &str) -> Result<String, BotError> {
        let name = self.ensure_string(value, "Configuration name")?;
        if name.len() > MAX_CONFIG_NAME_LEN {
            return Err(BotError::invalid_params(format!(
                "Configuration name must be at most {} characters",
                MAX_CONFIG_NAME_LEN
            )));
        }
        if !CONFIG_NAME_PATTERN.is_match(&name) {
            return Err(BotError::invalid_params(
                "Configuration name may only contain letters, digits, '.', '_' or '-'",
            )
            .with_hint("Start with a letter or digit, e.g. office-laptop."));
        }
        Ok(name)
    }

    pub fn ensure_port(&self, value: &str, label: &str) -> Result<u16, BotError> {
        match value.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(port),
            _ => Err(BotError::invalid_params(format!(
                "{} must be an integer between 1 and 65535",
                label
            ))),
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
