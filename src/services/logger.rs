use crate::utils::redact::redact_value;
use std::sync::{Arc, Mutex};

const LEVEL_ENV: &str = "OVPN_BOT_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            _ => None,
        }
    }

    fn from_env() -> Self {
        std::env::var(LEVEL_ENV)
            .ok()
            .and_then(|raw| Self::parse(&raw))
            .unwrap_or(LogLevel::Info)
    }

    fn rank(self) -> u8 {
        match self {
            LogLevel::Error => 0,
            LogLevel::Warn => 1,
            LogLevel::Info => 2,
            LogLevel::Debug => 3,
        }
    }

    fn allows(self, other: LogLevel) -> bool {
        other.rank() <= self.rank()
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    error: u64,
    warn: u64,
    info: u64,
    debug: u64,
}

/// Structured stderr logger shared by every component. Secret values
/// registered through [`Logger::with_secrets`] are masked in messages and
/// metadata before anything is written.
#[derive(Debug, Clone)]
pub struct Logger {
    context: String,
    level: LogLevel,
    secrets: Arc<Vec<String>>,
    counters: Arc<Mutex<Counters>>,
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            level: LogLevel::from_env(),
            secrets: Arc::new(Vec::new()),
            counters: Arc::new(Mutex::new(Counters::default())),
        }
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self {
            context,
            level: self.level,
            secrets: self.secrets.clone(),
            counters: self.counters.clone(),
        }
    }

    pub fn with_secrets(mut self, secrets: Vec<String>) -> Self {
        let secrets = secrets.into_iter().filter(|s| !s.is_empty()).collect();
        self.secrets = Arc::new(secrets);
        self
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    fn log(&self, level: LogLevel, message: &str, meta: Option<&serde_json::Value>) {
        if !self.level.allows(level) {
            return;
        }
        if let Ok(mut counters) = self.counters.lock() {
            match level {
                LogLevel::Error => counters.error += 1,
                LogLevel::Warn => counters.warn += 1,
                LogLevel::Info => counters.info += 1,
                LogLevel::Debug => counters.debug += 1,
            }
        }
        let secrets: Vec<&str> = self.secrets.iter().map(String::as_str).collect();
        let message = crate::utils::redact::redact_text(message, &secrets);
        let meta_suffix = meta
            .filter(|m| !m.is_null())
            .map(|m| format!(" {}", redact_value(m, &secrets)))
            .unwrap_or_default();
        eprintln!(
            "[{}] {} [{}] {}{}",
            chrono::Utc::now().to_rfc3339(),
            level.label(),
            self.context,
            message,
            meta_suffix
        );
    }

    pub fn error(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Error, message, meta);
    }

    pub fn warn(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Warn, message, meta);
    }

    pub fn info(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Info, message, meta);
    }

    pub fn debug(&self, message: &str, meta: Option<&serde_json::Value>) {
        self.log(LogLevel::Debug, message, meta);
    }

    pub fn stats(&self) -> serde_json::Value {
        let counters = self.counters.lock().unwrap_or_else(|err| err.into_inner());
        serde_json::json!({
            "level": format!("{:?}", self.level).to_lowercase(),
            "context": self.context,
            "error": counters.error,
            "warn": counters.warn,
            "info": counters.info,
            "debug": counters.debug,
        })
    }
}
