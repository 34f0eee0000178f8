use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

const DEFAULT_REDACTION: &str = "[REDACTED]";
const INLINE_REDACTION: &str = "***REDACTED***";

static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "password",
        "passphrase",
        "ca_passphrase",
        "secret",
        "shared_secret",
        "ssh_password",
        "token",
        "private_key",
    ]
    .into_iter()
    .collect()
});

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().replace('-', "_")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.contains(normalize_key(key).as_str())
}

/// Replaces every occurrence of a known secret value inside free text.
pub fn redact_text(text: &str, secrets: &[&str]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if secret.is_empty() {
            continue;
        }
        out = out.replace(secret, INLINE_REDACTION);
    }
    out
}

pub fn redact_value(value: &Value, secrets: &[&str]) -> Value {
    match value {
        Value::String(text) => Value::String(redact_text(text, secrets)),
        Value::Array(items) => Value::Array(items.iter().map(|v| redact_value(v, secrets)).collect()),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map {
                if is_sensitive_key(key) && !entry.is_null() {
                    out.insert(key.clone(), Value::String(DEFAULT_REDACTION.to_string()));
                    continue;
                }
                out.insert(key.clone(), redact_value(entry, secrets));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
