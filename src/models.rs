use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Opaque requester identifier. Chat transports hand out numeric ids, so both
/// numbers and strings are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Int(value) => Ok(UserId::from(value)),
            Raw::Text(value) if !value.trim().is_empty() => Ok(UserId(value)),
            Raw::Text(_) => Err(serde::de::Error::custom("user_id must not be empty")),
        }
    }
}

/// Terminal outcome of a conversation, resolved by the provisioning task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded,
    Failed(String),
}

/// Externally visible conversation state. `Idle` means no entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingSecret,
    AwaitingConfigName,
}

/// The only stages a stored session can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationStage {
    AwaitingSecret,
    AwaitingConfigName,
}

impl From<ConversationStage> for SessionState {
    fn from(stage: ConversationStage) -> Self {
        match stage {
            ConversationStage::AwaitingSecret => SessionState::AwaitingSecret,
            ConversationStage::AwaitingConfigName => SessionState::AwaitingConfigName,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub stage: ConversationStage,
    pub config_name: Option<String>,
}

impl UserSession {
    pub fn awaiting_secret() -> Self {
        Self {
            stage: ConversationStage::AwaitingSecret,
            config_name: None,
        }
    }

    /// A session becomes a provisioning request once its name is recorded.
    pub fn into_request(self, user_id: UserId) -> Option<ProvisioningRequest> {
        self.config_name.map(|config_name| ProvisioningRequest {
            user_id,
            config_name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
}

impl ServerDescriptor {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub reachable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub user_id: UserId,
    pub config_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningArtifact {
    pub local_path: PathBuf,
    pub remote_source_path: String,
    pub display_name: String,
    pub bytes: u64,
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_numbers_and_strings() {
        let numeric: UserId = serde_json::from_str("424242").expect("numeric id");
        let text: UserId = serde_json::from_str("\"alice\"").expect("text id");
        assert_eq!(numeric.as_str(), "424242");
        assert_eq!(text.as_str(), "alice");
    }

    #[test]
    fn user_id_rejects_blank_strings() {
        assert!(serde_json::from_str::<UserId>("\"  \"").is_err());
    }
}
