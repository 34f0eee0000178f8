use crate::constants::{network, paths, prompts};
use crate::errors::ConfigError;
use crate::models::ServerDescriptor;
use crate::services::validation::Validation;
use crate::utils::feature_flags::is_truthy;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A configured secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadinessMode {
    /// Wait for a prompt marker in the remote output before each write.
    Prompt,
    /// Blind settling delay between the two writes.
    FixedDelay,
}

impl ReadinessMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "prompt" => Some(ReadinessMode::Prompt),
            "delay" | "fixed_delay" => Some(ReadinessMode::FixedDelay),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SshSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<Secret>,
    pub private_key_path: Option<PathBuf>,
    pub host_key_fingerprint: Option<String>,
    pub ready_timeout_ms: u64,
    pub keepalive_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ProvisioningSettings {
    pub ssh: SshSettings,
    pub remote_command: String,
    pub remote_output_dir: String,
    pub local_download_dir: PathBuf,
    pub artifact_extension: String,
    pub ca_passphrase: Secret,
    pub readiness: ReadinessMode,
    pub settle_delay: Duration,
    pub overall_timeout: Duration,
    pub name_prompt: String,
    pub passphrase_prompt: String,
    pub request_pty: bool,
}

impl ProvisioningSettings {
    pub fn artifact_file_name(&self, config_name: &str) -> String {
        format!("{}.{}", config_name, self.artifact_extension)
    }

    pub fn remote_artifact_path(&self, config_name: &str) -> String {
        let dir = self.remote_output_dir.trim_end_matches('/');
        format!("{}/{}", dir, self.artifact_file_name(config_name))
    }

    pub fn local_artifact_path(&self, config_name: &str) -> PathBuf {
        self.local_download_dir.join(self.artifact_file_name(config_name))
    }
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub shared_secret: Secret,
    pub provisioning: ProvisioningSettings,
    pub servers: Vec<ServerDescriptor>,
    pub probe_timeout: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };
        let validation = Validation::new();

        let shared_secret = env.required("BOT_PASSWORD")?;
        let ca_passphrase = env.required("CA_PASSPHRASE")?;
        let host = env.required("VPN_SERVER_IP")?;
        let secondary_host = env.optional("VPN_SERVER_IP_2");

        let ssh_port = match env.optional("SSH_PORT") {
            Some(raw) => validation
                .ensure_port(&raw, "SSH_PORT")
                .map_err(|err| ConfigError::Invalid {
                    var: "SSH_PORT",
                    reason: err.message,
                })?,
            None => network::SSH_DEFAULT_PORT,
        };

        let ssh = SshSettings {
            host: host.clone(),
            port: ssh_port,
            username: env
                .optional("SSH_USERNAME")
                .unwrap_or_else(|| paths::DEFAULT_SSH_USERNAME.to_string()),
            password: env.optional("PASSWORD").map(Secret::new),
            private_key_path: env.optional("SSH_PRIVATE_KEY_PATH").map(PathBuf::from),
            host_key_fingerprint: env
                .optional("SSH_HOST_KEY_SHA256")
                .map(|raw| normalize_fingerprint_sha256(&raw)),
            ready_timeout_ms: env.millis("SSH_READY_TIMEOUT_MS", network::TIMEOUT_SSH_READY_MS)?,
            keepalive_interval_ms: network::KEEPALIVE_INTERVAL_MS,
        };

        let script_path = env
            .optional("SCRIPT_PATH")
            .unwrap_or_else(|| paths::DEFAULT_SCRIPT_PATH.to_string());
        let readiness = match env.optional("PROVISION_READINESS") {
            Some(raw) => ReadinessMode::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "PROVISION_READINESS",
                reason: format!("expected prompt or delay, got {}", raw),
            })?,
            None => ReadinessMode::Prompt,
        };

        let provisioning = ProvisioningSettings {
            ssh,
            remote_command: env
                .optional("REMOTE_COMMAND")
                .unwrap_or_else(|| format!("python3 {}", script_path)),
            remote_output_dir: env
                .optional("OUTPUT_DIR")
                .unwrap_or_else(|| paths::DEFAULT_OUTPUT_DIR.to_string()),
            local_download_dir: PathBuf::from(
                env.optional("LOCAL_DOWNLOAD_DIR")
                    .unwrap_or_else(|| paths::DEFAULT_LOCAL_DOWNLOAD_DIR.to_string()),
            ),
            artifact_extension: env
                .optional("ARTIFACT_EXTENSION")
                .map(|ext| ext.trim_start_matches('.').to_string())
                .unwrap_or_else(|| paths::DEFAULT_ARTIFACT_EXTENSION.to_string()),
            ca_passphrase: Secret::new(ca_passphrase),
            readiness,
            settle_delay: Duration::from_millis(
                env.millis("PROVISION_SETTLE_DELAY_MS", network::SETTLE_DELAY_MS)?,
            ),
            overall_timeout: Duration::from_millis(
                env.millis("PROVISION_TIMEOUT_MS", network::TIMEOUT_PROVISION_MS)?,
            ),
            name_prompt: env
                .raw("PROVISION_NAME_PROMPT")
                .unwrap_or_else(|| prompts::DEFAULT_NAME_MARKER.to_string()),
            passphrase_prompt: env
                .raw("PROVISION_PASSPHRASE_PROMPT")
                .unwrap_or_else(|| prompts::DEFAULT_PASSPHRASE_MARKER.to_string()),
            request_pty: env.optional("PROVISION_REQUEST_PTY").is_some_and(is_truthy),
        };

        let servers = match env.optional("HEALTH_SERVERS") {
            Some(raw) => parse_servers(&raw)?,
            None => default_servers(&host, secondary_host.as_deref()),
        };

        Ok(Self {
            shared_secret: Secret::new(shared_secret),
            provisioning,
            servers,
            probe_timeout: Duration::from_millis(
                env.millis("HEALTH_PROBE_TIMEOUT_MS", network::TIMEOUT_PROBE_MS)?,
            ),
        })
    }

    /// Values that must never reach a log line.
    pub fn secrets(&self) -> Vec<String> {
        let mut out = vec![
            self.shared_secret.expose().to_string(),
            self.provisioning.ca_passphrase.expose().to_string(),
        ];
        if let Some(password) = &self.provisioning.ssh.password {
            out.push(password.expose().to_string());
        }
        out
    }
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn raw(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    fn optional(&self, key: &str) -> Option<String> {
        self.raw(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        // Secrets are compared verbatim, so only blank values are rejected.
        match self.raw(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::Missing(key)),
        }
    }

    fn millis(&self, key: &'static str, fallback: u64) -> Result<u64, ConfigError> {
        match self.optional(key) {
            None => Ok(fallback),
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                var: key,
                reason: format!("expected milliseconds, got {}", raw),
            }),
        }
    }
}

fn parse_servers(raw: &str) -> Result<Vec<ServerDescriptor>, ConfigError> {
    let servers: Vec<ServerDescriptor> =
        serde_json::from_str(raw).map_err(|err| ConfigError::Invalid {
            var: "HEALTH_SERVERS",
            reason: err.to_string(),
        })?;
    if let Some(bad) = servers.iter().find(|s| s.port == 0 || s.host.trim().is_empty()) {
        return Err(ConfigError::Invalid {
            var: "HEALTH_SERVERS",
            reason: format!("server '{}' needs a host and a non-zero port", bad.name),
        });
    }
    Ok(servers)
}

fn default_servers(primary: &str, secondary: Option<&str>) -> Vec<ServerDescriptor> {
    let mut servers = vec![ServerDescriptor::new(
        "OpenVPN 1",
        primary,
        network::OPENVPN_DEFAULT_PORT,
    )];
    if let Some(host) = secondary {
        servers.push(ServerDescriptor::new(
            "OpenVPN 2",
            host,
            network::OPENVPN_DEFAULT_PORT,
        ));
    }
    servers
}

fn normalize_fingerprint_sha256(raw: &str) -> String {
    let cleaned = raw.trim().trim_end_matches('=');
    if cleaned.to_lowercase().starts_with("sha256:") {
        return format!("SHA256:{}", cleaned[7..].trim());
    }
    format!("SHA256:{}", cleaned)
}
