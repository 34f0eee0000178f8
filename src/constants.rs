pub mod network {
    pub const SSH_DEFAULT_PORT: u16 = 22;
    pub const OPENVPN_DEFAULT_PORT: u16 = 1194;
    pub const TIMEOUT_SSH_READY_MS: u64 = 10_000;
    pub const TIMEOUT_PROBE_MS: u64 = 3_000;
    pub const TIMEOUT_PROVISION_MS: u64 = 120_000;
    pub const SETTLE_DELAY_MS: u64 = 4_000;
    pub const POLL_INTERVAL_MS: u64 = 25;
    pub const KEEPALIVE_INTERVAL_MS: u64 = 30_000;
}

pub mod limits {
    pub const MAX_CONFIG_NAME_LEN: usize = 64;
    pub const TRANSCRIPT_TAIL_BYTES: usize = 512;
    pub const LOG_SUBSTRING_LENGTH: usize = 100;
    pub const LANE_IDLE_MS: u64 = 300_000;
}

pub mod paths {
    pub const DEFAULT_SSH_USERNAME: &str = "root";
    pub const DEFAULT_SCRIPT_PATH: &str = "/root/script.py";
    pub const DEFAULT_OUTPUT_DIR: &str = "/root/clients";
    pub const DEFAULT_LOCAL_DOWNLOAD_DIR: &str = "./downloads";
    pub const DEFAULT_ARTIFACT_EXTENSION: &str = "ovpn";
}

pub mod prompts {
    pub const DEFAULT_NAME_MARKER: &str = "client name";
    pub const DEFAULT_PASSPHRASE_MARKER: &str = "pass phrase";
}

pub mod triggers {
    pub const START: &str = "/start";
    pub const GENERATE: &str = "🔐 Generate VPN";
    pub const GENERATE_COMMAND: &str = "/generate";
    pub const STATUS: &str = "📊 Server status";
    pub const STATUS_COMMAND: &str = "/status";
    pub const CANCEL: &str = "❌ Cancel";
    pub const CANCEL_COMMAND: &str = "/cancel";

    pub fn is_cancel(text: &str) -> bool {
        text == CANCEL || text == CANCEL_COMMAND
    }

    pub fn is_generate(text: &str) -> bool {
        text == GENERATE || text == GENERATE_COMMAND
    }

    pub fn is_status(text: &str) -> bool {
        text == STATUS || text == STATUS_COMMAND
    }
}

pub mod replies {
    pub const WELCOME: &str = "Hi! Press the button below to create a VPN configuration.";
    pub const ASK_SECRET: &str = "Enter the bot password to continue.";
    pub const SECRET_ACCEPTED: &str =
        "Password accepted ✅\nEnter a name for the VPN configuration or press Cancel.";
    pub const SECRET_REJECTED: &str = "Incorrect password. Use /generate to start over.";
    pub const GENERATING: &str = "Generating VPN configuration, please wait...";
    pub const ALREADY_GENERATING: &str =
        "A VPN configuration is still being generated for you, please wait.";
    pub const DELIVERY_HEADER: &str = "Here is your OpenVPN configuration file:";
    pub const CANCELLED: &str = "Operation cancelled.";
    pub const CHECKING_SERVERS: &str = "Checking server status ⏳";
    pub const NO_SERVERS: &str = "No servers are configured for health checks.";
    pub const FALLBACK: &str = "Choose an action using the buttons 👇";

    pub fn failure(detail: &str) -> String {
        format!("An error occurred: {}", detail)
    }
}
