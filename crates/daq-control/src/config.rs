use std::time::Duration;

pub const DEFAULT_GROUP: &str = "daqling";
pub const DEFAULT_SUPERVISOR_PORT: u16 = 9001;
pub const DEFAULT_PLACEHOLDER_KEYS: &[&str] =
    &["DAQ_BUILD_DIR", "LD_LIBRARY_PATH", "DAQ_LOG_DIR", "DAQ_SCRIPT_DIR"];

/// Poll schedule for the environment helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(50),
            max_attempts: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    pub group: String,
    pub supervisor_port: u16,
    pub rpc_timeout: Duration,
    pub env_poll: PollBudget,
    /// Host variables recognised as `%(ENV_<KEY>)s` placeholders.
    pub placeholder_keys: Vec<String>,
    pub user: String,
    /// When off, status never falls back to the supervisor.
    pub use_supervisor: bool,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_GROUP.to_string(),
            supervisor_port: DEFAULT_SUPERVISOR_PORT,
            rpc_timeout: Duration::from_millis(5000),
            env_poll: PollBudget::default(),
            placeholder_keys: DEFAULT_PLACEHOLDER_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            user: String::new(),
            use_supervisor: true,
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u64(raw: Option<String>) -> Option<u64> {
    raw.as_deref()?.trim().parse::<u64>().ok()
}

fn parse_flag(raw: Option<String>, default: bool) -> bool {
    match raw
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_rpc_timeout(raw: Option<String>) -> Duration {
    let ms = parse_u64(raw).unwrap_or(5000).clamp(100, 10 * 60_000);
    Duration::from_millis(ms)
}

fn parse_poll(interval: Option<String>, attempts: Option<String>) -> PollBudget {
    let interval_ms = parse_u64(interval).unwrap_or(50).clamp(1, 5000);
    let max_attempts = parse_u64(attempts).unwrap_or(20).clamp(1, 1000) as u32;
    PollBudget {
        interval: Duration::from_millis(interval_ms),
        max_attempts,
    }
}

fn parse_keys(raw: Option<String>) -> Vec<String> {
    let keys: Vec<String> = raw
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| k.to_string())
        .collect();
    if keys.is_empty() {
        DEFAULT_PLACEHOLDER_KEYS
            .iter()
            .map(|k| k.to_string())
            .collect()
    } else {
        keys
    }
}

impl ControlConfig {
    pub fn from_env() -> Self {
        Self {
            group: env("DAQ_GROUP").unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            supervisor_port: env("DAQ_SUPERVISOR_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .filter(|p| *p != 0)
                .unwrap_or(DEFAULT_SUPERVISOR_PORT),
            rpc_timeout: parse_rpc_timeout(env("DAQ_RPC_TIMEOUT_MS")),
            env_poll: parse_poll(
                env("DAQ_ENV_POLL_INTERVAL_MS"),
                env("DAQ_ENV_POLL_ATTEMPTS"),
            ),
            placeholder_keys: parse_keys(env("DAQ_PLACEHOLDER_KEYS")),
            user: env("USER").unwrap_or_default(),
            use_supervisor: parse_flag(env("DAQ_USE_SUPERVISOR"), true),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }
}
