use std::collections::BTreeMap;

/// Environment visible to processes launched on one host, keyed by variable name.
pub type EnvironmentMap = BTreeMap<String, String>;

/// Module status reported when nothing better could be determined.
pub const STATUS_UNKNOWN: &str = "unknown";
/// Module status used when the supervisor holds a record for the process.
pub const STATUS_ADDED: &str = "added";
/// Module status used when the supervisor has no record of the process.
pub const STATUS_NOT_ADDED: &str = "not_added";

/// Raw state codes of the process-supervision protocol.
pub mod supervisor_state {
    pub const STOPPED: i32 = 0;
    pub const STARTING: i32 = 10;
    pub const RUNNING: i32 = 20;
    pub const BACKOFF: i32 = 30;
    pub const STOPPING: i32 = 40;
    pub const EXITED: i32 = 100;
    pub const FATAL: i32 = 200;
    pub const UNKNOWN: i32 = 1000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProcessLifecycleState {
    NotRegistered,
    Registered,
    Starting,
    Running,
    Stopping,
    Stopped,
    Unknown,
}

impl ProcessLifecycleState {
    /// Maps a supervisor record onto the lifecycle vocabulary.
    ///
    /// `start` is the supervisor's last start timestamp; a stopped record that
    /// was never started is `Registered`, not `Stopped`.
    pub fn from_supervisor(state: i32, start: i64) -> Self {
        match state {
            supervisor_state::STOPPED if start == 0 => Self::Registered,
            supervisor_state::STOPPED | supervisor_state::EXITED | supervisor_state::FATAL => {
                Self::Stopped
            }
            supervisor_state::STARTING | supervisor_state::BACKOFF => Self::Starting,
            supervisor_state::RUNNING => Self::Running,
            supervisor_state::STOPPING => Self::Stopping,
            _ => Self::Unknown,
        }
    }

    /// States from which a process can be removed without stopping it first.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Registered | Self::Stopped)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotRegistered => "not_registered",
            Self::Registered => "registered",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProcessLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the supervisor needs to launch one managed process.
///
/// NOTE: Fields may still contain `%(KEY)s` placeholders. The supervisor
/// expands `ENV_*` keys on the target host; the control plane expands them
/// itself only to report resolved values back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ManagedProcessSpec {
    pub name: String,
    pub executable: String,
    pub directory: String,
    /// Launcher prepended to the executable (e.g. `python3`), may be empty.
    pub command: String,
    pub environment: BTreeMap<String, String>,
    pub log_file: String,
    pub user: String,
}

impl ManagedProcessSpec {
    pub fn command_line(&self) -> String {
        format!("{} {}{}", self.command, self.directory, self.executable)
            .trim_start()
            .to_string()
    }

    /// Supervisor `environment` value: `KEY=value` pairs joined by commas.
    pub fn environment_line(&self) -> String {
        self.environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Program settings submitted with `addProgramToGroup`.
    pub fn settings(&self) -> BTreeMap<String, String> {
        let mut s = BTreeMap::new();
        s.insert("command".to_string(), self.command_line());
        s.insert("directory".to_string(), self.directory.clone());
        s.insert("autorestart".to_string(), "false".to_string());
        s.insert("startretries".to_string(), "0".to_string());
        if !self.environment.is_empty() {
            s.insert("environment".to_string(), self.environment_line());
        }
        if !self.user.is_empty() {
            s.insert("user".to_string(), self.user.clone());
        }
        s.insert("stdout_logfile".to_string(), self.log_file.clone());
        s.insert("stdout_logfile_maxbytes".to_string(), "0".to_string());
        s.insert("stdout_logfile_backups".to_string(), "0".to_string());
        s.insert("stderr_logfile".to_string(), self.log_file.clone());
        s
    }

    /// Applies `f` to every field that may carry placeholders.
    pub fn map_templates(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            name: self.name.clone(),
            executable: f(&self.executable),
            directory: f(&self.directory),
            command: f(&self.command),
            environment: self
                .environment
                .iter()
                .map(|(k, v)| (k.clone(), f(v)))
                .collect(),
            log_file: f(&self.log_file),
            user: self.user.clone(),
        }
    }
}

fn default_level() -> String {
    "INFO".to_string()
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LogLevels {
    #[serde(default = "default_level")]
    pub core: String,
    #[serde(default = "default_level")]
    pub module: String,
    #[serde(default = "default_level")]
    pub connection: String,
}

impl Default for LogLevels {
    fn default() -> Self {
        Self {
            core: default_level(),
            module: default_level(),
            connection: default_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Module {
    pub name: String,
    /// Module settings passed through untouched in the configure document.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Module {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// A deployed DAQ process exposing its own command endpoint.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Component {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub loglevel: LogLevels,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Component {
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }
}

/// Auxiliary process (e.g. a monitoring script) run next to components.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Script {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub command: String,
    pub executable: String,
    #[serde(default)]
    pub directory: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ModuleStatus {
    pub module: String,
    pub state: String,
}

/// Per-module states of one component, in the component's module order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatusReport {
    pub entries: Vec<ModuleStatus>,
}

impl StatusReport {
    /// Same `state` for every declared module of `component`.
    pub fn uniform(component: &Component, state: &str) -> Self {
        Self {
            entries: component
                .module_names()
                .map(|m| ModuleStatus {
                    module: m.to_string(),
                    state: state.to_string(),
                })
                .collect(),
        }
    }

    pub fn states(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.state.as_str()).collect()
    }
}
