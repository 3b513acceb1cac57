//! In-memory supervisor and component endpoints for tests.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use daq_process::{Component, supervisor_state};
use daq_proto::component_v1::{CommandResult, ModuleResult};
use daq_proto::supervisor_v1::ProcessInfo;
use prost::Message;

use crate::error::{FaultKind, RpcError};
use crate::transport::{ComponentRpc, LogKind, SupervisorConnector, SupervisorRpc};

#[derive(Debug, Clone)]
struct FakeProcess {
    group: String,
    name: String,
    settings: BTreeMap<String, String>,
    state: i32,
    start: i64,
    pid: u32,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// State queries left before a running helper exits.
    polls_left: u32,
}

#[derive(Default)]
struct SupervisorInner {
    processes: BTreeMap<String, FakeProcess>,
    calls: Vec<String>,
    failing: HashSet<String>,
    unreachable: bool,
    helper_stdout: String,
    helper_stderr: String,
    helper_hangs: bool,
    helper_polls: u32,
    next_pid: u32,
}

/// Supervisor that keeps its process table in memory.
///
/// Programs whose command contains `export -p` behave like the environment
/// helper: they exit immediately and leave the configured stdout behind.
#[derive(Default)]
pub struct FakeSupervisor {
    inner: Mutex<SupervisorInner>,
}

fn statename(state: i32) -> &'static str {
    match state {
        supervisor_state::STOPPED => "STOPPED",
        supervisor_state::STARTING => "STARTING",
        supervisor_state::RUNNING => "RUNNING",
        supervisor_state::BACKOFF => "BACKOFF",
        supervisor_state::STOPPING => "STOPPING",
        supervisor_state::EXITED => "EXITED",
        supervisor_state::FATAL => "FATAL",
        _ => "UNKNOWN",
    }
}

fn is_active(state: i32) -> bool {
    matches!(
        state,
        supervisor_state::STARTING | supervisor_state::RUNNING | supervisor_state::STOPPING
    )
}

impl FakeSupervisor {
    pub fn unreachable() -> Self {
        let fake = Self::default();
        fake.lock().unreachable = true;
        fake
    }

    fn lock(&self) -> MutexGuard<'_, SupervisorInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every call of `method` fail with a remote fault.
    pub fn fail_method(&self, method: &str) {
        self.lock().failing.insert(method.to_string());
    }

    pub fn heal_method(&self, method: &str) {
        self.lock().failing.remove(method);
    }

    pub fn set_helper_output(&self, stdout: &str) {
        self.lock().helper_stdout = stdout.to_string();
    }

    pub fn set_helper_stderr(&self, stderr: &str) {
        self.lock().helper_stderr = stderr.to_string();
    }

    /// The helper keeps running forever once started.
    pub fn helper_hangs(&self) {
        self.lock().helper_hangs = true;
    }

    /// The helper stays running for `polls` state queries, then exits.
    pub fn helper_runs_for(&self, polls: u32) {
        self.lock().helper_polls = polls;
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn is_registered(&self, group: &str, name: &str) -> bool {
        self.lock()
            .processes
            .values()
            .any(|p| p.group == group && p.name == name)
    }

    pub fn settings_of(&self, qualified: &str) -> Option<BTreeMap<String, String>> {
        self.lock()
            .processes
            .get(qualified)
            .map(|p| p.settings.clone())
    }

    pub fn insert_running(&self, group: &str, name: &str, command: &str) {
        let mut inner = self.lock();
        inner.next_pid += 1;
        let pid = inner.next_pid;
        inner.processes.insert(
            format!("{group}:{name}"),
            FakeProcess {
                group: group.to_string(),
                name: name.to_string(),
                settings: BTreeMap::from([("command".to_string(), command.to_string())]),
                state: supervisor_state::RUNNING,
                start: 1,
                pid,
                stdout: Vec::new(),
                stderr: Vec::new(),
                polls_left: 0,
            },
        );
    }

    /// Records the call and applies reachability and injected failures.
    fn enter(&self, method: &str, target: &str) -> Result<MutexGuard<'_, SupervisorInner>, RpcError> {
        let mut inner = self.lock();
        inner.calls.push(format!("{method} {target}").trim_end().to_string());
        if inner.unreachable {
            return Err(RpcError::unavailable("fake", "connection refused"));
        }
        if inner.failing.contains(method) {
            return Err(RpcError::fault(FaultKind::Rejected, format!("{method} failed")));
        }
        Ok(inner)
    }
}

fn bad_name(qualified: &str) -> RpcError {
    RpcError::fault(FaultKind::BadName, format!("BAD_NAME: {qualified}"))
}

#[tonic::async_trait]
impl SupervisorRpc for FakeSupervisor {
    async fn add_program_to_group(
        &self,
        group: &str,
        name: &str,
        settings: BTreeMap<String, String>,
    ) -> Result<(), RpcError> {
        let qualified = format!("{group}:{name}");
        let mut inner = self.enter("add", &qualified)?;
        if inner.processes.contains_key(&qualified) {
            return Err(RpcError::fault(
                FaultKind::Rejected,
                format!("BAD_NAME: {qualified} already added"),
            ));
        }
        inner.processes.insert(
            qualified,
            FakeProcess {
                group: group.to_string(),
                name: name.to_string(),
                settings,
                state: supervisor_state::STOPPED,
                start: 0,
                pid: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
                polls_left: 0,
            },
        );
        Ok(())
    }

    async fn remove_process_from_group(&self, group: &str, name: &str) -> Result<(), RpcError> {
        let qualified = format!("{group}:{name}");
        let mut inner = self.enter("remove", &qualified)?;
        let Some(p) = inner.processes.get(&qualified) else {
            return Err(bad_name(&qualified));
        };
        if is_active(p.state) {
            return Err(RpcError::fault(
                FaultKind::Rejected,
                format!("STILL_RUNNING: {qualified}"),
            ));
        }
        inner.processes.remove(&qualified);
        Ok(())
    }

    async fn start_process(&self, qualified: &str, _wait: bool) -> Result<(), RpcError> {
        let mut inner = self.enter("start", qualified)?;
        inner.next_pid += 1;
        let pid = inner.next_pid;
        let (stdout, stderr, hangs, polls) = (
            inner.helper_stdout.clone(),
            inner.helper_stderr.clone(),
            inner.helper_hangs,
            inner.helper_polls,
        );
        let Some(p) = inner.processes.get_mut(qualified) else {
            return Err(bad_name(qualified));
        };
        if is_active(p.state) {
            return Err(RpcError::fault(
                FaultKind::AlreadyStarted,
                format!("ALREADY_STARTED: {qualified}"),
            ));
        }
        p.start = 1;
        p.pid = pid;
        let helper = p
            .settings
            .get("command")
            .is_some_and(|c| c.contains("export -p"));
        if helper && !hangs {
            p.stdout.extend_from_slice(stdout.as_bytes());
            p.stderr.extend_from_slice(stderr.as_bytes());
            p.polls_left = polls;
            p.state = if polls == 0 {
                supervisor_state::EXITED
            } else {
                supervisor_state::RUNNING
            };
        } else {
            p.state = supervisor_state::RUNNING;
        }
        Ok(())
    }

    async fn stop_process(&self, qualified: &str, _wait: bool) -> Result<(), RpcError> {
        let mut inner = self.enter("stop", qualified)?;
        let Some(p) = inner.processes.get_mut(qualified) else {
            return Err(bad_name(qualified));
        };
        if !is_active(p.state) {
            return Err(RpcError::fault(
                FaultKind::NotRunning,
                format!("NOT_RUNNING: {qualified}"),
            ));
        }
        p.state = supervisor_state::STOPPED;
        Ok(())
    }

    async fn get_process_info(&self, qualified: &str) -> Result<ProcessInfo, RpcError> {
        let mut inner = self.enter("info", qualified)?;
        let p = inner
            .processes
            .get_mut(qualified)
            .ok_or_else(|| bad_name(qualified))?;
        if p.state == supervisor_state::RUNNING && p.polls_left > 0 {
            p.polls_left -= 1;
            if p.polls_left == 0 {
                p.state = supervisor_state::EXITED;
            }
        }
        Ok(info_of(p))
    }

    async fn get_all_process_info(&self) -> Result<Vec<ProcessInfo>, RpcError> {
        let inner = self.enter("list", "")?;
        Ok(inner.processes.values().map(info_of).collect())
    }

    async fn read_process_log(&self, qualified: &str, kind: LogKind) -> Result<Vec<u8>, RpcError> {
        let inner = self.enter("read", qualified)?;
        let p = inner
            .processes
            .get(qualified)
            .ok_or_else(|| bad_name(qualified))?;
        Ok(match kind {
            LogKind::Stdout => p.stdout.clone(),
            LogKind::Stderr => p.stderr.clone(),
        })
    }

    async fn clear_process_logs(&self, qualified: &str) -> Result<(), RpcError> {
        let mut inner = self.enter("clear", qualified)?;
        let p = inner
            .processes
            .get_mut(qualified)
            .ok_or_else(|| bad_name(qualified))?;
        p.stdout.clear();
        p.stderr.clear();
        Ok(())
    }
}

fn info_of(p: &FakeProcess) -> ProcessInfo {
    ProcessInfo {
        name: p.name.clone(),
        group: p.group.clone(),
        state: p.state,
        statename: statename(p.state).to_string(),
        pid: p.pid,
        start: p.start,
        description: String::new(),
    }
}

/// One [`FakeSupervisor`] per host, created on first use.
#[derive(Default)]
pub struct FakeSupervisors {
    hosts: Mutex<HashMap<String, Arc<FakeSupervisor>>>,
}

impl FakeSupervisors {
    pub fn host(&self, host: &str) -> Arc<FakeSupervisor> {
        self.hosts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(host.to_string())
            .or_default()
            .clone()
    }

    pub fn insert(&self, host: &str, fake: FakeSupervisor) -> Arc<FakeSupervisor> {
        let fake = Arc::new(fake);
        self.hosts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(host.to_string(), fake.clone());
        fake
    }
}

impl SupervisorConnector for FakeSupervisors {
    fn connect(&self, host: &str) -> Arc<dyn SupervisorRpc> {
        self.host(host)
    }
}

#[derive(Default)]
struct FakeEndpoint {
    modules: BTreeMap<String, String>,
    raw_reply: Option<Vec<u8>>,
    status_fails: bool,
    failing_modules: HashSet<String>,
}

/// Component command endpoints that track per-module states.
#[derive(Default)]
pub struct FakeComponents {
    endpoints: Mutex<HashMap<(String, u16), FakeEndpoint>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeComponents {
    fn lock(&self) -> MutexGuard<'_, HashMap<(String, u16), FakeEndpoint>> {
        self.endpoints.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_endpoint(&self, host: &str, port: u16, f: impl FnOnce(&mut FakeEndpoint)) {
        f(self.lock().entry((host.to_string(), port)).or_default());
    }

    /// Makes `host:port` answer.
    pub fn serve(&self, host: &str, port: u16) {
        self.with_endpoint(host, port, |_| {});
    }

    pub fn set_raw_reply(&self, host: &str, port: u16, payload: &[u8]) {
        self.with_endpoint(host, port, |e| e.raw_reply = Some(payload.to_vec()));
    }

    pub fn fail_status(&self, host: &str, port: u16) {
        self.with_endpoint(host, port, |e| e.status_fails = true);
    }

    pub fn fail_module(&self, host: &str, port: u16, module: &str) {
        self.with_endpoint(host, port, |e| {
            e.failing_modules.insert(module.to_string());
        });
    }

    pub fn set_module_state(&self, host: &str, port: u16, module: &str, state: &str) {
        self.with_endpoint(host, port, |e| {
            e.modules.insert(module.to_string(), state.to_string());
        });
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn success(modules: &BTreeMap<String, String>) -> CommandResult {
    CommandResult {
        status: "Success".to_string(),
        response: String::new(),
        modules: modules
            .keys()
            .map(|m| {
                (
                    m.clone(),
                    ModuleResult {
                        status: "Success".to_string(),
                        response: String::new(),
                    },
                )
            })
            .collect(),
    }
}

fn error(response: &str) -> CommandResult {
    CommandResult {
        status: "Error".to_string(),
        response: response.to_string(),
        modules: BTreeMap::new(),
    }
}

fn transition(e: &mut FakeEndpoint, state: &str) -> CommandResult {
    if e.modules.is_empty() {
        return error("No modules eligible for command.");
    }
    for s in e.modules.values_mut() {
        *s = state.to_string();
    }
    success(&e.modules)
}

#[tonic::async_trait]
impl ComponentRpc for FakeComponents {
    async fn call(
        &self,
        host: &str,
        port: u16,
        command: &str,
        args: Vec<String>,
    ) -> Result<Vec<u8>, RpcError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((command.to_string(), args.clone()));

        let mut endpoints = self.lock();
        let Some(e) = endpoints.get_mut(&(host.to_string(), port)) else {
            return Err(RpcError::unavailable(
                format!("http://{host}:{port}"),
                "connection refused",
            ));
        };
        if let Some(raw) = &e.raw_reply {
            return Ok(raw.clone());
        }

        let result = match command {
            "configure" => match args
                .first()
                .map(|doc| serde_json::from_str::<Component>(doc))
            {
                Some(Ok(c)) => {
                    e.modules = c
                        .module_names()
                        .map(|m| (m.to_string(), "ready".to_string()))
                        .collect();
                    success(&e.modules)
                }
                _ => error("invalid configuration"),
            },
            "unconfigure" => transition(e, "booted"),
            "start" => transition(e, "running"),
            "stop" => transition(e, "ready"),
            "down" => {
                e.modules.clear();
                success(&BTreeMap::new())
            }
            "custom" => success(&e.modules),
            "status" if e.status_fails => error("status failed"),
            "status" => CommandResult {
                status: "Success".to_string(),
                response: String::new(),
                modules: e
                    .modules
                    .iter()
                    .map(|(m, state)| {
                        let status = if e.failing_modules.contains(m) {
                            "Error"
                        } else {
                            "Success"
                        };
                        (
                            m.clone(),
                            ModuleResult {
                                status: status.to_string(),
                                response: state.clone(),
                            },
                        )
                    })
                    .collect(),
            },
            other => error(&format!("unknown command {other}")),
        };
        Ok(result.encode_to_vec())
    }
}
