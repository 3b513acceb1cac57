use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use daq_process::EnvironmentMap;
use tokio::sync::Mutex;

use crate::config::PollBudget;
use crate::error::RpcError;
use crate::supervisor::RemoteProcessSupervisor;
use crate::transport::LogKind;

/// Well-known name of the helper program; one per group and host.
pub const HELPER_NAME: &str = "printenv";

// `printenv --null` would survive multi-line values but NUL bytes break the
// supervisor's log file, so the helper dumps `export -p` instead.
fn helper_settings() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("command".to_string(), "bash -c \"export -p\"".to_string()),
        ("autostart".to_string(), "false".to_string()),
        ("autorestart".to_string(), "false".to_string()),
        ("startsecs".to_string(), "0".to_string()),
    ])
}

/// Progress of the helper saga. Each stage is only reachable from the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SagaStage {
    NotStarted,
    /// Helper added, or found from an earlier run and stopped.
    Registered,
    Started,
    /// Helper reached a terminal state within the poll budget.
    Completed,
    LogRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    ClearLogs,
    Remove,
}

impl SagaStage {
    /// Steps owed for having reached this stage, in execution order.
    pub fn compensations(self) -> Vec<Compensation> {
        let mut steps = Vec::new();
        if self >= SagaStage::Started {
            steps.push(Compensation::ClearLogs);
        }
        if self >= SagaStage::Registered {
            steps.push(Compensation::Remove);
        }
        steps
    }

    /// Failures up to here mean "no environment", not an error.
    fn swallows_failure(self) -> bool {
        self <= SagaStage::Registered
    }
}

/// One async mutex per host.
#[derive(Clone, Default)]
pub struct HostLocks {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl HostLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_for(&self, host: &str) -> Arc<Mutex<()>> {
        self.inner
            .lock()
            .await
            .entry(host.to_string())
            .or_default()
            .clone()
    }
}

struct HelperSaga {
    supervisor: RemoteProcessSupervisor,
    poll: PollBudget,
    stage: SagaStage,
}

impl HelperSaga {
    fn new(supervisor: RemoteProcessSupervisor, poll: PollBudget) -> Self {
        Self {
            supervisor,
            poll,
            stage: SagaStage::NotStarted,
        }
    }

    async fn run(&mut self) -> Result<String, RpcError> {
        let sw = &self.supervisor;

        if !sw.has_process(HELPER_NAME).await {
            sw.add_settings(HELPER_NAME, helper_settings()).await?;
        } else if !sw.state(HELPER_NAME).await.is_terminal() {
            // Left over from an interrupted run; it is ours to clean up.
            self.stage = SagaStage::Registered;
            match sw.stop(HELPER_NAME).await {
                Err(e) if !e.is_not_running() => return Err(e),
                _ => {}
            }
        }
        self.stage = SagaStage::Registered;

        if let Err(e) = sw.start(HELPER_NAME).await {
            self.report_stderr().await;
            return Err(e);
        }
        self.stage = SagaStage::Started;

        // Unknown is not terminal: a helper we cannot observe is polled to the cap.
        let mut attempts = 0u32;
        while !self.supervisor.state(HELPER_NAME).await.is_terminal() {
            attempts += 1;
            if attempts > self.poll.max_attempts {
                if let Err(e) = self.supervisor.stop(HELPER_NAME).await {
                    tracing::warn!(host = %self.supervisor.host(), error = %e, "failed to stop environment helper");
                }
                return Err(RpcError::Timeout {
                    what: format!(
                        "{}:{} on {}",
                        self.supervisor.group(),
                        HELPER_NAME,
                        self.supervisor.host()
                    ),
                });
            }
            tokio::time::sleep(self.poll.interval).await;
        }
        self.stage = SagaStage::Completed;

        let out = self
            .supervisor
            .read_log(HELPER_NAME, LogKind::Stdout)
            .await?;
        self.stage = SagaStage::LogRead;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn report_stderr(&self) {
        match self
            .supervisor
            .read_log(HELPER_NAME, LogKind::Stderr)
            .await
        {
            Ok(err) if !err.is_empty() => {
                tracing::warn!(
                    host = %self.supervisor.host(),
                    stderr = %String::from_utf8_lossy(&err).trim_end(),
                    "environment helper failed to start"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(host = %self.supervisor.host(), error = %e, "cannot read helper stderr");
            }
        }
    }

    async fn compensate(&self) {
        for step in self.stage.compensations() {
            let res = match step {
                Compensation::ClearLogs => self.supervisor.clear_logs(HELPER_NAME).await,
                Compensation::Remove => self.supervisor.remove(HELPER_NAME).await,
            };
            if let Err(e) = res {
                tracing::warn!(
                    host = %self.supervisor.host(),
                    stage = ?self.stage,
                    step = ?step,
                    error = %e,
                    "environment helper cleanup failed"
                );
            }
        }
    }
}

/// Resolves the environment processes see on a supervised host.
#[derive(Clone)]
pub struct EnvironmentResolver {
    locks: HostLocks,
    poll: PollBudget,
}

impl EnvironmentResolver {
    pub fn new(poll: PollBudget) -> Self {
        Self {
            locks: HostLocks::new(),
            poll,
        }
    }

    /// Runs the helper on the supervisor's host and parses its output.
    ///
    /// An empty map means resolution was unavailable. `Timeout` and log read
    /// failures are returned. The helper registration is always cleaned up,
    /// also when the caller drops this future early.
    pub async fn resolve(
        &self,
        supervisor: &RemoteProcessSupervisor,
    ) -> Result<EnvironmentMap, RpcError> {
        let lock = self.locks.lock_for(supervisor.host()).await;
        let supervisor = supervisor.clone();
        let poll = self.poll;

        let task = tokio::spawn(async move {
            let _guard = lock.lock().await;
            let mut saga = HelperSaga::new(supervisor, poll);
            let outcome = saga.run().await;
            saga.compensate().await;

            let host = saga.supervisor.host().to_string();
            match outcome {
                Ok(text) => Ok(parse_export_output(&text)),
                Err(e) if saga.stage.swallows_failure() => {
                    tracing::warn!(%host, stage = ?saga.stage, error = %e, "cannot determine environment");
                    Ok(EnvironmentMap::new())
                }
                Err(e) => {
                    tracing::warn!(%host, stage = ?saga.stage, error = %e, "environment helper failed");
                    Err(e)
                }
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!(error = %e, "environment resolution cancelled");
                Ok(EnvironmentMap::new())
            }
        }
    }
}

/// Parses `export -p` output (`declare -x NAME="value"` lines).
pub fn parse_export_output(output: &str) -> EnvironmentMap {
    let text = format!("\n{output}");
    let mut env = EnvironmentMap::new();
    for chunk in text.split("\ndeclare -x ") {
        let chunk = chunk.strip_suffix('\n').unwrap_or(chunk);
        if chunk.is_empty() {
            continue;
        }
        let Some((name, value)) = chunk.split_once('=') else {
            continue;
        };
        env.insert(name.to_string(), unquote(value));
    }
    env
}

/// Strips one quote layer. Double-quoted values also lose the backslash
/// bash puts before a quote, backslash, dollar or backtick.
fn unquote(v: &str) -> String {
    if v.len() < 2 {
        return v.to_string();
    }
    if v.starts_with('\'') && v.ends_with('\'') {
        return v[1..v.len() - 1].to_string();
    }
    if !(v.starts_with('"') && v.ends_with('"')) {
        return v.to_string();
    }
    let inner = &v[1..v.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(n @ ('"' | '\\' | '$' | '`')) => out.push(n),
            Some(n) => {
                out.push('\\');
                out.push(n);
            }
            None => out.push('\\'),
        }
    }
    out
}
