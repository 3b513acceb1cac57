use std::{collections::BTreeMap, sync::Arc};

use daq_process::{ManagedProcessSpec, ProcessLifecycleState};
use daq_proto::supervisor_v1::ProcessInfo;

use crate::error::RpcError;
use crate::transport::{LogKind, SupervisorRpc};

/// Typed supervisor client scoped to one `(host, group)`.
#[derive(Clone)]
pub struct RemoteProcessSupervisor {
    host: String,
    group: String,
    rpc: Arc<dyn SupervisorRpc>,
}

impl RemoteProcessSupervisor {
    pub fn new(host: impl Into<String>, group: impl Into<String>, rpc: Arc<dyn SupervisorRpc>) -> Self {
        Self {
            host: host.into(),
            group: group.into(),
            rpc,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}:{}", self.group, name)
    }

    pub async fn add(&self, spec: &ManagedProcessSpec) -> Result<(), RpcError> {
        self.add_settings(&spec.name, spec.settings()).await
    }

    pub async fn add_settings(
        &self,
        name: &str,
        settings: BTreeMap<String, String>,
    ) -> Result<(), RpcError> {
        self.rpc
            .add_program_to_group(&self.group, name, settings)
            .await
    }

    /// Stops the process if needed, then drops its registration.
    ///
    /// Removing an unknown process succeeds. A state that cannot be read is
    /// treated as possibly running. A failed stop is returned as is; the
    /// registration is kept so the process is never orphaned.
    pub async fn remove(&self, name: &str) -> Result<(), RpcError> {
        let state = match self.info(name).await {
            Ok(info) => ProcessLifecycleState::from_supervisor(info.state, info.start),
            Err(e) if e.is_bad_name() => return Ok(()),
            Err(e) => {
                tracing::debug!(host = %self.host, process = name, error = %e, "state query failed before remove");
                ProcessLifecycleState::Unknown
            }
        };

        if !state.is_terminal() {
            tracing::debug!(host = %self.host, group = %self.group, process = name, %state, "stopping before remove");
            match self.stop(name).await {
                Ok(()) => {}
                Err(e) if e.is_not_running() || e.is_bad_name() => {}
                Err(e) => return Err(e),
            }
        }

        match self
            .rpc
            .remove_process_from_group(&self.group, name)
            .await
        {
            Err(e) if e.is_bad_name() => Ok(()),
            other => other,
        }
    }

    pub async fn start(&self, name: &str) -> Result<(), RpcError> {
        self.rpc.start_process(&self.qualified(name), true).await
    }

    pub async fn stop(&self, name: &str) -> Result<(), RpcError> {
        self.rpc.stop_process(&self.qualified(name), true).await
    }

    pub async fn info(&self, name: &str) -> Result<ProcessInfo, RpcError> {
        self.rpc.get_process_info(&self.qualified(name)).await
    }

    /// Lifecycle state, never more specific than the last answer justifies.
    pub async fn state(&self, name: &str) -> ProcessLifecycleState {
        match self.info(name).await {
            Ok(info) => ProcessLifecycleState::from_supervisor(info.state, info.start),
            Err(e) if e.is_bad_name() => ProcessLifecycleState::NotRegistered,
            Err(e) => {
                tracing::debug!(host = %self.host, process = name, error = %e, "state query failed");
                ProcessLifecycleState::Unknown
            }
        }
    }

    pub async fn has_process(&self, name: &str) -> bool {
        match self.rpc.get_all_process_info().await {
            Ok(all) => all
                .iter()
                .any(|p| p.group == self.group && p.name == name),
            Err(e) => {
                tracing::warn!(host = %self.host, error = %e, "process listing failed");
                false
            }
        }
    }

    /// All processes of this group.
    pub async fn list(&self) -> Result<Vec<ProcessInfo>, RpcError> {
        Ok(self
            .rpc
            .get_all_process_info()
            .await?
            .into_iter()
            .filter(|p| p.group == self.group)
            .collect())
    }

    pub async fn process_ids(&self) -> Result<BTreeMap<String, u32>, RpcError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|p| (p.name, p.pid))
            .collect())
    }

    pub async fn read_log(&self, name: &str, kind: LogKind) -> Result<Vec<u8>, RpcError> {
        self.rpc.read_process_log(&self.qualified(name), kind).await
    }

    pub async fn clear_logs(&self, name: &str) -> Result<(), RpcError> {
        self.rpc.clear_process_logs(&self.qualified(name)).await
    }
}
