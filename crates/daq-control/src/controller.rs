use std::{collections::BTreeMap, sync::Arc};

use daq_process::{
    Component, STATUS_ADDED, STATUS_NOT_ADDED, STATUS_UNKNOWN, Script, StatusReport,
};

use crate::component::{ComponentCommandClient, DecodedResponse};
use crate::config::ControlConfig;
use crate::environment::EnvironmentResolver;
use crate::error::RpcError;
use crate::registrar::{ProcessRegistrar, ProcessRequest};
use crate::supervisor::RemoteProcessSupervisor;
use crate::template::{PlaceholderVocabulary, placeholder};
use crate::transport::{
    ComponentRpc, GrpcComponentRpc, GrpcSupervisorConnector, SupervisorConnector,
};

/// Host and log file of one registered process.
pub type LogLocation = (String, String);

const COMPONENT_EXECUTABLE: &str = "bin/daqling";

fn component_request(c: &Component) -> ProcessRequest {
    let build_dir = placeholder("ENV_DAQ_BUILD_DIR");
    let executable = format!(
        "{COMPONENT_EXECUTABLE} --name {} --port {} --core_lvl {} --module_lvl {} --connection_lvl {}",
        c.name, c.port, c.loglevel.core, c.loglevel.module, c.loglevel.connection
    );
    let environment = BTreeMap::from([
        (
            "LD_LIBRARY_PATH".to_string(),
            format!("{}:{build_dir}/lib/", placeholder("ENV_LD_LIBRARY_PATH")),
        ),
        (
            "TDAQ_ERS_STREAM_LIBS".to_string(),
            "DaqlingStreams".to_string(),
        ),
    ]);
    ProcessRequest {
        name: c.name.clone(),
        executable,
        directory: build_dir,
        environment,
        command: String::new(),
    }
}

// DAQ_SCRIPT_DIR is resolved on the target host, not here.
fn script_request(s: &Script) -> ProcessRequest {
    ProcessRequest {
        name: s.name.clone(),
        executable: s.executable.clone(),
        directory: format!("{}{}", placeholder("ENV_DAQ_SCRIPT_DIR"), s.directory),
        environment: BTreeMap::new(),
        command: s.command.clone(),
    }
}

fn configuration_document(c: &Component) -> Result<String, RpcError> {
    serde_json::to_string(c)
        .map_err(|e| RpcError::Encode(format!("configuration of {}: {e}", c.name)))
}

/// Orchestrates a deployment: registration through the supervisors, runtime
/// commands straight to the components.
#[derive(Clone)]
pub struct DeploymentController {
    config: ControlConfig,
    registrar: ProcessRegistrar,
    components: ComponentCommandClient,
}

impl DeploymentController {
    pub fn new(
        config: ControlConfig,
        supervisors: Arc<dyn SupervisorConnector>,
        components: Arc<dyn ComponentRpc>,
    ) -> Self {
        let registrar = ProcessRegistrar::new(
            supervisors,
            EnvironmentResolver::new(config.env_poll),
            PlaceholderVocabulary::new(config.placeholder_keys.iter().cloned()),
            &config.group,
            &config.user,
        );
        Self {
            config,
            registrar,
            components: ComponentCommandClient::new(components),
        }
    }

    /// Controller over the gRPC transports.
    pub fn grpc(config: ControlConfig) -> Self {
        let supervisors = Arc::new(GrpcSupervisorConnector::new(
            config.supervisor_port,
            config.rpc_timeout,
        ));
        let components = Arc::new(GrpcComponentRpc::new(config.rpc_timeout));
        Self::new(config, supervisors, components)
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn supervisor(&self, host: &str) -> RemoteProcessSupervisor {
        self.registrar.supervisor(host)
    }

    async fn register_all<'a>(
        &self,
        items: impl IntoIterator<Item = (&'a str, ProcessRequest)>,
    ) -> Vec<LogLocation> {
        let mut logs = Vec::new();
        for (host, req) in items {
            let name = req.name.clone();
            match self.registrar.add_component_process(host, req).await {
                Ok(reg) => logs.push((reg.host, reg.log_file)),
                Err(e) => {
                    tracing::error!(host, process = %name, error = %e, "cannot add program");
                }
            }
        }
        logs
    }

    /// Registers each component's process; failed items are logged and skipped.
    pub async fn add_components(&self, components: &[Component]) -> Vec<LogLocation> {
        self.register_all(
            components
                .iter()
                .map(|c| (c.host.as_str(), component_request(c))),
        )
        .await
    }

    pub async fn add_scripts(&self, scripts: &[Script]) -> Vec<LogLocation> {
        self.register_all(scripts.iter().map(|s| (s.host.as_str(), script_request(s))))
            .await
    }

    /// Starts the registered processes. Returns the names that were started.
    pub async fn boot_components(&self, components: &[Component]) -> Vec<String> {
        let mut booted = Vec::new();
        for c in components {
            match self.supervisor(&c.host).start(&c.name).await {
                Ok(()) => booted.push(c.name.clone()),
                Err(e) => {
                    tracing::error!(host = %c.host, process = %c.name, error = %e, "cannot start program");
                }
            }
        }
        booted
    }

    /// Removes each component's process and every `extra` process on its host.
    pub async fn remove_components(&self, components: &[Component], extra: &[String]) {
        for c in components {
            let supervisor = self.supervisor(&c.host);
            for name in std::iter::once(&c.name).chain(extra) {
                if let Err(e) = supervisor.remove(name).await {
                    tracing::error!(host = %c.host, process = %name, error = %e, "cannot remove program");
                }
            }
        }
    }

    pub async fn configure(&self, c: &Component) -> Result<DecodedResponse, RpcError> {
        let document = configuration_document(c)?;
        self.components.configure(&c.host, c.port, &document).await
    }

    pub async fn unconfigure(&self, c: &Component) -> Result<DecodedResponse, RpcError> {
        self.components.unconfigure(&c.host, c.port).await
    }

    pub async fn start(&self, c: &Component, run_number: u32) -> Result<DecodedResponse, RpcError> {
        self.components.start(&c.host, c.port, run_number).await
    }

    pub async fn stop(&self, c: &Component) -> Result<DecodedResponse, RpcError> {
        self.components.stop(&c.host, c.port).await
    }

    pub async fn shutdown(&self, c: &Component) -> Result<DecodedResponse, RpcError> {
        self.components.shutdown(&c.host, c.port).await
    }

    pub async fn custom(
        &self,
        c: &Component,
        command: &str,
        arg: Option<&str>,
    ) -> Result<DecodedResponse, RpcError> {
        self.components.custom(&c.host, c.port, command, arg).await
    }

    /// Per-module status of `c`. Never fails.
    ///
    /// A component that cannot answer is looked up in the supervisor:
    /// `added` when a record exists, `not_added` when the supervisor has
    /// none, `unknown` when the supervisor cannot be asked either. An
    /// unreachable supervisor is therefore `unknown`, not `not_added`: no
    /// answer says nothing about whether the process was registered.
    pub async fn get_status(&self, c: &Component) -> StatusReport {
        let err = match self.components.status_report(c).await {
            Ok(report) => return report,
            Err(e) => e,
        };
        tracing::warn!(host = %c.host, port = c.port, component = %c.name, error = %err, "status command failed");

        if !self.config.use_supervisor {
            return StatusReport::uniform(c, STATUS_UNKNOWN);
        }
        match self.supervisor(&c.host).info(&c.name).await {
            Ok(_) => StatusReport::uniform(c, STATUS_ADDED),
            Err(e) if e.is_bad_name() => StatusReport::uniform(c, STATUS_NOT_ADDED),
            Err(e) => {
                tracing::warn!(host = %c.host, process = %c.name, error = %e, "supervisor lookup failed");
                StatusReport::uniform(c, STATUS_UNKNOWN)
            }
        }
    }

    /// Name → pid of every process of the group on `host`.
    pub async fn process_ids(&self, host: &str) -> Result<BTreeMap<String, u32>, RpcError> {
        self.supervisor(host).process_ids().await
    }
}
