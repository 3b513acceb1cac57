use std::{collections::BTreeMap, sync::Arc};

use daq_process::ManagedProcessSpec;

use crate::environment::EnvironmentResolver;
use crate::error::RpcError;
use crate::supervisor::RemoteProcessSupervisor;
use crate::template::{self, PlaceholderVocabulary};
use crate::transport::SupervisorConnector;

/// Outcome of registering one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub host: String,
    pub log_file: String,
    pub settings: BTreeMap<String, String>,
    /// False when the host environment was unavailable and placeholders were
    /// left unexpanded.
    pub resolved: bool,
}

/// Input for [`ProcessRegistrar::add_component_process`].
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub name: String,
    pub executable: String,
    pub directory: String,
    pub environment: BTreeMap<String, String>,
    pub command: String,
}

pub fn log_file_template(name: &str, user: &str, stamp: &str) -> String {
    format!(
        "{}{name}-{user}-{stamp}.log",
        template::placeholder("ENV_DAQ_LOG_DIR")
    )
}

#[derive(Clone)]
pub struct ProcessRegistrar {
    connector: Arc<dyn SupervisorConnector>,
    resolver: EnvironmentResolver,
    vocabulary: PlaceholderVocabulary,
    group: String,
    user: String,
}

impl ProcessRegistrar {
    pub fn new(
        connector: Arc<dyn SupervisorConnector>,
        resolver: EnvironmentResolver,
        vocabulary: PlaceholderVocabulary,
        group: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            resolver,
            vocabulary,
            group: group.into(),
            user: user.into(),
        }
    }

    pub fn supervisor(&self, host: &str) -> RemoteProcessSupervisor {
        RemoteProcessSupervisor::new(host, &self.group, self.connector.connect(host))
    }

    /// Registers `req` on `host` without starting it.
    ///
    /// The submitted settings keep their placeholders, the supervisor expands
    /// them on the host. The returned settings are expanded against the host
    /// environment when it could be resolved.
    pub async fn add_component_process(
        &self,
        host: &str,
        req: ProcessRequest,
    ) -> Result<Registration, RpcError> {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let spec = ManagedProcessSpec {
            log_file: log_file_template(&req.name, &self.user, &stamp),
            name: req.name,
            executable: req.executable,
            directory: req.directory,
            command: req.command,
            environment: req.environment,
            user: self.user.clone(),
        };

        let supervisor = self.supervisor(host);
        supervisor.add(&spec).await?;

        let env = match self.resolver.resolve(&supervisor).await {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(host, process = %spec.name, error = %e, "environment unresolved, keeping placeholders");
                Default::default()
            }
        };
        let vars = self.vocabulary.variables(&env);
        let resolved = !vars.is_empty();
        let spec = if resolved {
            spec.map_templates(|s| template::substitute(s, &vars))
        } else {
            spec
        };

        tracing::info!(
            host,
            group = %self.group,
            process = %spec.name,
            command = %spec.command_line(),
            directory = %spec.directory,
            log_file = %spec.log_file,
            resolved,
            "added program"
        );

        Ok(Registration {
            host: host.to_string(),
            log_file: spec.log_file.clone(),
            settings: spec.settings(),
            resolved,
        })
    }
}
