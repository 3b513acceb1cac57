use std::{collections::BTreeMap, sync::Arc};

use daq_process::{Component, ModuleStatus, STATUS_UNKNOWN, StatusReport};
use daq_proto::component_v1::CommandResult;
use prost::Message;

use crate::error::RpcError;
use crate::transport::ComponentRpc;

pub const STATUS_SUCCESS: &str = "Success";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ModuleReply {
    pub status: String,
    pub response: String,
}

/// Decoded command reply.
///
/// `status` says whether the component executed the command; for `status`
/// requests the per-module state is in each module's `response`.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DecodedResponse {
    pub status: String,
    pub response: String,
    pub modules: BTreeMap<String, ModuleReply>,
}

impl DecodedResponse {
    pub fn decode(payload: &[u8]) -> Result<Self, RpcError> {
        let result = CommandResult::decode(payload)
            .map_err(|e| RpcError::Decode(format!("invalid command result: {e}")))?;
        if result.status.is_empty() {
            return Err(RpcError::Decode("command result has no status".to_string()));
        }
        Ok(Self {
            status: result.status,
            response: result.response,
            modules: result
                .modules
                .into_iter()
                .map(|(name, m)| {
                    (
                        name,
                        ModuleReply {
                            status: m.status,
                            response: m.response,
                        },
                    )
                })
                .collect(),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// One entry per declared module of `component`, in declaration order.
    pub fn status_report(&self, component: &Component) -> StatusReport {
        if !self.is_success() {
            return StatusReport::uniform(component, STATUS_UNKNOWN);
        }
        StatusReport {
            entries: component
                .module_names()
                .map(|name| {
                    let state = match self.modules.get(name) {
                        Some(m) if m.status == STATUS_SUCCESS => m.response.clone(),
                        _ => STATUS_UNKNOWN.to_string(),
                    };
                    ModuleStatus {
                        module: name.to_string(),
                        state,
                    }
                })
                .collect(),
        }
    }
}

/// Client of the components' own command endpoints. Never retries.
#[derive(Clone)]
pub struct ComponentCommandClient {
    rpc: Arc<dyn ComponentRpc>,
}

impl ComponentCommandClient {
    pub fn new(rpc: Arc<dyn ComponentRpc>) -> Self {
        Self { rpc }
    }

    pub async fn send(
        &self,
        host: &str,
        port: u16,
        command: &str,
        args: Vec<String>,
    ) -> Result<DecodedResponse, RpcError> {
        let payload = self.rpc.call(host, port, command, args).await?;
        let decoded = DecodedResponse::decode(&payload)?;
        if !decoded.is_success() {
            tracing::debug!(
                host,
                port,
                command,
                status = %decoded.status,
                response = %decoded.response,
                "component rejected command"
            );
        }
        Ok(decoded)
    }

    pub async fn configure(
        &self,
        host: &str,
        port: u16,
        document: &str,
    ) -> Result<DecodedResponse, RpcError> {
        self.send(host, port, "configure", vec![document.to_string()])
            .await
    }

    pub async fn unconfigure(&self, host: &str, port: u16) -> Result<DecodedResponse, RpcError> {
        self.send(host, port, "unconfigure", Vec::new()).await
    }

    pub async fn start(
        &self,
        host: &str,
        port: u16,
        run_number: u32,
    ) -> Result<DecodedResponse, RpcError> {
        self.send(host, port, "start", vec![run_number.to_string()])
            .await
    }

    pub async fn stop(&self, host: &str, port: u16) -> Result<DecodedResponse, RpcError> {
        self.send(host, port, "stop", Vec::new()).await
    }

    pub async fn shutdown(&self, host: &str, port: u16) -> Result<DecodedResponse, RpcError> {
        self.send(host, port, "down", Vec::new()).await
    }

    pub async fn custom(
        &self,
        host: &str,
        port: u16,
        name: &str,
        arg: Option<&str>,
    ) -> Result<DecodedResponse, RpcError> {
        let mut args = vec![name.to_string()];
        args.extend(arg.map(str::to_string));
        self.send(host, port, "custom", args).await
    }

    pub async fn status(&self, host: &str, port: u16) -> Result<DecodedResponse, RpcError> {
        self.send(host, port, "status", Vec::new()).await
    }

    /// Status of every module `component` declares.
    pub async fn status_report(&self, component: &Component) -> Result<StatusReport, RpcError> {
        let reply = self.status(&component.host, component.port).await?;
        Ok(reply.status_report(component))
    }
}
