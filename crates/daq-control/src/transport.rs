use std::{collections::BTreeMap, sync::Arc, time::Duration};

use daq_proto::component_v1::{self, CommandReply, CommandRequest};
use daq_proto::supervisor_v1::{
    self, Ack, AddProgramToGroupRequest, ClearProcessLogsRequest, GetAllProcessInfoRequest,
    GetAllProcessInfoResponse, GetProcessInfoRequest, ProcessControlRequest, ProcessInfo,
    ReadProcessLogRequest, ReadProcessLogResponse, RemoveProcessFromGroupRequest,
};

use crate::error::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Stdout,
    Stderr,
}

/// Process-supervision protocol of one host.
///
/// Process identifiers passed to start/stop/info/log calls are qualified
/// (`"<group>:<name>"`); add/remove take the group and name separately.
#[tonic::async_trait]
pub trait SupervisorRpc: Send + Sync {
    async fn add_program_to_group(
        &self,
        group: &str,
        name: &str,
        settings: BTreeMap<String, String>,
    ) -> Result<(), RpcError>;
    async fn remove_process_from_group(&self, group: &str, name: &str) -> Result<(), RpcError>;
    async fn start_process(&self, qualified: &str, wait: bool) -> Result<(), RpcError>;
    async fn stop_process(&self, qualified: &str, wait: bool) -> Result<(), RpcError>;
    async fn get_process_info(&self, qualified: &str) -> Result<ProcessInfo, RpcError>;
    async fn get_all_process_info(&self) -> Result<Vec<ProcessInfo>, RpcError>;
    async fn read_process_log(&self, qualified: &str, kind: LogKind) -> Result<Vec<u8>, RpcError>;
    async fn clear_process_logs(&self, qualified: &str) -> Result<(), RpcError>;
}

/// Hands out the supervisor endpoint of a host.
pub trait SupervisorConnector: Send + Sync {
    fn connect(&self, host: &str) -> Arc<dyn SupervisorRpc>;
}

/// Application command endpoint of deployed components.
///
/// Returns the raw reply payload; decoding is the caller's concern.
#[tonic::async_trait]
pub trait ComponentRpc: Send + Sync {
    async fn call(
        &self,
        host: &str,
        port: u16,
        command: &str,
        args: Vec<String>,
    ) -> Result<Vec<u8>, RpcError>;
}

fn endpoint_url(host: &str, port: u16) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}

async fn unary<Req, Res>(
    endpoint: &str,
    timeout: Duration,
    method: &'static str,
    req: Req,
) -> Result<Res, RpcError>
where
    Req: prost::Message + Send + 'static,
    Res: prost::Message + Default + Send + 'static,
{
    let channel = tonic::transport::Channel::from_shared(endpoint.to_string())
        .map_err(|e| RpcError::unavailable(endpoint, format!("invalid endpoint: {e}")))?
        .connect_timeout(timeout)
        .timeout(timeout)
        .connect()
        .await
        .map_err(|e| RpcError::unavailable(endpoint, format!("connect failed: {e}")))?;

    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready()
        .await
        .map_err(|e| RpcError::unavailable(endpoint, format!("endpoint is not ready: {e}")))?;
    let mut request = tonic::Request::new(req);
    request.set_timeout(timeout);

    let path = tonic::codegen::http::uri::PathAndQuery::from_static(method);
    let codec = tonic::codec::ProstCodec::default();
    let resp = grpc
        .unary(request, path, codec)
        .await
        .map_err(|s| RpcError::from_status(endpoint, &s))?;
    Ok(resp.into_inner())
}

#[derive(Debug, Clone)]
pub struct GrpcSupervisorRpc {
    endpoint: String,
    timeout: Duration,
}

impl GrpcSupervisorRpc {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint_url(host, port),
            timeout,
        }
    }

    async fn ack<Req>(&self, method: &'static str, req: Req) -> Result<(), RpcError>
    where
        Req: prost::Message + Send + 'static,
    {
        let _: Ack = unary(&self.endpoint, self.timeout, method, req).await?;
        Ok(())
    }
}

#[tonic::async_trait]
impl SupervisorRpc for GrpcSupervisorRpc {
    async fn add_program_to_group(
        &self,
        group: &str,
        name: &str,
        settings: BTreeMap<String, String>,
    ) -> Result<(), RpcError> {
        self.ack(
            supervisor_v1::ADD_PROGRAM_TO_GROUP,
            AddProgramToGroupRequest {
                group: group.to_string(),
                name: name.to_string(),
                settings,
            },
        )
        .await
    }

    async fn remove_process_from_group(&self, group: &str, name: &str) -> Result<(), RpcError> {
        self.ack(
            supervisor_v1::REMOVE_PROCESS_FROM_GROUP,
            RemoveProcessFromGroupRequest {
                group: group.to_string(),
                name: name.to_string(),
            },
        )
        .await
    }

    async fn start_process(&self, qualified: &str, wait: bool) -> Result<(), RpcError> {
        self.ack(
            supervisor_v1::START_PROCESS,
            ProcessControlRequest {
                name: qualified.to_string(),
                wait,
            },
        )
        .await
    }

    async fn stop_process(&self, qualified: &str, wait: bool) -> Result<(), RpcError> {
        self.ack(
            supervisor_v1::STOP_PROCESS,
            ProcessControlRequest {
                name: qualified.to_string(),
                wait,
            },
        )
        .await
    }

    async fn get_process_info(&self, qualified: &str) -> Result<ProcessInfo, RpcError> {
        unary(
            &self.endpoint,
            self.timeout,
            supervisor_v1::GET_PROCESS_INFO,
            GetProcessInfoRequest {
                name: qualified.to_string(),
            },
        )
        .await
    }

    async fn get_all_process_info(&self) -> Result<Vec<ProcessInfo>, RpcError> {
        let resp: GetAllProcessInfoResponse = unary(
            &self.endpoint,
            self.timeout,
            supervisor_v1::GET_ALL_PROCESS_INFO,
            GetAllProcessInfoRequest {},
        )
        .await?;
        Ok(resp.processes)
    }

    async fn read_process_log(&self, qualified: &str, kind: LogKind) -> Result<Vec<u8>, RpcError> {
        let method = match kind {
            LogKind::Stdout => supervisor_v1::READ_PROCESS_STDOUT_LOG,
            LogKind::Stderr => supervisor_v1::READ_PROCESS_STDERR_LOG,
        };
        // offset 0 / length 0 reads the whole log.
        let resp: ReadProcessLogResponse = unary(
            &self.endpoint,
            self.timeout,
            method,
            ReadProcessLogRequest {
                name: qualified.to_string(),
                offset: 0,
                length: 0,
            },
        )
        .await?;
        Ok(resp.data)
    }

    async fn clear_process_logs(&self, qualified: &str) -> Result<(), RpcError> {
        self.ack(
            supervisor_v1::CLEAR_PROCESS_LOGS,
            ClearProcessLogsRequest {
                name: qualified.to_string(),
            },
        )
        .await
    }
}

#[derive(Debug, Clone)]
pub struct GrpcSupervisorConnector {
    port: u16,
    timeout: Duration,
}

impl GrpcSupervisorConnector {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl SupervisorConnector for GrpcSupervisorConnector {
    fn connect(&self, host: &str) -> Arc<dyn SupervisorRpc> {
        Arc::new(GrpcSupervisorRpc::new(host, self.port, self.timeout))
    }
}

#[derive(Debug, Clone)]
pub struct GrpcComponentRpc {
    timeout: Duration,
}

impl GrpcComponentRpc {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[tonic::async_trait]
impl ComponentRpc for GrpcComponentRpc {
    async fn call(
        &self,
        host: &str,
        port: u16,
        command: &str,
        args: Vec<String>,
    ) -> Result<Vec<u8>, RpcError> {
        let endpoint = endpoint_url(host, port);
        let reply: CommandReply = unary(
            &endpoint,
            self.timeout,
            component_v1::COMMAND,
            CommandRequest {
                command: command.to_string(),
                args,
            },
        )
        .await?;
        Ok(reply.payload)
    }
}
