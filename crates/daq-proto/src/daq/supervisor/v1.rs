use std::collections::BTreeMap;

pub const ADD_PROGRAM_TO_GROUP: &str = "/daq.supervisor.v1.Supervisor/AddProgramToGroup";
pub const REMOVE_PROCESS_FROM_GROUP: &str = "/daq.supervisor.v1.Supervisor/RemoveProcessFromGroup";
pub const START_PROCESS: &str = "/daq.supervisor.v1.Supervisor/StartProcess";
pub const STOP_PROCESS: &str = "/daq.supervisor.v1.Supervisor/StopProcess";
pub const GET_PROCESS_INFO: &str = "/daq.supervisor.v1.Supervisor/GetProcessInfo";
pub const GET_ALL_PROCESS_INFO: &str = "/daq.supervisor.v1.Supervisor/GetAllProcessInfo";
pub const READ_PROCESS_STDOUT_LOG: &str = "/daq.supervisor.v1.Supervisor/ReadProcessStdoutLog";
pub const READ_PROCESS_STDERR_LOG: &str = "/daq.supervisor.v1.Supervisor/ReadProcessStderrLog";
pub const CLEAR_PROCESS_LOGS: &str = "/daq.supervisor.v1.Supervisor/ClearProcessLogs";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ack {
    #[prost(bool, tag = "1")]
    pub ok: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AddProgramToGroupRequest {
    #[prost(string, tag = "1")]
    pub group: String,
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(btree_map = "string, string", tag = "3")]
    pub settings: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RemoveProcessFromGroupRequest {
    #[prost(string, tag = "1")]
    pub group: String,
    #[prost(string, tag = "2")]
    pub name: String,
}

/// Start/stop request; `name` is the qualified `"<group>:<name>"` identifier.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessControlRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(bool, tag = "2")]
    pub wait: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetProcessInfoRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAllProcessInfoRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProcessInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub group: String,
    #[prost(int32, tag = "3")]
    pub state: i32,
    #[prost(string, tag = "4")]
    pub statename: String,
    #[prost(uint32, tag = "5")]
    pub pid: u32,
    /// Unix timestamp of the last start, 0 if never started.
    #[prost(int64, tag = "6")]
    pub start: i64,
    #[prost(string, tag = "7")]
    pub description: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetAllProcessInfoResponse {
    #[prost(message, repeated, tag = "1")]
    pub processes: Vec<ProcessInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadProcessLogRequest {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(int64, tag = "3")]
    pub length: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadProcessLogResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClearProcessLogsRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}
