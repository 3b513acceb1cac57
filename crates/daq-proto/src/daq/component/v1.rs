use std::collections::BTreeMap;

pub const COMMAND: &str = "/daq.component.v1.Component/Command";

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandRequest {
    #[prost(string, tag = "1")]
    pub command: String,
    #[prost(string, repeated, tag = "2")]
    pub args: Vec<String>,
}

/// `payload` holds an encoded [`CommandResult`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandReply {
    #[prost(bytes = "vec", tag = "1")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModuleResult {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, tag = "2")]
    pub response: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommandResult {
    #[prost(string, tag = "1")]
    pub status: String,
    #[prost(string, tag = "2")]
    pub response: String,
    #[prost(btree_map = "string, message", tag = "3")]
    pub modules: BTreeMap<String, ModuleResult>,
}
