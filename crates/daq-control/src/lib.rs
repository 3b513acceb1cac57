pub mod component;
pub mod config;
pub mod controller;
pub mod environment;
pub mod error;
pub mod registrar;
pub mod supervisor;
pub mod template;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use component::{ComponentCommandClient, DecodedResponse};
pub use config::ControlConfig;
pub use controller::DeploymentController;
pub use environment::EnvironmentResolver;
pub use error::RpcError;
pub use registrar::{ProcessRegistrar, Registration};
pub use supervisor::RemoteProcessSupervisor;
