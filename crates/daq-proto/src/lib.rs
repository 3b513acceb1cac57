// Message types of the two RPC services the control plane consumes.
//
// Both services are external; only the client side lives here, so the types
// are declared with prost derives instead of generated from `.proto` files.

pub mod daq {
    pub mod supervisor {
        pub mod v1;
    }
    pub mod component {
        pub mod v1;
    }
}

pub use daq::component::v1 as component_v1;
pub use daq::supervisor::v1 as supervisor_v1;
