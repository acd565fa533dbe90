//! Top-level facade crate for routable.
//!
//! Re-exports the protocol primitives and the RPC library so users can depend
//! on a single crate.

pub mod core {
    pub use routable_core::*;
}

pub mod rpc {
    pub use routable_rpc::*;
}
