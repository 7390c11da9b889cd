pub mod rpc;

// Re-export handler functions
pub use rpc::*;
