// Application layer - the operations a client (CLI, web handler, tests) calls.
// Each one is a load / ledger operation / save round trip against a store.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
