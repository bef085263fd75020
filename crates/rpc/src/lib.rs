//! HTTP surface of the Shepherd gateway.
//!
//! Routes are GET only. Input problems answer 400, every other failure 500,
//! both without a body.

pub mod errors;
pub mod gateway;
pub mod server;

pub use errors::GatewayError;
pub use gateway::{Gateway, PathRoute, Served};
pub use server::{build_router, start_server, AppState, DEFAULT_BANNER};
