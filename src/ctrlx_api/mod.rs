/// ctrlX CORE REST API integration module
///
/// This module talks to the data layer of a ctrlX CORE device over its REST
/// interface, handling the bearer-token lease along the way.
///
/// ## Request Flow
///
/// 1. Caller invokes a node operation on `CtrlxClient`
/// 2. Client checks the cached token; when absent or expired it posts the
///    configured credentials to the identity manager and caches the new token
/// 3. Client sends the node request with `Authorization: Bearer <token>`
/// 4. Decoded JSON (or a `CtrlxError` naming the failing operation) is returned
pub mod client;
pub mod config;
pub mod nodes;
pub mod token;
pub mod types;

pub use client::CtrlxClient;
pub use config::ClientConfig;
pub use nodes::{MotionChannel, MotionData, NodePath};
pub use token::TokenState;
pub use types::{ApiError, CtrlxError, Operation};
