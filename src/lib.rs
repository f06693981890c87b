//! ctrlX SDK
//!
//! A Rust library for reading and writing the data layer of a Bosch Rexroth
//! ctrlX CORE device through its REST API.
//!
//! This SDK provides:
//! - An async API client that renews its bearer token before it expires
//! - Node reads and writes addressed by slash-separated data-layer paths
//! - Helpers for the EtherCAT drive list and the motion-data channels
//! - Configuration from code, TOML files or `CTRLX_*` environment variables
//! - Error types that name the failing operation and classify the cause
//!
//! # Example
//!
//! ```no_run
//! use ctrlx_sdk::{ClientConfig, CtrlxClient};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Connect to a device with a self-signed certificate (verification off)
//! let config = ClientConfig::new("https://192.168.1.1")
//!     .with_credentials("boschrexroth", "boschrexroth");
//! let client = CtrlxClient::new(config)?;
//!
//! // Read a node; the client logs in on first use
//! let cpu = client
//!     .read_node("framework/metrics/system/cpu-utilisation-percent", None)
//!     .await?;
//! println!("CPU: {}", cpu["value"]);
//!
//! // Write a node
//! client
//!     .write_node("plc/app/Application/sym/PLC_PRG/speed", Some(&json!({"type": "double", "value": 1.5})))
//!     .await?;
//!
//! // Read all motion-data channels at once
//! let motion = client.get_motion_data(None).await?;
//! println!("{:?}", motion);
//! # Ok(())
//! # }
//! ```

pub mod ctrlx_api;

// Re-export commonly used types
pub use ctrlx_api::{
    client::{CtrlxClient, AUTH_TOKEN_ROUTE},
    config::ClientConfig,
    nodes::{MotionChannel, MotionData, NodePath, NODES_ROUTE},
    token::TokenState,
    types::{ApiError, CtrlxError, LoginRequest, NodeValue, Operation},
};
