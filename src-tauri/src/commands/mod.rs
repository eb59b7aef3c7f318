//! Commands Layer
//!
//! Tauri command handlers that bridge frontend to backend services.

mod group_cmd;
mod log_cmd;
mod pom_cmd;
mod verify_cmd;

pub use group_cmd::*;
pub use log_cmd::*;
pub use pom_cmd::*;
pub use verify_cmd::*;
