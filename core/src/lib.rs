//! deskpilot-core
//!
//! Engine for the local editor-driving agent: the command model, the
//! window/input/reconciliation machinery, the dispatching controller
//! and the server wire protocol. The binary crate owns the transport
//! and CLI; everything that decides and acts lives here.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod input;
pub mod keymap;
pub mod protocol;
pub mod reconcile;
pub mod wait;
pub mod window;

pub use command::{Command, CommandKind};
pub use config::AgentConfig;
pub use controller::{AgentState, AgentStatus, EditorController, ExecutionResult};
pub use error::{AgentError, Result};
pub use input::{Actuator, InputBackend, SystemInputBackend};
pub use keymap::Keymap;
pub use protocol::{Inbound, Outbound};
pub use reconcile::Reconciler;
pub use window::{SystemWindowBackend, WindowBackend, WindowResolver};
