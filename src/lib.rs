//! # Acosible - A10 ACOS Device Automation
//!
//! Acosible is a library of automation modules for A10 ACOS network devices:
//! declarative configuration pushes with diffing, command dispatch with wait
//! conditions, and device fact collection, all over a pluggable CLI transport.
//!
//! ## Core Concepts
//!
//! - **Modules**: Units of work executed against one device (`acos_config`,
//!   `acos_command`, `acos_facts`)
//! - **Connection**: Transport seam; callers supply anything implementing
//!   [`connection::Connection`]
//! - **NetworkConfig**: Indent-structured model of ACOS configuration text
//!   with match-policy diffing
//! - **Conditionals**: `result[0] contains ...` expressions gating the
//!   command dispatcher's retry loop
//! - **Facts**: Device state scraped from show-command output
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Module Registry                      │
//! │        (acos_config / acos_command / acos_facts)        │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!              ┌─────────────┼─────────────┐
//!              ▼             ▼             ▼
//!      ┌──────────────┐ ┌─────────┐ ┌────────────┐
//!      │ NetworkConfig│ │ Condi-  │ │   Facts    │
//!      │  + differ    │ │ tionals │ │ collectors │
//!      └──────────────┘ └─────────┘ └────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │              AcosDevice (session operations)            │
//! │     get_config / run_commands / edit_config / facts     │
//! └─────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │            Connection trait (CLI transport)             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use acosible::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), ModuleError> {
//!     let connection: Arc<dyn Connection> = open_cli_session()?;
//!     let context = ModuleContext::new().with_connection(connection);
//!
//!     let mut params = ModuleParams::new();
//!     params.insert(
//!         "lines".to_string(),
//!         serde_json::json!(["ip dns primary 10.18.18.81"]),
//!     );
//!
//!     let registry = ModuleRegistry::with_builtins();
//!     let result = registry.execute("acos_config", &params, &context)?;
//!     println!("changed: {}", result.changed);
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod cache;
pub mod condition;
pub mod connection;
pub mod device;
pub mod facts;
pub mod modules;
pub mod netcfg;

/// Convenience re-exports for the common usage path.
pub mod prelude {
    pub use crate::backup::{BackupArtifact, BackupOptions};
    pub use crate::cache::DeviceConfigCache;
    pub use crate::condition::Conditional;
    pub use crate::connection::{
        Capabilities, CommandRequest, Connection, ConnectionError, ConnectionResult,
    };
    pub use crate::device::{AcosDevice, ConfigSource, EditResponse};
    pub use crate::facts::FactSubset;
    pub use crate::modules::{
        Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
        ModuleResult, ModuleStatus, ParamExt,
    };
    pub use crate::netcfg::{ConfigLine, DumpStyle, MatchPolicy, NetworkConfig};
}
