//! # System Lifecycle
//!
//! Everything between `main` and the sync core:
//!
//! - [`ClinicConfig`] resolves settings from defaults, files and the environment
//! - [`ClinicSystem`] builds the shared credential store, transport and error reporter,
//!   then spawns one list controller per clinic entity
//! - [`setup_tracing`] installs the log subscriber
//!
//! ## Shutdown
//!
//! [`ClinicSystem::shutdown`] closes every list handle, which stops each controller
//! even when the application still holds handle clones, and then awaits the
//! controller tasks. Responses that arrive afterwards are dropped.

pub mod clinic_system;
pub mod config;
pub mod tracing;

pub use clinic_system::{ClinicSystem, SystemError};
pub use config::{ClinicConfig, ConfigError};
pub use self::tracing::setup_tracing;
