//! # Clinic Admin
//!
//! Administration screens for a clinic backend: doctors, departments, positions, rooms
//! and specializations. Every screen is the same generic sync core from [`crud_sync`]
//! instantiated with a different schema.
//!
//! - **[model]**: Entity schemas implementing [`SyncEntity`](crud_sync::SyncEntity).
//! - **[lifecycle]**: Configuration, tracing setup and the [`ClinicSystem`](lifecycle::ClinicSystem)
//!   orchestrator that runs one list controller per entity.

pub mod lifecycle;
pub mod model;
