//! # Tracing Setup
//!
//! Log output is controlled by `RUST_LOG`:
//!
//! ```bash
//! RUST_LOG=info cargo run -p clinic-admin                 # lifecycle and failures
//! RUST_LOG=crud_sync=debug cargo run -p clinic-admin      # every request and refresh epoch
//! ```
//!
//! Every HTTP call runs inside a span named after the client operation (`list`,
//! `create`, `update`, `remove`). Controller logs carry `endpoint` and `epoch` fields,
//! e.g. `List installed endpoint="doctor" epoch=3 size=12`.

/// Installs the global subscriber. Call once, at the top of `main`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
