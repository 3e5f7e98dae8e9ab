//! # Clinic Admin
//!
//! Headless run of the administration backend:
//!
//! 1. Loads [`ClinicConfig`] and starts the [`ClinicSystem`].
//! 2. Signs in with `CLINIC_LOGIN` / `CLINIC_PASSWORD` unless a stored token exists.
//! 3. Loads every list and logs what it found.
//!
//! ```bash
//! CLINIC_LOGIN=admin CLINIC_PASSWORD=secret RUST_LOG=info cargo run -p clinic-admin
//! ```

use clinic_admin::lifecycle::{setup_tracing, ClinicConfig, ClinicSystem};
use crud_sync::LoginDraft;
use std::env;
use tracing::{error, info, warn, Instrument};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_tracing();

    let config = ClinicConfig::load()?;
    info!(api_url = %config.api_url, "Starting clinic admin");

    let system = ClinicSystem::new(&config)?;

    if system.credentials.get().is_none() {
        match (env::var("CLINIC_LOGIN"), env::var("CLINIC_PASSWORD")) {
            (Ok(login), Ok(password)) => {
                let span = tracing::info_span!("login");
                let draft = LoginDraft { login, password };
                system.auth.login(&draft).instrument(span).await?;
                info!("Signed in");
            }
            _ => warn!("No stored session; set CLINIC_LOGIN and CLINIC_PASSWORD to sign in"),
        }
    }

    for (endpoint, result) in system.refresh_all().await {
        if let Err(e) = result {
            let report = system.reporter.report(&e);
            error!(endpoint, error = %e, terminal = report.terminal, "Load failed");
        }
    }

    info!(
        doctors = system.doctors.items().len(),
        departments = system.departments.items().len(),
        positions = system.positions.items().len(),
        rooms = system.rooms.items().len(),
        specializations = system.specializations.items().len(),
        "Lists loaded"
    );

    system.shutdown().await?;

    info!("Clinic admin finished");
    Ok(())
}
