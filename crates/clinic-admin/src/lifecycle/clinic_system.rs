use crate::lifecycle::config::ClinicConfig;
use crate::model::{Department, Doctor, Position, Room, Specialization};
use crud_sync::transport::TransportError;
use crud_sync::{
    AuthClient, CredentialStore, ErrorReporter, FileStore, FormSession, HttpTransport,
    ListController, ListHandle, ReqwestTransport, ResourceClient, SessionStatus, SyncEntity,
    SyncError,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    #[error("failed to build HTTP transport: {0}")]
    Transport(#[from] TransportError),

    #[error("controller task failed: {0}")]
    Controller(#[from] JoinError),
}

/// The running administration backend.
///
/// `ClinicSystem` owns:
/// - **One list controller per entity**, each in its own Tokio task
/// - **The shared credential store**, read by every request and cleared on auth failure
/// - **The shared error reporter**, handed to every controller and form
///
/// # Example
///
/// ```ignore
/// let system = ClinicSystem::new(&ClinicConfig::load()?)?;
/// system.auth.login(&LoginDraft { login, password }).await?;
///
/// system.doctors.refresh().await?;
/// let mut form = system.form::<Doctor>();
/// form.open_create()?;
///
/// system.shutdown().await?;
/// ```
pub struct ClinicSystem {
    pub doctors: ListHandle<Doctor>,
    pub departments: ListHandle<Department>,
    pub positions: ListHandle<Position>,
    pub rooms: ListHandle<Room>,
    pub specializations: ListHandle<Specialization>,
    pub auth: AuthClient,
    pub credentials: CredentialStore,
    pub reporter: ErrorReporter,

    /// Controller tasks, awaited on shutdown.
    handles: Vec<JoinHandle<()>>,
}

impl ClinicSystem {
    /// Starts the system against the configured backend, with a `reqwest` transport.
    ///
    /// The token is persisted to `config.credential_file` when one is set, so a restart
    /// keeps the session.
    pub fn new(config: &ClinicConfig) -> Result<Self, SystemError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        let credentials = match &config.credential_file {
            Some(path) => CredentialStore::new(FileStore::new(path)),
            None => CredentialStore::in_memory(),
        };
        Ok(Self::with_transport(config, Arc::new(transport), credentials))
    }

    /// Starts the system over any transport. Tests pass a mock here.
    pub fn with_transport(
        config: &ClinicConfig,
        transport: Arc<dyn HttpTransport>,
        credentials: CredentialStore,
    ) -> Self {
        let reporter = ErrorReporter::new(credentials.clone());
        let mut spawner = Spawner {
            config,
            transport: &transport,
            credentials: &credentials,
            reporter: &reporter,
            handles: Vec::new(),
        };

        let doctors = spawner.spawn::<Doctor>();
        let departments = spawner.spawn::<Department>();
        let positions = spawner.spawn::<Position>();
        let rooms = spawner.spawn::<Room>();
        let specializations = spawner.spawn::<Specialization>();
        let handles = spawner.handles;

        let auth = AuthClient::new(&config.api_url, transport.clone(), credentials.clone());

        info!(
            api_url = %config.api_url,
            controllers = handles.len(),
            session = ?credentials.status(),
            "Clinic system started"
        );

        Self {
            doctors,
            departments,
            positions,
            rooms,
            specializations,
            auth,
            credentials,
            reporter,
            handles,
        }
    }

    /// A fresh, closed form for entity `T`, reporting through the shared reporter.
    pub fn form<T: SyncEntity>(&self) -> FormSession<T> {
        FormSession::new(self.reporter.clone())
    }

    /// Session transitions. `SignedOut` means the shell should show the login screen.
    pub fn session(&self) -> watch::Receiver<SessionStatus> {
        self.credentials.subscribe()
    }

    /// Refreshes every list concurrently. Results are keyed by endpoint.
    pub async fn refresh_all(&self) -> Vec<(&'static str, Result<(), SyncError>)> {
        let (doctors, departments, positions, rooms, specializations) = tokio::join!(
            self.doctors.refresh(),
            self.departments.refresh(),
            self.positions.refresh(),
            self.rooms.refresh(),
            self.specializations.refresh(),
        );
        vec![
            (Doctor::ENDPOINT, doctors),
            (Department::ENDPOINT, departments),
            (Position::ENDPOINT, positions),
            (Room::ENDPOINT, rooms),
            (Specialization::ENDPOINT, specializations),
        ]
    }

    /// Stops every controller and waits for its task to finish.
    ///
    /// In-flight requests are abandoned and their callers receive
    /// [`SyncError::ControllerClosed`].
    pub async fn shutdown(self) -> Result<(), SystemError> {
        info!("Shutting down clinic system...");

        self.doctors.close();
        self.departments.close();
        self.positions.close();
        self.rooms.close();
        self.specializations.close();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Controller task failed");
                return Err(e.into());
            }
        }

        info!("Clinic system shutdown complete.");
        Ok(())
    }
}

struct Spawner<'a> {
    config: &'a ClinicConfig,
    transport: &'a Arc<dyn HttpTransport>,
    credentials: &'a CredentialStore,
    reporter: &'a ErrorReporter,
    handles: Vec<JoinHandle<()>>,
}

impl Spawner<'_> {
    fn spawn<T: SyncEntity>(&mut self) -> ListHandle<T> {
        let client = ResourceClient::<T>::new(
            &self.config.api_url,
            self.transport.clone(),
            self.credentials.clone(),
        );
        let (controller, handle) = ListController::new(client, self.config.mailbox_size);
        self.handles
            .push(tokio::spawn(controller.run(self.reporter.clone())));
        handle
    }
}
