use std::sync::Arc;

use crate::api::{Catalog, GatewayClient};
use crate::booking::BookingOrchestrator;
use crate::config::ClientConfig;
use crate::error::AppResult;
use crate::identity::{AccessGuard, AuthController, CredentialStore, FileCredentialStore, Role, SessionStore};
use crate::navigation::Navigator;
use crate::notify::NoticeBoard;

/// Every component wired to one session store, one gateway and one notice
/// board. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub session: SessionStore,
    pub gateway: GatewayClient,
    pub notices: NoticeBoard,
    pub auth: AuthController,
    pub bookings: BookingOrchestrator,
    pub catalog: Catalog,
}

impl AppState {
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialStore>, navigator: Navigator) -> AppResult<Self> {
        let session = SessionStore::new(credentials);
        let gateway = GatewayClient::new(&config, session.clone())?;
        let notices = NoticeBoard::new(config.notice_ttl, config.notice_capacity);
        let auth = AuthController::new(
            gateway.clone(),
            session.clone(),
            notices.clone(),
            navigator.clone(),
            config.reset_redirect_delay,
        );
        let bookings =
            BookingOrchestrator::new(gateway.clone(), auth.clone(), notices.clone(), navigator, config.dashboard_delay);
        let catalog = Catalog::new(gateway.clone(), auth.clone());
        Ok(Self { config, session, gateway, notices, auth, bookings, catalog })
    }

    /// Credential persisted under `config.state_dir`.
    pub fn with_file_credentials(config: ClientConfig, navigator: Navigator) -> AppResult<Self> {
        let store = Arc::new(FileCredentialStore::new(config.state_dir.clone()));
        Self::new(config, store, navigator)
    }

    pub fn guard(&self, required: Option<Role>) -> AccessGuard { AccessGuard::new(&self.session, required) }
}
