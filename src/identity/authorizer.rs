use tokio::sync::watch;
use tracing::debug;

use super::principal::Role;
use super::session::{Session, SessionPhase, SessionSnapshot, SessionStore};
use crate::navigation::routes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Session still initializing; render a neutral placeholder.
    Loading,
    Allow,
    RedirectTo(&'static str),
}

/// Gate a protected view on session presence and, optionally, an exact role.
/// A user holding the wrong role is sent to their own role's home.
pub fn authorize(session: &Session, required: Option<Role>) -> Decision {
    let Some(identity) = session.identity() else {
        return Decision::RedirectTo(routes::LOGIN);
    };
    match required {
        Some(role) if identity.role != role => Decision::RedirectTo(identity.role.home_route()),
        _ => Decision::Allow,
    }
}

pub fn evaluate(snapshot: &SessionSnapshot, required: Option<Role>) -> Decision {
    match snapshot.phase {
        SessionPhase::Initializing => Decision::Loading,
        SessionPhase::Ready => authorize(&snapshot.session, required),
    }
}

/// Live guard bound to a session store; re-evaluates on every session change.
pub struct AccessGuard {
    required: Option<Role>,
    rx: watch::Receiver<SessionSnapshot>,
}

impl AccessGuard {
    pub fn new(store: &SessionStore, required: Option<Role>) -> Self {
        Self { required, rx: store.subscribe() }
    }

    pub fn decision(&self) -> Decision { evaluate(&self.rx.borrow(), self.required) }

    /// Wait for the next session change and return the new decision.
    /// `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Decision> {
        self.rx.changed().await.ok()?;
        let decision = evaluate(&self.rx.borrow_and_update(), self.required);
        debug!(target: "guard", required = ?self.required, ?decision, "re-evaluated");
        Some(decision)
    }
}
