//! Navigation requests emitted by the controllers.
//!
//! Controllers never render anything; they tell the front-end where to go next.
//! `Route` is an in-app change, `External` is a full navigation that leaves the
//! application (the payment gateway).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

pub mod routes {
    pub const LOGIN: &str = "/login";
    pub const DASHBOARD: &str = "/dashboard";
    pub const MANAGER_HOME: &str = "/dashboard/listings";
    pub const VERIFY_EMAIL: &str = "/verify-email";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Route(String),
    External(String),
}

impl Navigation {
    pub fn route(path: &str) -> Self { Navigation::Route(path.to_string()) }

    pub fn target(&self) -> &str {
        match self {
            Navigation::Route(p) | Navigation::External(p) => p.as_str(),
        }
    }

    pub fn is_external(&self) -> bool { matches!(self, Navigation::External(_)) }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    tx: Option<mpsc::UnboundedSender<Navigation>>,
}

impl Navigator {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Navigation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A navigator nobody listens to.
    pub fn detached() -> Self { Self { tx: None } }

    pub fn go(&self, nav: Navigation) {
        debug!(target: "navigation", target_path = nav.target(), external = nav.is_external(), "navigate");
        if let Some(tx) = &self.tx {
            // receiver gone means the front-end is shutting down
            let _ = tx.send(nav);
        }
    }

    /// Navigate once after `delay`. Must be called from within a tokio runtime.
    pub fn schedule(&self, nav: Navigation, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.go(nav);
        });
    }
}
