//! Session, credential persistence, auth flows and access decisions.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod credentials;
mod session;
mod provider;
mod authorizer;

pub use principal::{Identity, Role};
pub use credentials::{Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use session::{Session, SessionPhase, SessionSnapshot, SessionStore};
pub use provider::{
    AuthController, AuthOutcome, LoginRequest, RegisterRequest, FORGOT_PASSWORD_ACK, LOGOUT_NOTICE,
    MIN_PASSWORD_LEN, RESEND_VERIFICATION_ACK, SESSION_EXPIRED_NOTICE,
};
pub use authorizer::{authorize, evaluate, AccessGuard, Decision};
