use std::time::Duration;

use tracing::{debug, info, warn};

use super::credentials::Credential;
use super::principal::Identity;
use super::session::SessionStore;
use crate::api::client::GatewayClient;
use crate::api::operations::{
    AuthPayload, CurrentUser, EmailVariables, ForgotPassword, GoogleLoginVariables, Login, LoginInput,
    LoginVariables, LoginWithGoogle, NoVariables, Register, RegisterVariables, ResendOtp, ResetPassword,
    ResetPasswordVariables, SignUpInput, VerifyEmail, VerifyEmailVariables,
};
use crate::error::{AppError, AppResult, ErrorKind};
use crate::navigation::{routes, Navigation, Navigator};
use crate::notify::NoticeBoard;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Same text whether or not the address is known to the server.
pub const FORGOT_PASSWORD_ACK: &str = "If an account exists for that email, a password reset link has been sent.";
pub const RESEND_VERIFICATION_ACK: &str = "If that email is awaiting verification, a new code has been sent.";

pub const LOGOUT_NOTICE: &str = "Logged out successfully!";
pub const SESSION_EXPIRED_NOTICE: &str = "Please sign in to continue.";
const RESET_SUCCESS_MESSAGE: &str = "Password reset successful! Redirecting to login...";
const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

/// Result of a successful auth mutation: who is signed in now, the server's
/// message (if any) and where the front-end goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub identity: Identity,
    pub message: Option<String>,
    pub next: Option<Navigation>,
}

/// Sole writer of the session store.
///
/// Every operation either completes (store fully updated) or fails with the
/// store exactly as it was. The one exception is an authorization failure on a
/// protected call, which ends the session through [`AuthController::session_expired`].
#[derive(Clone)]
pub struct AuthController {
    gateway: GatewayClient,
    store: SessionStore,
    notices: NoticeBoard,
    navigator: Navigator,
    reset_redirect_delay: Duration,
}

impl AuthController {
    pub fn new(
        gateway: GatewayClient,
        store: SessionStore,
        notices: NoticeBoard,
        navigator: Navigator,
        reset_redirect_delay: Duration,
    ) -> Self {
        Self { gateway, store, notices, navigator, reset_redirect_delay }
    }

    pub fn store(&self) -> &SessionStore { &self.store }

    /// Revalidate the persisted credential, if any. Never fails: anything other
    /// than a confirmed identity leaves the session anonymous. The store leaves
    /// the `Initializing` phase once this returns.
    pub async fn initialize(&self) {
        match self.store.persisted_credential() {
            Ok(Some(credential)) => match self.gateway.execute_as::<CurrentUser>(&NoVariables {}, Some(&credential)).await {
                Ok(Some(identity)) => {
                    let user_id = identity.id.clone();
                    match self.store.set(credential, identity) {
                        Ok(()) => info!(target: "auth", %user_id, "session restored"),
                        Err(e) => {
                            warn!(target: "auth", code = e.code_str(), "could not re-persist restored credential");
                            self.store.clear();
                        }
                    }
                }
                Ok(None) => {
                    debug!(target: "auth", "persisted credential no longer maps to a user");
                    self.store.clear();
                }
                Err(e) => {
                    debug!(target: "auth", kind = ?e.kind(), code = e.code_str(), "persisted credential rejected");
                    self.store.clear();
                }
            },
            Ok(None) => debug!(target: "auth", "no persisted credential"),
            Err(e) => {
                warn!(target: "auth", code = e.code_str(), error = %e.message(), "unreadable persisted credential");
                self.store.clear();
            }
        }
        self.store.mark_ready();
    }

    pub async fn login(&self, req: &LoginRequest) -> AppResult<AuthOutcome> {
        let email = require_email(&req.email)?;
        if req.password.is_empty() {
            return Err(AppError::validation("empty_password", "Password is required"));
        }
        let vars = LoginVariables { input: LoginInput { email, password: req.password.clone() } };
        let payload = self.gateway.execute_as::<Login>(&vars, None).await.map_err(|e| match e.kind() {
            ErrorKind::Business | ErrorKind::Auth => AppError::business("invalid_credentials", INVALID_CREDENTIALS),
            _ => e,
        })?;
        self.signed_in(payload, Some(Navigation::route(routes::DASHBOARD)))
    }

    pub async fn login_with_google(&self, id_token: &str) -> AppResult<AuthOutcome> {
        let id_token = id_token.trim();
        if id_token.is_empty() {
            return Err(AppError::validation("empty_id_token", "Google sign-in did not return a token"));
        }
        let vars = GoogleLoginVariables { id_token: id_token.to_string() };
        let payload = self.gateway.execute_as::<LoginWithGoogle>(&vars, None).await.map_err(|e| match e.kind() {
            ErrorKind::Auth => AppError::business("google_login_failed", "Google login failed"),
            _ => e,
        })?;
        self.signed_in(payload, Some(Navigation::route(routes::DASHBOARD)))
    }

    /// The new account is signed in straight away, pending email verification.
    pub async fn register(&self, req: &RegisterRequest) -> AppResult<AuthOutcome> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AppError::validation("empty_name", "Name is required"));
        }
        let email = require_email(&req.email)?;
        check_password_length(&req.password)?;
        let phone = req.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);
        let vars = RegisterVariables {
            input: SignUpInput { name: name.to_string(), email, password: req.password.clone(), phone },
        };
        let payload = self.gateway.execute_as::<Register>(&vars, None).await?;
        self.signed_in(payload, Some(Navigation::route(routes::VERIFY_EMAIL)))
    }

    /// Uses the credential held right now; the server answers with a fresh one
    /// reflecting the verified status.
    pub async fn verify_email(&self, code: &str) -> AppResult<AuthOutcome> {
        let otp = code.trim();
        if otp.is_empty() {
            return Err(AppError::validation("empty_code", "Enter the verification code"));
        }
        let credential = self
            .store
            .credential()
            .ok_or_else(|| AppError::auth("not_authenticated", SESSION_EXPIRED_NOTICE))?;
        let vars = VerifyEmailVariables { otp: otp.to_string() };
        let result = self.gateway.execute_as::<VerifyEmail>(&vars, Some(&credential)).await;
        let payload = self.intercept_auth(result)?;
        self.signed_in(payload, None)
    }

    /// Best-effort. Returns the generic acknowledgment whatever the server
    /// says; an infrastructure failure only shows up as an error notice.
    pub async fn resend_verification(&self, email: &str) -> AppResult<&'static str> {
        let email = require_email(email)?;
        match self.gateway.execute_as::<ResendOtp>(&EmailVariables { email }, None).await {
            Ok(_) => {}
            Err(e) if answered_by_server(&e) => {
                debug!(target: "auth", code = e.code_str(), "resend rejected; acknowledging anyway");
            }
            Err(e) => {
                warn!(target: "auth", kind = ?e.kind(), code = e.code_str(), "resend verification failed");
                self.notices.error(e.user_facing());
            }
        }
        Ok(RESEND_VERIFICATION_ACK)
    }

    /// Never reveals whether the address exists. Only an infrastructure
    /// failure, which says nothing about the account, is reported.
    pub async fn forgot_password(&self, email: &str) -> AppResult<&'static str> {
        let email = require_email(email)?;
        match self.gateway.execute_as::<ForgotPassword>(&EmailVariables { email }, None).await {
            Ok(_) => Ok(FORGOT_PASSWORD_ACK),
            Err(e) if answered_by_server(&e) => {
                debug!(target: "auth", code = e.code_str(), "forgot-password rejected; acknowledging anyway");
                Ok(FORGOT_PASSWORD_ACK)
            }
            Err(e) => {
                warn!(target: "auth", kind = ?e.kind(), code = e.code_str(), "forgot-password request failed");
                Err(AppError::transport(e.code_str().to_string(), e.message().to_string()))
            }
        }
    }

    /// Checks run in the order the form reports them: mismatch, length, token.
    /// On failure the prior session, if any, is left alone.
    pub async fn reset_password(&self, token: Option<&str>, password: &str, confirm: &str) -> AppResult<AuthOutcome> {
        if password != confirm {
            return Err(AppError::validation("password_mismatch", "Passwords do not match"));
        }
        check_password_length(password)?;
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::validation("missing_reset_token", "Invalid reset token"))?;
        let vars = ResetPasswordVariables { token: token.to_string(), password: password.to_string() };
        let payload = self.gateway.execute_as::<ResetPassword>(&vars, None).await.map_err(|e| match e.kind() {
            // the reset token, not the session, was refused
            ErrorKind::Auth => AppError::business("invalid_reset_token", e.message().to_string()),
            _ => e,
        })?;
        let mut outcome = self.signed_in(payload, None)?;
        outcome.message = Some(RESET_SUCCESS_MESSAGE.to_string());
        let next = Navigation::route(routes::LOGIN);
        self.navigator.schedule(next.clone(), self.reset_redirect_delay);
        outcome.next = Some(next);
        Ok(outcome)
    }

    /// Synchronous and infallible; no network round-trip.
    pub fn logout(&self) {
        let user_id = self.store.get().identity().map(|i| i.id.clone());
        self.store.clear();
        self.gateway.invalidate_cache();
        self.notices.success(LOGOUT_NOTICE);
        info!(target: "auth", user_id = user_id.as_deref().unwrap_or("-"), "logged out");
    }

    /// A protected call was refused: drop the session and send the user to log in.
    pub fn session_expired(&self) {
        let was_authenticated = self.store.get().is_authenticated();
        self.store.clear();
        self.gateway.invalidate_cache();
        self.notices.error(SESSION_EXPIRED_NOTICE);
        self.navigator.go(Navigation::route(routes::LOGIN));
        info!(target: "auth", was_authenticated, "session expired");
    }

    /// Pass a protected call's result through, ending the session first when
    /// it failed for lack of a valid credential.
    pub fn intercept_auth<T>(&self, result: AppResult<T>) -> AppResult<T> {
        if let Err(e) = &result {
            if e.is_auth() {
                self.session_expired();
            }
        }
        result
    }

    fn signed_in(&self, payload: AuthPayload, next: Option<Navigation>) -> AppResult<AuthOutcome> {
        let identity = self.establish(payload.token, payload.user)?;
        if let Some(nav) = &next {
            self.navigator.go(nav.clone());
        }
        Ok(AuthOutcome { identity, message: payload.message, next })
    }

    fn establish(&self, token: String, identity: Identity) -> AppResult<Identity> {
        let credential = Credential::new(token)
            .map_err(|_| AppError::malformed("missing_token", "auth response did not carry a credential"))?;
        self.store.set(credential, identity.clone())?;
        self.gateway.invalidate_cache();
        info!(target: "auth", user_id = %identity.id, role = %identity.role, verified = identity.email_verified, "signed in");
        Ok(identity)
    }
}

/// The server saw the request and decided; its answer must not leak account existence.
fn answered_by_server(e: &AppError) -> bool { matches!(e.kind(), ErrorKind::Business | ErrorKind::Auth) }

fn require_email(email: &str) -> AppResult<String> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("empty_email", "Email is required"));
    }
    Ok(email.to_string())
}

fn check_password_length(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "password_too_short",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        ));
    }
    Ok(())
}
