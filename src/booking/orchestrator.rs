//! Booking-to-payment flow: create, initialize, leave for the gateway, come
//! back, verify.
//!
//! No step is retried automatically. Each failure leaves the transaction either
//! terminal or restartable and reports why. A second call for a step that is
//! still running is refused locally.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::redirect::PaymentHandle;
use super::transaction::{BookingTransaction, StayDates, TxStatus};
use crate::api::client::GatewayClient;
use crate::api::operations::{
    CreateBooking, CreateBookingVariables, InitializePayment, InitializePaymentVariables, VerifiedBooking,
    VerifyPayment, VerifyPaymentVariables,
};
use crate::error::{AppError, AppResult, ErrorKind};
use crate::identity::{AuthController, SESSION_EXPIRED_NOTICE};
use crate::navigation::{routes, Navigation, Navigator};
use crate::notify::NoticeBoard;

pub const PAYMENT_SUCCESS_NOTICE: &str = "Payment successful! Your booking is confirmed.";
pub const PAYMENT_VERIFIED_MESSAGE: &str = "Payment verified successfully! Your booking has been confirmed.";
pub const PAYMENT_FAILED_NOTICE: &str = "Payment verification failed";
const PAYMENT_INIT_FAILED: &str = "Payment initialization failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Step {
    CreateBooking,
    InitializePayment,
    VerifyPayment,
}

impl Step {
    fn as_str(self) -> &'static str {
        match self {
            Step::CreateBooking => "create_booking",
            Step::InitializePayment => "initialize_payment",
            Step::VerifyPayment => "verify_payment",
        }
    }
}

type StepKey = (Step, String);

/// Held for the duration of one step; releases the slot on drop, including on
/// early return.
struct InFlight {
    slots: Arc<Mutex<HashSet<StepKey>>>,
    key: StepKey,
}

impl InFlight {
    fn acquire(slots: &Arc<Mutex<HashSet<StepKey>>>, step: Step, key: &str) -> AppResult<Self> {
        let key = (step, key.to_string());
        if !slots.lock().insert(key.clone()) {
            debug!(target: "booking", step = step.as_str(), key = %key.1, "duplicate submission refused");
            return Err(AppError::validation("step_in_flight", "This step is already in progress"));
        }
        Ok(Self { slots: Arc::clone(slots), key })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) { self.slots.lock().remove(&self.key); }
}

/// What the verification view shows. Only the server's booking state is
/// displayed, never a client-side assumption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub reference: String,
    /// `Confirmed` or `VerificationFailed`.
    pub status: TxStatus,
    pub booking: Option<VerifiedBooking>,
    /// Confirmation text, or the failure reason.
    pub message: String,
    /// Delay before the scheduled dashboard navigation, when one was scheduled.
    pub redirect_after: Option<Duration>,
}

impl VerificationOutcome {
    pub fn is_confirmed(&self) -> bool { self.status == TxStatus::Confirmed }
}

/// Remembered verdicts belong to one signed-in user. Another user (or a
/// sign-out) empties the map, so it holds at most one user's payments.
#[derive(Default)]
struct Verdicts {
    owner: Option<String>,
    by_reference: HashMap<String, VerificationOutcome>,
}

impl Verdicts {
    fn claim(&mut self, user_id: &str) {
        if self.owner.as_deref() != Some(user_id) {
            self.by_reference.clear();
            self.owner = Some(user_id.to_string());
        }
    }

    fn get(&mut self, user_id: &str, reference: &str) -> Option<VerificationOutcome> {
        self.claim(user_id);
        self.by_reference.get(reference).cloned()
    }

    fn insert(&mut self, user_id: &str, outcome: VerificationOutcome) {
        self.claim(user_id);
        self.by_reference.insert(outcome.reference.clone(), outcome);
    }

    fn clear(&mut self) {
        self.owner = None;
        self.by_reference.clear();
    }
}

#[derive(Clone)]
pub struct BookingOrchestrator {
    gateway: GatewayClient,
    auth: AuthController,
    notices: NoticeBoard,
    navigator: Navigator,
    dashboard_delay: Duration,
    in_flight: Arc<Mutex<HashSet<StepKey>>>,
    /// Server-answered verification outcomes for the signed-in user.
    verdicts: Arc<Mutex<Verdicts>>,
}

impl BookingOrchestrator {
    pub fn new(
        gateway: GatewayClient,
        auth: AuthController,
        notices: NoticeBoard,
        navigator: Navigator,
        dashboard_delay: Duration,
    ) -> Self {
        Self {
            gateway,
            auth,
            notices,
            navigator,
            dashboard_delay,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            verdicts: Arc::new(Mutex::new(Verdicts::default())),
        }
    }

    pub async fn create_booking(
        &self,
        property_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> AppResult<BookingTransaction> {
        let property_id = property_id.trim();
        if property_id.is_empty() {
            return Err(AppError::validation("empty_property_id", "Property id is required"));
        }
        let stay = StayDates::new(check_in, check_out)?;
        let _slot = InFlight::acquire(&self.in_flight, Step::CreateBooking, &format!("{property_id}:{check_in}:{check_out}"))?;

        let vars = CreateBookingVariables { property_id: property_id.to_string(), check_in, check_out };
        let result = self.gateway.execute::<CreateBooking>(&vars).await;
        let record = self.auth.intercept_auth(result).inspect_err(|e| self.report(e))?;
        info!(target: "booking", booking_id = %record.id, property_id, nights = stay.nights(), total = %record.total_price, "booking created");
        Ok(BookingTransaction::created(record.id, property_id, stay, record.total_price))
    }

    /// On success the caller must leave the application for the returned
    /// external URL; the same navigation is also sent through the navigator.
    pub async fn initialize_payment(&self, tx: &mut BookingTransaction) -> AppResult<Navigation> {
        let _slot = InFlight::acquire(&self.in_flight, Step::InitializePayment, tx.booking_id())?;
        tx.begin_payment()?;
        let vars = InitializePaymentVariables { booking_id: tx.booking_id().to_string() };
        let result = self.gateway.execute::<InitializePayment>(&vars).await;

        let init = match result {
            Ok(init) => init,
            Err(e) if e.is_auth() => {
                tx.revert_to_created();
                warn!(target: "booking", booking_id = tx.booking_id(), "payment initialization refused: session expired");
                self.auth.session_expired();
                return Err(e);
            }
            Err(e) => {
                tx.fail_payment(e.user_facing());
                warn!(target: "booking", booking_id = tx.booking_id(), kind = ?e.kind(), code = e.code_str(), "payment initialization failed");
                self.report(&e);
                return Err(e);
            }
        };

        if !init.success {
            let reason = init.error.unwrap_or_else(|| PAYMENT_INIT_FAILED.to_string());
            tx.fail_payment(reason.clone());
            warn!(target: "booking", booking_id = tx.booking_id(), %reason, "payment initialization declined");
            let err = AppError::business("payment_init_failed", reason);
            self.report(&err);
            return Err(err);
        }
        let (Some(url), Some(reference)) = (non_blank(init.authorization_url), non_blank(init.reference)) else {
            let err = AppError::malformed("incomplete_payment_init", "payment initialization returned no checkout address");
            tx.fail_payment(err.user_facing());
            self.report(&err);
            return Err(err);
        };

        tx.await_gateway(url.clone(), reference.clone())?;
        info!(target: "booking", booking_id = tx.booking_id(), %reference, "awaiting payment gateway");
        let nav = Navigation::External(url);
        self.navigator.go(nav.clone());
        Ok(nav)
    }

    /// Entry point when the gateway sends the user back. Works with no
    /// in-memory transaction at all.
    pub async fn resume_from_redirect(&self, return_url: &str) -> AppResult<VerificationOutcome> {
        let handle = PaymentHandle::from_redirect_url(return_url).inspect_err(|e| {
            debug!(target: "booking", code = e.code_str(), "return address carried no payment reference");
            self.notices.error(e.user_facing());
        })?;
        self.verify_payment(&handle).await
    }

    /// Idempotent per reference: once the server has given a verdict, later
    /// calls return it without another round-trip. Transport failures are not
    /// remembered, so a refresh verifies again. A remembered verdict is only
    /// served to the user it was given to.
    pub async fn verify_payment(&self, handle: &PaymentHandle) -> AppResult<VerificationOutcome> {
        let reference = handle.reference();
        let Some(user_id) = self.auth.store().get().identity().map(|i| i.id.clone()) else {
            self.verdicts.lock().clear();
            debug!(target: "booking", reference, "verification refused: not signed in");
            self.auth.session_expired();
            return Err(AppError::auth("not_authenticated", SESSION_EXPIRED_NOTICE));
        };
        let remembered = self.verdicts.lock().get(&user_id, reference);
        if let Some(outcome) = remembered {
            debug!(target: "booking", reference, status = %outcome.status, "verification already settled");
            return Ok(outcome);
        }
        let _slot = InFlight::acquire(&self.in_flight, Step::VerifyPayment, reference)?;

        let vars = VerifyPaymentVariables { reference: reference.to_string() };
        let result = self.gateway.execute::<VerifyPayment>(&vars).await;
        let (outcome, settled) = match result {
            Ok(v) if v.success => {
                self.notices.success(PAYMENT_SUCCESS_NOTICE);
                self.navigator.schedule(Navigation::route(routes::DASHBOARD), self.dashboard_delay);
                let outcome = VerificationOutcome {
                    reference: reference.to_string(),
                    status: TxStatus::Confirmed,
                    booking: v.booking,
                    message: PAYMENT_VERIFIED_MESSAGE.to_string(),
                    redirect_after: Some(self.dashboard_delay),
                };
                (outcome, true)
            }
            Ok(v) => {
                let reason = non_blank(v.error).or(non_blank(v.message)).unwrap_or_else(|| PAYMENT_FAILED_NOTICE.to_string());
                (self.verification_failed(reference, v.booking, reason), true)
            }
            Err(e) if e.is_auth() => {
                warn!(target: "booking", reference, "payment verification refused: session expired");
                self.auth.session_expired();
                return Err(e);
            }
            Err(e) => {
                let settled = e.kind() == ErrorKind::Business;
                warn!(target: "booking", reference, kind = ?e.kind(), code = e.code_str(), "payment verification failed");
                (self.verification_failed(reference, None, e.user_facing()), settled)
            }
        };

        info!(target: "booking", reference, status = %outcome.status, settled, "payment verified");
        if settled {
            self.verdicts.lock().insert(&user_id, outcome.clone());
        }
        Ok(outcome)
    }

    /// Verify using the reference held by an in-memory transaction and record
    /// the verdict on it.
    pub async fn verify_transaction(&self, tx: &mut BookingTransaction) -> AppResult<VerificationOutcome> {
        let handle = match tx.payment_reference() {
            Some(reference) => PaymentHandle::new(reference)?,
            None => return Err(AppError::validation("missing_reference", "No payment reference found")),
        };
        let outcome = self.verify_payment(&handle).await?;
        if tx.status() != TxStatus::Confirmed {
            let confirmed = outcome.is_confirmed();
            let reason = (!confirmed).then(|| outcome.message.clone());
            tx.apply_verification(confirmed, reason, outcome.booking.as_ref().map(|b| b.total_price))?;
        }
        Ok(outcome)
    }

    fn verification_failed(&self, reference: &str, booking: Option<VerifiedBooking>, reason: String) -> VerificationOutcome {
        self.notices.error(PAYMENT_FAILED_NOTICE);
        VerificationOutcome {
            reference: reference.to_string(),
            status: TxStatus::VerificationFailed,
            booking,
            message: reason,
            redirect_after: None,
        }
    }

    /// Auth failures were already announced by `session_expired`; validation
    /// errors are shown inline by the caller.
    fn report(&self, e: &AppError) {
        if matches!(e.kind(), ErrorKind::Auth | ErrorKind::Validation) {
            return;
        }
        self.notices.error(e.user_facing());
    }
}

fn non_blank(s: Option<String>) -> Option<String> { s.filter(|v| !v.trim().is_empty()) }
