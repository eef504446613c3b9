//! Booking transaction model and the payment flow that drives it.

pub mod orchestrator;
pub mod redirect;
pub mod transaction;

pub use orchestrator::{BookingOrchestrator, VerificationOutcome, PAYMENT_FAILED_NOTICE, PAYMENT_SUCCESS_NOTICE, PAYMENT_VERIFIED_MESSAGE};
pub use redirect::PaymentHandle;
pub use transaction::{BookingTransaction, StayDates, TxStatus};
