//! In-memory booking transaction and its legal state transitions.

use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::api::Money;
use crate::error::{AppError, AppResult};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Created,
    PaymentInitializing,
    PaymentPending,
    PaymentFailed,
    Confirmed,
    VerificationFailed,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::PaymentFailed | TxStatus::Confirmed | TxStatus::VerificationFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxStatus::Created => "created",
            TxStatus::PaymentInitializing => "payment_initializing",
            TxStatus::PaymentPending => "payment_pending",
            TxStatus::PaymentFailed => "payment_failed",
            TxStatus::Confirmed => "confirmed",
            TxStatus::VerificationFailed => "verification_failed",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Check-in / check-out pair with check-out strictly after check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayDates {
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> AppResult<Self> {
        if check_out <= check_in {
            return Err(AppError::validation("invalid_dates", "Check-out date must be after check-in date"));
        }
        Ok(Self { check_in, check_out })
    }

    pub fn parse(check_in: &str, check_out: &str) -> AppResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
                .map_err(|_| AppError::validation("invalid_date", format!("'{s}' is not a date (YYYY-MM-DD)")))
        };
        Self::new(parse(check_in)?, parse(check_out)?)
    }

    pub fn check_in(&self) -> NaiveDate { self.check_in }
    pub fn check_out(&self) -> NaiveDate { self.check_out }
    pub fn nights(&self) -> i64 { (self.check_out - self.check_in).num_days() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingTransaction {
    booking_id: String,
    property_id: String,
    stay: StayDates,
    total_price: Money,
    status: TxStatus,
    payment_reference: Option<String>,
    authorization_url: Option<String>,
    failure: Option<String>,
}

impl BookingTransaction {
    /// A booking the server has accepted.
    pub fn created(booking_id: impl Into<String>, property_id: impl Into<String>, stay: StayDates, total_price: Money) -> Self {
        Self {
            booking_id: booking_id.into(),
            property_id: property_id.into(),
            stay,
            total_price,
            status: TxStatus::Created,
            payment_reference: None,
            authorization_url: None,
            failure: None,
        }
    }

    pub fn booking_id(&self) -> &str { &self.booking_id }
    pub fn property_id(&self) -> &str { &self.property_id }
    pub fn stay(&self) -> StayDates { self.stay }
    pub fn total_price(&self) -> Money { self.total_price }
    pub fn status(&self) -> TxStatus { self.status }
    pub fn payment_reference(&self) -> Option<&str> { self.payment_reference.as_deref() }
    pub fn authorization_url(&self) -> Option<&str> { self.authorization_url.as_deref() }
    /// Reason for the last failed step, kept for display.
    pub fn failure(&self) -> Option<&str> { self.failure.as_deref() }

    /// Start (or restart after `payment_failed`) payment initialization.
    pub(crate) fn begin_payment(&mut self) -> AppResult<()> {
        match self.status {
            TxStatus::Created | TxStatus::PaymentFailed => {
                self.status = TxStatus::PaymentInitializing;
                self.failure = None;
                Ok(())
            }
            other => Err(invalid_transition(other, "initialize payment")),
        }
    }

    pub(crate) fn await_gateway(&mut self, authorization_url: String, reference: String) -> AppResult<()> {
        if self.status != TxStatus::PaymentInitializing {
            return Err(invalid_transition(self.status, "await the payment gateway"));
        }
        self.authorization_url = Some(authorization_url);
        self.payment_reference = Some(reference);
        self.status = TxStatus::PaymentPending;
        Ok(())
    }

    pub(crate) fn fail_payment(&mut self, reason: impl Into<String>) {
        if self.status == TxStatus::PaymentInitializing {
            self.status = TxStatus::PaymentFailed;
            self.failure = Some(reason.into());
        }
    }

    /// Initialization was refused for lack of a session; leave the booking restartable.
    pub(crate) fn revert_to_created(&mut self) {
        if self.status == TxStatus::PaymentInitializing {
            self.status = TxStatus::Created;
        }
    }

    /// Record the server's verification verdict. A confirmed transaction is final.
    pub(crate) fn apply_verification(&mut self, confirmed: bool, reason: Option<String>, total_price: Option<Money>) -> AppResult<()> {
        match self.status {
            TxStatus::PaymentPending | TxStatus::VerificationFailed => {}
            other => return Err(invalid_transition(other, "verify payment")),
        }
        if self.payment_reference.is_none() {
            return Err(AppError::validation("missing_reference", "No payment reference found"));
        }
        if confirmed {
            self.status = TxStatus::Confirmed;
            self.failure = None;
            if let Some(total) = total_price {
                self.total_price = total;
            }
        } else {
            self.status = TxStatus::VerificationFailed;
            self.failure = reason;
        }
        Ok(())
    }
}

fn invalid_transition(from: TxStatus, action: &str) -> AppError {
    AppError::validation("invalid_transition", format!("cannot {action} while the booking is {from}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx() -> BookingTransaction {
        BookingTransaction::created("B1", "P1", StayDates::parse("2025-03-01", "2025-03-03").unwrap(), Money::new(90000))
    }

    #[test]
    fn stay_dates_require_checkout_after_checkin() {
        assert_eq!(StayDates::parse("2025-03-01", "2025-03-03").unwrap().nights(), 2);
        assert_eq!(StayDates::parse("2025-03-03", "2025-03-03").unwrap_err().code_str(), "invalid_dates");
        assert_eq!(StayDates::parse("2025-03-04", "2025-03-03").unwrap_err().code_str(), "invalid_dates");
        assert_eq!(StayDates::parse("03/01/2025", "2025-03-03").unwrap_err().code_str(), "invalid_date");
    }

    #[test]
    fn happy_path() {
        let mut t = tx();
        t.begin_payment().unwrap();
        assert_eq!(t.status(), TxStatus::PaymentInitializing);
        t.await_gateway("https://pay.example/abc".into(), "REF123".into()).unwrap();
        assert_eq!(t.status(), TxStatus::PaymentPending);
        t.apply_verification(true, None, Some(Money::new(90000))).unwrap();
        assert_eq!(t.status(), TxStatus::Confirmed);
        assert!(t.status().is_terminal());
        assert_eq!(t.payment_reference(), Some("REF123"));
        assert!(t.begin_payment().is_err());
        assert!(t.apply_verification(false, None, None).is_err());
    }

    #[test]
    fn failed_initialization_can_be_restarted() {
        let mut t = tx();
        t.begin_payment().unwrap();
        t.fail_payment("Gateway unavailable");
        assert_eq!(t.status(), TxStatus::PaymentFailed);
        assert_eq!(t.failure(), Some("Gateway unavailable"));
        t.begin_payment().unwrap();
        assert_eq!(t.failure(), None);
        t.revert_to_created();
        assert_eq!(t.status(), TxStatus::Created);
    }

    #[test]
    fn reference_survives_failed_verification() {
        let mut t = tx();
        t.begin_payment().unwrap();
        t.await_gateway("https://pay.example/abc".into(), "REF123".into()).unwrap();
        t.apply_verification(false, Some("Payment declined".into()), None).unwrap();
        assert_eq!(t.status(), TxStatus::VerificationFailed);
        assert_eq!(t.failure(), Some("Payment declined"));
        assert_eq!(t.payment_reference(), Some("REF123"));
        // a later verification may still confirm
        t.apply_verification(true, None, None).unwrap();
        assert_eq!(t.status(), TxStatus::Confirmed);
    }

    #[test]
    fn verify_before_initialization_is_rejected() {
        let mut t = tx();
        assert_eq!(t.apply_verification(true, None, None).unwrap_err().code_str(), "invalid_transition");
        assert!(t.await_gateway("u".into(), "r".into()).is_err());
    }
}
