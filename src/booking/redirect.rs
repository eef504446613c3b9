//! Recoverable transaction handle.
//!
//! Everything needed to reconcile a payment after the gateway sends the user
//! back is carried in the return URL. Gateways differ in which query key they
//! populate, so both are accepted.

use reqwest::Url;

use crate::error::{AppError, AppResult};

pub const REFERENCE_KEYS: [&str; 2] = ["reference", "trxref"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentHandle {
    reference: String,
}

impl PaymentHandle {
    pub fn new(reference: impl Into<String>) -> AppResult<Self> {
        let reference = reference.into().trim().to_string();
        if reference.is_empty() {
            return Err(missing_reference());
        }
        Ok(Self { reference })
    }

    pub fn reference(&self) -> &str { &self.reference }

    /// Accepts an absolute URL, a path with query, or a bare `?query`.
    pub fn from_redirect_url(raw: &str) -> AppResult<Self> {
        let url = match Url::parse(raw.trim()) {
            Ok(u) => u,
            Err(_) => Url::parse("http://localhost/")
                .and_then(|base| base.join(raw.trim()))
                .map_err(|_| AppError::validation("invalid_redirect", "Return address could not be read"))?,
        };
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        REFERENCE_KEYS
            .iter()
            .find_map(|key| pairs.iter().find(|(k, v)| k == key && !v.trim().is_empty()).map(|(_, v)| v.clone()))
            .map(Self::new)
            .unwrap_or_else(|| Err(missing_reference()))
    }
}

fn missing_reference() -> AppError { AppError::validation("missing_reference", "No payment reference found") }
