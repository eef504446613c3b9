//! Typed GraphQL operations.
//!
//! Each operation pairs a document with explicit variable and result types so
//! that a response which does not match is rejected at the gateway, once,
//! instead of surfacing later as a missing field.

use std::fmt;

use chrono::NaiveDate;
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize};

use crate::identity::Identity;

pub trait Operation {
    /// Sent as `operationName`.
    const NAME: &'static str;
    /// Top-level field under `data` that carries the result.
    const FIELD: &'static str;
    const DOCUMENT: &'static str;
    /// Refused locally, without a round-trip, when no credential is held.
    const REQUIRES_AUTH: bool = false;

    type Variables: Serialize;
    type Output: DeserializeOwned;
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoVariables {}

/// Whole currency units as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub fn new(amount: i64) -> Self { Money(amount) }
    pub fn amount(self) -> i64 { self.0 }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let n = serde_json::Number::deserialize(deserializer)?;
        if let Some(i) = n.as_i64() {
            return Ok(Money(i));
        }
        match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Money(f as i64)),
            _ => Err(D::Error::custom(format!("amount {n} is not a whole number"))),
        }
    }
}

// ---- auth payloads ----

/// Credential, identity and server message returned by every auth mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: Identity,
    #[serde(default)]
    pub message: Option<String>,
}

/// Bare acknowledgment; servers answer with either a flag or a sentence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Ack {
    Flag(bool),
    Message(String),
}

macro_rules! auth_document {
    ($decl:literal, $call:literal) => {
        concat!(
            "mutation ", $decl, " { ", $call,
            " { token user { id name email role isEmailVerified avatar phone emailNotifications } message } }"
        )
    };
}

pub struct CurrentUser;

impl Operation for CurrentUser {
    const NAME: &'static str = "CurrentUser";
    const FIELD: &'static str = "currentUser";
    const DOCUMENT: &'static str =
        "query CurrentUser { currentUser { id name email role isEmailVerified avatar phone emailNotifications } }";
    const REQUIRES_AUTH: bool = true;
    type Variables = NoVariables;
    type Output = Option<Identity>;
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginVariables {
    pub input: LoginInput,
}

pub struct Login;

impl Operation for Login {
    const NAME: &'static str = "Login";
    const FIELD: &'static str = "login";
    const DOCUMENT: &'static str = auth_document!("Login($input: LoginInput!)", "login(input: $input)");
    type Variables = LoginVariables;
    type Output = AuthPayload;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginVariables {
    pub id_token: String,
}

pub struct LoginWithGoogle;

impl Operation for LoginWithGoogle {
    const NAME: &'static str = "LoginWithGoogle";
    const FIELD: &'static str = "loginWithGoogle";
    const DOCUMENT: &'static str =
        auth_document!("LoginWithGoogle($idToken: String!)", "loginWithGoogle(idToken: $idToken)");
    type Variables = GoogleLoginVariables;
    type Output = AuthPayload;
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpInput {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterVariables {
    pub input: SignUpInput,
}

pub struct Register;

impl Operation for Register {
    const NAME: &'static str = "Register";
    const FIELD: &'static str = "register";
    const DOCUMENT: &'static str = auth_document!("Register($input: SignUpInput!)", "register(input: $input)");
    type Variables = RegisterVariables;
    type Output = AuthPayload;
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyEmailVariables {
    pub otp: String,
}

pub struct VerifyEmail;

impl Operation for VerifyEmail {
    const NAME: &'static str = "VerifyEmail";
    const FIELD: &'static str = "verifyEmail";
    const DOCUMENT: &'static str = auth_document!("VerifyEmail($otp: String!)", "verifyEmail(otp: $otp)");
    const REQUIRES_AUTH: bool = true;
    type Variables = VerifyEmailVariables;
    type Output = AuthPayload;
}

#[derive(Debug, Clone, Serialize)]
pub struct EmailVariables {
    pub email: String,
}

pub struct ResendOtp;

impl Operation for ResendOtp {
    const NAME: &'static str = "ResendOTP";
    const FIELD: &'static str = "resendOTP";
    const DOCUMENT: &'static str = "mutation ResendOTP($email: String!) { resendOTP(email: $email) }";
    type Variables = EmailVariables;
    type Output = Ack;
}

pub struct ForgotPassword;

impl Operation for ForgotPassword {
    const NAME: &'static str = "ForgotPassword";
    const FIELD: &'static str = "forgotPassword";
    const DOCUMENT: &'static str = "mutation ForgotPassword($email: String!) { forgotPassword(email: $email) }";
    type Variables = EmailVariables;
    type Output = Ack;
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetPasswordVariables {
    pub token: String,
    pub password: String,
}

pub struct ResetPassword;

impl Operation for ResetPassword {
    const NAME: &'static str = "ResetPassword";
    const FIELD: &'static str = "resetPassword";
    const DOCUMENT: &'static str = auth_document!(
        "ResetPassword($token: String!, $password: String!)",
        "resetPassword(token: $token, password: $password)"
    );
    type Variables = ResetPasswordVariables;
    type Output = AuthPayload;
}

// ---- booking and payment ----

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PropertyRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub total_price: Money,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub property: Option<PropertyRef>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingVariables {
    pub property_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

pub struct CreateBooking;

impl Operation for CreateBooking {
    const NAME: &'static str = "CreateBooking";
    const FIELD: &'static str = "createBooking";
    const DOCUMENT: &'static str = "mutation CreateBooking($propertyId: ID!, $checkIn: String!, $checkOut: String!) { \
        createBooking(propertyId: $propertyId, checkIn: $checkIn, checkOut: $checkOut) { \
        _id property { _id name } checkIn checkOut totalPrice status } }";
    const REQUIRES_AUTH: bool = true;
    type Variables = CreateBookingVariables;
    type Output = BookingRecord;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializePaymentVariables {
    pub booking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInit {
    pub success: bool,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct InitializePayment;

impl Operation for InitializePayment {
    const NAME: &'static str = "InitializePayment";
    const FIELD: &'static str = "initializePayment";
    const DOCUMENT: &'static str = "mutation InitializePayment($bookingId: ID!) { \
        initializePayment(bookingId: $bookingId) { success authorizationUrl reference amount error } }";
    const REQUIRES_AUTH: bool = true;
    type Variables = InitializePaymentVariables;
    type Output = PaymentInit;
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentVariables {
    pub reference: String,
}

/// Server-side booking state returned by payment verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedBooking {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    pub total_price: Money,
    #[serde(default)]
    pub property: Option<PropertyRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentVerification {
    pub success: bool,
    #[serde(default)]
    pub booking: Option<VerifiedBooking>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct VerifyPayment;

impl Operation for VerifyPayment {
    const NAME: &'static str = "VerifyPayment";
    const FIELD: &'static str = "verifyPayment";
    const DOCUMENT: &'static str = "mutation VerifyPayment($reference: String!) { \
        verifyPayment(reference: $reference) { success \
        booking { _id status paymentStatus totalPrice property { _id name } } message error } }";
    const REQUIRES_AUTH: bool = true;
    type Variables = VerifyPaymentVariables;
    type Output = PaymentVerification;
}

// ---- listings ----

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReviewScore {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OwnerRef {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub price_per_night: Money,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
    #[serde(default)]
    pub reviews: Vec<ReviewScore>,
}

impl PropertySummary {
    pub fn average_rating(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: i64 = self.reviews.iter().map(|r| r.rating as i64).sum();
        Some(total as f64 / self.reviews.len() as f64)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertiesVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<i64>,
}

pub struct Properties;

impl Operation for Properties {
    const NAME: &'static str = "Properties";
    const FIELD: &'static str = "properties";
    const DOCUMENT: &'static str = "query Properties($location: String, $maxPrice: Int) { \
        properties(location: $location, maxPrice: $maxPrice) { \
        id name location images pricePerNight owner { id name } reviews { id rating } } }";
    type Variables = PropertiesVariables;
    type Output = Vec<PropertySummary>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDetail {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub price_per_night: Money,
    #[serde(default)]
    pub reviews: Vec<ReviewScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdVariables {
    pub id: String,
}

pub struct Property;

impl Operation for Property {
    const NAME: &'static str = "Property";
    const FIELD: &'static str = "property";
    const DOCUMENT: &'static str = "query Property($id: ID!) { property(id: $id) { \
        _id name location description images pricePerNight reviews { _id rating } } }";
    type Variables = IdVariables;
    type Output = Option<PropertyDetail>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub check_in: String,
    pub check_out: String,
    pub total_price: Money,
    pub status: String,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub property: Option<PropertyRef>,
}

pub struct BookingsByUser;

impl Operation for BookingsByUser {
    const NAME: &'static str = "UserBookings";
    const FIELD: &'static str = "bookingsByUser";
    const DOCUMENT: &'static str = "query UserBookings { bookingsByUser { \
        id checkIn checkOut totalPrice status paymentReference paymentStatus createdAt \
        property { id name location images } } }";
    const REQUIRES_AUTH: bool = true;
    type Variables = NoVariables;
    type Output = Vec<BookingSummary>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedProperty {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    pub location: String,
    pub price_per_night: Money,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub bookings: Vec<ManagedBooking>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedBooking {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub check_in: String,
    pub check_out: String,
    pub status: String,
}

pub struct MyProperties;

impl Operation for MyProperties {
    const NAME: &'static str = "MyProperties";
    const FIELD: &'static str = "myProperties";
    const DOCUMENT: &'static str = "query MyProperties { myProperties { \
        _id name location images pricePerNight verified createdAt \
        bookings { _id checkIn checkOut status } } }";
    const REQUIRES_AUTH: bool = true;
    type Variables = NoVariables;
    type Output = Vec<ManagedProperty>;
}
