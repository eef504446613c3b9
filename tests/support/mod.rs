//! In-process mock GraphQL backend shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

use stayflow::identity::MemoryCredentialStore;
use stayflow::navigation::{Navigation, Navigator};
use stayflow::{AppState, ClientConfig};

pub const TRAVELER_EMAIL: &str = "tess@x.com";
pub const MANAGER_EMAIL: &str = "mo@x.com";
pub const PASSWORD: &str = "password123";
pub const GOOD_OTP: &str = "123456";
pub const GOOD_RESET_TOKEN: &str = "reset-ok";
pub const GOOGLE_TOKEN: &str = "google-ok";

#[derive(Clone)]
struct User {
    id: String,
    name: String,
    email: String,
    password: String,
    role: &'static str,
    verified: bool,
}

impl User {
    fn to_json(&self) -> Value {
        json!({
            "id": self.id, "name": self.name, "email": self.email, "role": self.role,
            "isEmailVerified": self.verified, "avatar": null, "phone": null, "emailNotifications": true
        })
    }
}

#[derive(Clone)]
struct Booking {
    id: String,
    user_id: String,
    property_id: String,
    check_in: String,
    check_out: String,
    total: i64,
    status: &'static str,
    payment_status: &'static str,
    reference: Option<String>,
}

#[derive(Default)]
struct Inner {
    users: Vec<User>,
    tokens: HashMap<String, String>,
    issued: u64,
    bookings: Vec<Booking>,
    calls: HashMap<String, usize>,
    request_ids: Vec<String>,
    fail_status: Option<u16>,
    fail_init: bool,
    decline_verify: bool,
}

pub struct MockBackend {
    pub addr: SocketAddr,
    inner: Arc<Mutex<Inner>>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            users: vec![
                User { id: "U1".into(), name: "Tess".into(), email: TRAVELER_EMAIL.into(), password: PASSWORD.into(), role: "traveler", verified: true },
                User { id: "U2".into(), name: "Mo".into(), email: MANAGER_EMAIL.into(), password: PASSWORD.into(), role: "manager", verified: true },
            ],
            ..Default::default()
        }));
        let app = Router::new().route("/graphql", post(graphql)).with_state(inner.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self { addr, inner }
    }

    pub fn endpoint(&self) -> String { format!("http://{}/graphql", self.addr) }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::default()
            .with_endpoint(self.endpoint())
            .with_dashboard_delay(Duration::from_millis(20))
            .with_reset_redirect_delay(Duration::from_millis(20))
            .with_http_timeout(Duration::from_secs(5))
    }

    /// Client wired to this backend with an in-memory credential store.
    pub fn app(&self) -> (AppState, UnboundedReceiver<Navigation>) {
        let (navigator, rx) = Navigator::channel();
        let state = AppState::new(self.config(), Arc::new(MemoryCredentialStore::default()), navigator).unwrap();
        (state, rx)
    }

    pub fn calls(&self, op: &str) -> usize { self.inner.lock().calls.get(op).copied().unwrap_or(0) }
    pub fn request_ids(&self) -> Vec<String> { self.inner.lock().request_ids.clone() }
    pub fn issue_token(&self, email: &str) -> String {
        let mut g = self.inner.lock();
        let id = g.users.iter().find(|u| u.email == email).map(|u| u.id.clone()).unwrap();
        issue(&mut g, &id)
    }
    /// Invalidate every credential issued so far.
    pub fn expire_tokens(&self) { self.inner.lock().tokens.clear(); }
    pub fn fail_with_status(&self, status: Option<u16>) { self.inner.lock().fail_status = status; }
    pub fn fail_payment_init(&self, fail: bool) { self.inner.lock().fail_init = fail; }
    pub fn decline_verification(&self, decline: bool) { self.inner.lock().decline_verify = decline; }
    pub fn booking_status(&self, id: &str) -> Option<String> {
        self.inner.lock().bookings.iter().find(|b| b.id == id).map(|b| b.status.to_string())
    }
}

pub async fn next_nav(rx: &mut UnboundedReceiver<Navigation>) -> Navigation {
    tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap()
}

pub fn date(s: &str) -> NaiveDate { NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap() }

fn issue(g: &mut Inner, user_id: &str) -> String {
    g.issued += 1;
    let token = format!("tok-{}-{}", user_id, g.issued);
    g.tokens.insert(token.clone(), user_id.to_string());
    token
}

fn ok(field: &str, value: Value) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "data": { field: value } })))
}

fn gql_error(message: &str, code: &str, field: Option<&str>) -> (StatusCode, Json<Value>) {
    let mut ext = json!({ "code": code });
    if let Some(f) = field {
        ext["field"] = json!(f);
    }
    (StatusCode::OK, Json(json!({ "data": null, "errors": [{ "message": message, "extensions": ext }] })))
}

fn unauthenticated() -> (StatusCode, Json<Value>) { gql_error("Not authenticated", "UNAUTHENTICATED", None) }

fn properties() -> Vec<Value> {
    vec![
        json!({ "id": "P1", "name": "Lagoon Suites", "location": "Lagos", "images": [], "pricePerNight": 45000,
                "description": "Waterfront rooms", "owner": { "id": "U2", "name": "Mo" },
                "reviews": [{ "id": "R1", "rating": 4 }, { "id": "R2", "rating": 5 }] }),
        json!({ "id": "P2", "name": "Harbour View", "location": "Abuja", "images": [], "pricePerNight": 60000,
                "owner": { "id": "U2", "name": "Mo" }, "reviews": [] }),
    ]
}

fn auth_payload(user: &User, token: String, message: &str) -> Value {
    json!({ "token": token, "user": user.to_json(), "message": message })
}

fn booking_json(b: &Booking) -> Value {
    let name = properties().into_iter().find(|p| p["id"] == b.property_id.as_str()).map(|p| p["name"].clone());
    json!({
        "_id": b.id, "checkIn": b.check_in, "checkOut": b.check_out, "totalPrice": b.total,
        "status": b.status, "paymentStatus": b.payment_status, "paymentReference": b.reference,
        "property": { "_id": b.property_id, "name": name }
    })
}

async fn graphql(
    State(inner): State<Arc<Mutex<Inner>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let op = body["operationName"].as_str().unwrap_or_default().to_string();
    let vars = body["variables"].clone();
    let mut g = inner.lock();
    *g.calls.entry(op.clone()).or_default() += 1;
    if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        g.request_ids.push(id.to_string());
    }
    if let Some(status) = g.fail_status {
        return (StatusCode::from_u16(status).unwrap(), Json(json!({ "message": "upstream unavailable" })));
    }
    let caller = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|t| g.tokens.get(t).cloned())
        .and_then(|id| g.users.iter().find(|u| u.id == id).cloned());

    match op.as_str() {
        "CurrentUser" => match caller {
            Some(u) => ok("currentUser", u.to_json()),
            None => unauthenticated(),
        },
        "Login" => {
            let email = vars["input"]["email"].as_str().unwrap_or_default();
            let password = vars["input"]["password"].as_str().unwrap_or_default();
            match g.users.iter().find(|u| u.email == email && u.password == password).cloned() {
                Some(u) => {
                    let token = issue(&mut g, &u.id);
                    ok("login", auth_payload(&u, token, "Login successful"))
                }
                None => gql_error("Invalid credentials", "BAD_USER_INPUT", None),
            }
        }
        "LoginWithGoogle" => {
            if vars["idToken"] != GOOGLE_TOKEN {
                return gql_error("Invalid Google token", "UNAUTHENTICATED", None);
            }
            let u = g.users[0].clone();
            let token = issue(&mut g, &u.id);
            ok("loginWithGoogle", auth_payload(&u, token, "Login successful"))
        }
        "Register" => {
            let input = &vars["input"];
            let email = input["email"].as_str().unwrap_or_default().to_string();
            if g.users.iter().any(|u| u.email == email) {
                return gql_error("Email already registered", "BAD_USER_INPUT", Some("email"));
            }
            let user = User {
                id: format!("U{}", g.users.len() + 1),
                name: input["name"].as_str().unwrap_or_default().to_string(),
                email,
                password: input["password"].as_str().unwrap_or_default().to_string(),
                role: "traveler",
                verified: false,
            };
            g.users.push(user.clone());
            let token = issue(&mut g, &user.id);
            ok("register", auth_payload(&user, token, "Registration successful. Please check your email for the verification code."))
        }
        "VerifyEmail" => {
            let Some(u) = caller else { return unauthenticated() };
            if vars["otp"] != GOOD_OTP {
                return gql_error("Invalid or expired OTP", "BAD_USER_INPUT", Some("otp"));
            }
            if let Some(stored) = g.users.iter_mut().find(|x| x.id == u.id) {
                stored.verified = true;
            }
            let verified = User { verified: true, ..u };
            let token = issue(&mut g, &verified.id);
            ok("verifyEmail", auth_payload(&verified, token, "Email verified successfully"))
        }
        "ResendOTP" | "ForgotPassword" => {
            let email = vars["email"].as_str().unwrap_or_default();
            let field = if op == "ResendOTP" { "resendOTP" } else { "forgotPassword" };
            // deliberately leaky backend: the client must not pass this on
            if !g.users.iter().any(|u| u.email == email) {
                return gql_error("No account with that email", "NOT_FOUND", None);
            }
            ok(field, json!(true))
        }
        "ResetPassword" => {
            if vars["token"] != GOOD_RESET_TOKEN {
                return gql_error("Invalid or expired reset token", "BAD_USER_INPUT", None);
            }
            let u = g.users[0].clone();
            let token = issue(&mut g, &u.id);
            ok("resetPassword", auth_payload(&u, token, "Password reset successful"))
        }
        "CreateBooking" => {
            let Some(u) = caller else { return unauthenticated() };
            let property_id = vars["propertyId"].as_str().unwrap_or_default().to_string();
            let Some(property) = properties().into_iter().find(|p| p["id"] == property_id.as_str()) else {
                return gql_error("Property not found", "NOT_FOUND", None);
            };
            let check_in = vars["checkIn"].as_str().unwrap_or_default().to_string();
            let check_out = vars["checkOut"].as_str().unwrap_or_default().to_string();
            let nights = (date(&check_out) - date(&check_in)).num_days();
            let booking = Booking {
                id: format!("B{}", g.bookings.len() + 1),
                user_id: u.id,
                property_id,
                check_in,
                check_out,
                total: property["pricePerNight"].as_i64().unwrap_or_default() * nights,
                status: "pending",
                payment_status: "unpaid",
                reference: None,
            };
            g.bookings.push(booking.clone());
            ok("createBooking", booking_json(&booking))
        }
        "InitializePayment" => {
            let Some(u) = caller else { return unauthenticated() };
            let id = vars["bookingId"].as_str().unwrap_or_default();
            if g.fail_init {
                return ok("initializePayment", json!({ "success": false, "error": "Gateway unavailable" }));
            }
            let Some(pos) = g.bookings.iter().position(|b| b.id == id && b.user_id == u.id) else {
                return gql_error("Booking not found", "NOT_FOUND", None);
            };
            let (reference, url) = if pos == 0 {
                ("REF123".to_string(), "https://pay.example/abc".to_string())
            } else {
                (format!("REF{}", 123 + pos), format!("https://pay.example/{id}"))
            };
            g.bookings[pos].reference = Some(reference.clone());
            let amount = g.bookings[pos].total;
            ok("initializePayment", json!({ "success": true, "authorizationUrl": url, "reference": reference, "amount": amount }))
        }
        "VerifyPayment" => {
            if caller.is_none() {
                return unauthenticated();
            }
            let reference = vars["reference"].as_str().unwrap_or_default();
            if g.decline_verify {
                return ok("verifyPayment", json!({ "success": false, "error": "Payment was declined" }));
            }
            match g.bookings.iter_mut().find(|b| b.reference.as_deref() == Some(reference)) {
                Some(b) => {
                    b.status = "confirmed";
                    b.payment_status = "paid";
                    let booking = booking_json(b);
                    ok("verifyPayment", json!({ "success": true, "booking": booking, "message": "Payment verified" }))
                }
                None => ok("verifyPayment", json!({ "success": false, "error": "Transaction not found" })),
            }
        }
        "Properties" => {
            let location = vars["location"].as_str().map(str::to_lowercase);
            let max = vars["maxPrice"].as_i64();
            let list: Vec<Value> = properties()
                .into_iter()
                .filter(|p| location.as_ref().map_or(true, |l| p["location"].as_str().unwrap_or_default().to_lowercase().contains(l)))
                .filter(|p| max.map_or(true, |m| p["pricePerNight"].as_i64().unwrap_or_default() <= m))
                .collect();
            ok("properties", json!(list))
        }
        "Property" => {
            let found = properties().into_iter().find(|p| p["id"] == vars["id"]);
            ok("property", found.unwrap_or(Value::Null))
        }
        "UserBookings" => {
            let Some(u) = caller else { return unauthenticated() };
            let list: Vec<Value> = g.bookings.iter().filter(|b| b.user_id == u.id).map(booking_json).collect();
            ok("bookingsByUser", json!(list))
        }
        "MyProperties" => {
            let Some(u) = caller else { return unauthenticated() };
            if u.role != "manager" {
                return gql_error("Managers only", "FORBIDDEN", None);
            }
            let list: Vec<Value> = properties()
                .into_iter()
                .map(|mut p| {
                    p["verified"] = json!(true);
                    p["bookings"] = json!([]);
                    p
                })
                .collect();
            ok("myProperties", json!(list))
        }
        other => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "errors": [{ "message": format!("Unknown operation {other}"), "extensions": { "code": "GRAPHQL_VALIDATION_FAILED" } }] })),
        ),
    }
}
