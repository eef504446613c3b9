//! Single outbound channel to the GraphQL endpoint.
//!
//! Every call carries the session's bearer credential (when one is held) and a
//! fresh request id. Responses are classified here and nowhere else: transport
//! failure, authorization failure, business rejection, or a payload that does
//! not match the operation's declared shape.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::operations::Operation;
use crate::config::ClientConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{Credential, SessionStore};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const AUTH_ERROR_CODES: [&str; 2] = ["UNAUTHENTICATED", "FORBIDDEN"];
const EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
    #[serde(default)]
    extensions: Option<ErrorExtensions>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorExtensions {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    field: Option<String>,
}

impl GraphqlError {
    fn code(&self) -> Option<&str> { self.extensions.as_ref().and_then(|e| e.code.as_deref()) }

    fn is_auth(&self) -> bool {
        self.code().map(|c| AUTH_ERROR_CODES.contains(&c)).unwrap_or(false)
    }

    /// Field-level rejections become `invalid_<field>` so forms can attach the
    /// message to the right input.
    fn business_code(&self) -> String {
        if let Some(field) = self.extensions.as_ref().and_then(|e| e.field.as_deref()) {
            return format!("invalid_{}", field.to_ascii_lowercase());
        }
        self.code().map(|c| c.to_ascii_lowercase()).unwrap_or_else(|| "rejected".to_string())
    }
}

/// Map an HTTP status and body onto the `data` object or a classified error.
pub(crate) fn classify_response(status: u16, body: &str) -> AppResult<Value> {
    if status == 401 || status == 403 {
        return Err(AppError::auth("unauthenticated", EXPIRED_MESSAGE));
    }
    if status >= 500 {
        return Err(AppError::transport(format!("http_{status}"), format!("server responded with HTTP {status}")));
    }
    let resp: GraphqlResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) if (200..300).contains(&status) => {
            return Err(AppError::malformed("invalid_json", format!("response is not a GraphQL payload: {e}")));
        }
        Err(_) => {
            return Err(AppError::transport(format!("http_{status}"), format!("server responded with HTTP {status}")));
        }
    };
    if let Some(auth) = resp.errors.iter().find(|e| e.is_auth()) {
        return Err(AppError::auth("unauthenticated", auth.message.clone()));
    }
    if let Some(first) = resp.errors.first() {
        return Err(AppError::business(first.business_code(), first.message.clone()));
    }
    match resp.data {
        Some(data @ Value::Object(_)) => Ok(data),
        _ => Err(AppError::malformed("missing_data", "response carried neither data nor errors")),
    }
}

fn decode_field<O: Operation>(data: &Value) -> AppResult<O::Output> {
    let field = data
        .get(O::FIELD)
        .ok_or_else(|| AppError::malformed("missing_field", format!("{} response is missing '{}'", O::NAME, O::FIELD)))?;
    serde_json::from_value(field.clone())
        .map_err(|e| AppError::malformed("unexpected_shape", format!("{} response has an unexpected shape: {e}", O::NAME)))
}

struct GatewayInner {
    endpoint: Url,
    http: reqwest::Client,
    session: SessionStore,
    /// Read-query results keyed by operation name and variables.
    cache: RwLock<HashMap<String, Value>>,
}

#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayInner>,
}

impl GatewayClient {
    pub fn new(config: &ClientConfig, session: SessionStore) -> AppResult<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AppError::validation("invalid_endpoint", format!("invalid GraphQL endpoint '{}': {e}", config.endpoint))
        })?;
        let http = reqwest::Client::builder().timeout(config.http_timeout).build()?;
        Ok(Self { inner: Arc::new(GatewayInner { endpoint, http, session, cache: RwLock::new(HashMap::new()) }) })
    }

    pub fn endpoint(&self) -> &Url { &self.inner.endpoint }

    /// Run an operation with whatever credential the session currently holds.
    pub async fn execute<O: Operation>(&self, variables: &O::Variables) -> AppResult<O::Output> {
        let credential = self.inner.session.credential();
        self.execute_as::<O>(variables, credential.as_ref()).await
    }

    /// Run an operation with an explicit credential, or none at all.
    pub async fn execute_as<O: Operation>(
        &self,
        variables: &O::Variables,
        credential: Option<&Credential>,
    ) -> AppResult<O::Output> {
        if O::REQUIRES_AUTH && credential.is_none() {
            return Err(AppError::auth("not_authenticated", "Please sign in to continue."));
        }
        let vars = serde_json::to_value(variables)?;
        let data = self.dispatch(O::NAME, O::DOCUMENT, vars, credential).await?;
        decode_field::<O>(&data)
    }

    /// Like `execute`, but serves repeated identical reads from memory until
    /// the cache is invalidated.
    pub async fn query_cached<O: Operation>(&self, variables: &O::Variables) -> AppResult<O::Output> {
        let vars = serde_json::to_value(variables)?;
        let key = format!("{}:{}", O::NAME, vars);
        let cached = self.inner.cache.read().get(&key).cloned();
        if let Some(data) = cached {
            debug!(target: "gateway", op = O::NAME, "cache hit");
            return decode_field::<O>(&data);
        }
        let credential = self.inner.session.credential();
        if O::REQUIRES_AUTH && credential.is_none() {
            return Err(AppError::auth("not_authenticated", "Please sign in to continue."));
        }
        let data = self.dispatch(O::NAME, O::DOCUMENT, vars, credential.as_ref()).await?;
        let out = decode_field::<O>(&data)?;
        self.inner.cache.write().insert(key, data);
        Ok(out)
    }

    pub fn invalidate_cache(&self) {
        let dropped = {
            let mut cache = self.inner.cache.write();
            let n = cache.len();
            cache.clear();
            n
        };
        debug!(target: "gateway", dropped, "response cache invalidated");
    }

    pub fn cached_entries(&self) -> usize { self.inner.cache.read().len() }

    async fn dispatch(
        &self,
        name: &'static str,
        document: &'static str,
        variables: Value,
        credential: Option<&Credential>,
    ) -> AppResult<Value> {
        let request_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(REQUEST_ID_HEADER, v);
        }
        if let Some(c) = credential {
            let value = HeaderValue::from_str(&c.bearer())
                .map_err(|_| AppError::auth("invalid_credential", "Stored credential is not usable. Please sign in again."))?;
            headers.insert(AUTHORIZATION, value);
        }
        let body = json!({ "query": document, "variables": variables, "operationName": name });
        debug!(target: "gateway", op = name, %request_id, authenticated = credential.is_some(), "dispatch");

        let resp = self
            .inner
            .http
            .post(self.inner.endpoint.clone())
            .headers(headers)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| warn!(target: "gateway", op = name, %request_id, error = %e, "request failed"))?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let result = classify_response(status, &text);
        match &result {
            Ok(_) => debug!(target: "gateway", op = name, %request_id, status, "ok"),
            Err(e) => debug!(target: "gateway", op = name, %request_id, status, kind = ?e.kind(), code = e.code_str(), "rejected"),
        }
        result
    }
}
