//! Authenticated request execution
//!
//! One path for every API call: attach the bearer token when one is
//! stored, hand 401s to the auth client's single-flight expiry guard,
//! extract the most specific server error message on other failures, and
//! unwrap the versioned `{ "data": ... }` envelope on success. Legacy
//! endpoints that answer with a bare payload are deserialized as-is; the
//! envelope check is an explicit parse attempt, not a runtime probe of the
//! body's keys.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sproutly_rust_auth::AuthClient;
use tracing::warn;
use url::Url;

use crate::endpoint::ApiPath;
use crate::error::Error;

#[derive(Clone)]
pub(crate) struct Transport {
    client: Client,
    paths: ApiPath,
    auth: Arc<AuthClient>,
    timeout: Option<Duration>,
}

impl Transport {
    pub(crate) fn new(
        client: Client,
        paths: ApiPath,
        auth: Arc<AuthClient>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            paths,
            auth,
            timeout,
        }
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        self.execute(Method::GET, path, None).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        self.execute(Method::POST, path, Some(serde_json::to_value(body)?))
            .await
    }

    /// POST where the caller only cares that the write landed; the response
    /// body is dropped without being parsed.
    pub(crate) async fn post_and_forget<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), Error> {
        self.execute_raw(Method::POST, path, Some(serde_json::to_value(body)?))
            .await?;
        Ok(())
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, Error> {
        let response = self.execute_raw(method, path, body).await?;
        let value = response.json::<Value>().await?;
        unwrap_envelope(value)
    }

    async fn execute_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, Error> {
        let url = Url::parse(&self.paths.url(path))?;
        let mut request = self.client.request(method, url);

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        // The server is the final authority on rejecting unauthenticated
        // calls; a missing token is worth a warning, not an early return.
        match self.auth.access_token().await {
            Some(token) => request = request.bearer_auth(token),
            None => warn!("no access token stored; sending unauthenticated request to {path}"),
        }

        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.auth.handle_unauthorized().await;
            return Err(Error::SessionExpired);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message: extract_error_message(&body, status),
            });
        }

        Ok(response)
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Unwrap `{ "data": T }` if the body matches that shape, otherwise
/// deserialize the whole body as `T` (legacy unwrapped responses).
pub(crate) fn unwrap_envelope<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    match serde_json::from_value::<Envelope<T>>(value.clone()) {
        Ok(envelope) => Ok(envelope.data),
        Err(_) => Ok(serde_json::from_value(value)?),
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    error: Option<ErrorField>,
    message: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Nested { message: String },
}

/// Pick the most specific message out of an error body: a string `error`
/// field, then a nested `error.message`, then a top-level `message`, then
/// a generic fallback carrying the status. An unparsable body falls
/// through to the fallback.
pub(crate) fn extract_error_message(body: &str, status: StatusCode) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    match parsed.error {
        Some(ErrorField::Text(text)) => text,
        Some(ErrorField::Nested { message }) => message,
        None => parsed.message.unwrap_or_else(|| {
            format!(
                "API error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
        }),
    }
}
