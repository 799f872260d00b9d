use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::model::Trace;
use super::QUERY_TRACE;
use crate::mcp::context::RequestContext;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors returned by the GraphQL backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The context carries no backend URL.
    #[error("no SkyWalking backend URL configured")]
    NoBackend,

    /// The request could not be sent or the response could not be read.
    #[error("request to {url} failed: {source}")]
    Http {
        /// The GraphQL endpoint.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// The backend reported GraphQL errors.
    #[error("{}", messages.join("; "))]
    Graphql {
        /// The reported error messages.
        messages: Vec<String>,
    },

    /// The response carried neither data nor errors.
    #[error("response contained no data")]
    MissingData,

    /// The `data` payload did not have the expected shape.
    #[error("unexpected response shape: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlErrorMessage>,
}

#[derive(Deserialize)]
struct GraphqlErrorMessage {
    message: String,
}

#[derive(Deserialize)]
struct ResultEnvelope<T> {
    result: Option<T>,
}

/// Posts GraphQL queries to one OAP endpoint.
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    url: String,
    client: reqwest::Client,
}

impl GraphqlClient {
    /// Creates a client for the endpoint named by `ctx`.
    ///
    /// Certificate verification is disabled when the context is insecure.
    ///
    /// # Errors
    ///
    /// Returns an error if the context has no backend URL or the HTTP client
    /// cannot be built.
    pub fn from_context(ctx: &RequestContext) -> Result<Self, BackendError> {
        let url = ctx.backend_url().ok_or(BackendError::NoBackend)?.to_string();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(ctx.insecure())
            .build()
            .map_err(|source| BackendError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { url, client })
    }

    /// The GraphQL endpoint this client talks to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs a query whose payload is aliased as `result` and decodes it.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, a non-success status, GraphQL
    /// errors, or a payload that does not decode as `T`.
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<Option<T>, BackendError> {
        tracing::debug!(url = %self.url, "Sending GraphQL query");

        let response = self
            .client
            .post(&self.url)
            .json(&GraphqlRequest { query, variables })
            .send()
            .await
            .map_err(|source| self.http_error(source))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: GraphqlResponse = response
            .json()
            .await
            .map_err(|source| self.http_error(source))?;

        if !body.errors.is_empty() {
            return Err(BackendError::Graphql {
                messages: body.errors.into_iter().map(|e| e.message).collect(),
            });
        }

        let data = body.data.ok_or(BackendError::MissingData)?;
        let envelope: ResultEnvelope<T> =
            serde_json::from_value(data).map_err(BackendError::Decode)?;
        Ok(envelope.result)
    }

    /// Fetches a trace by its ID. A trace unknown to the backend is empty.
    ///
    /// # Errors
    ///
    /// See [`GraphqlClient::query`].
    pub async fn query_trace(&self, trace_id: &str) -> Result<Trace, BackendError> {
        let trace = self
            .query::<Trace>(QUERY_TRACE, json!({ "traceId": trace_id }))
            .await?;
        Ok(trace.unwrap_or_default())
    }

    fn http_error(&self, source: reqwest::Error) -> BackendError {
        BackendError::Http {
            url: self.url.clone(),
            source,
        }
    }
}
