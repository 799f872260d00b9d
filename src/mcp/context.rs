//! Request context and the enrichment chain that fills it in.
//!
//! Every tool invocation receives a [`RequestContext`] naming the SkyWalking
//! GraphQL endpoint to query. The context is derived once per stdio process
//! or once per SSE connection by running an ordered chain of enrichment
//! functions over an empty base context.
//!
//! Enrichment functions take the context by value and return the enriched
//! one. They only consult their inputs and the configuration captured when
//! they were built.

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::config::{ServerConfig, DEFAULT_SW_URL};

/// Header that overrides the backend URL for one SSE connection.
pub const SW_URL_HEADER: &str = "SW-URL";

/// Path suffix of the SkyWalking GraphQL endpoint.
pub const GRAPHQL_SUFFIX: &str = "/graphql";

/// Per-connection data threaded to tool handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    backend_url: Option<String>,
    insecure: bool,
    read_only: bool,
}

impl RequestContext {
    /// The GraphQL endpoint, if enrichment has set one.
    #[must_use]
    pub fn backend_url(&self) -> Option<&str> {
        self.backend_url.as_deref()
    }

    /// Whether TLS certificate verification should be skipped.
    #[must_use]
    pub const fn insecure(&self) -> bool {
        self.insecure
    }

    /// Whether the server runs in read-only mode.
    #[must_use]
    pub const fn read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the context with the backend URL and insecure flag set.
    #[must_use]
    pub fn with_backend(mut self, url: impl Into<String>, insecure: bool) -> Self {
        self.backend_url = Some(url.into());
        self.insecure = insecure;
        self
    }

    /// Returns the context with the read-only flag set.
    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// Enrichment step for the stdio transport.
pub type StdioContextFn = Arc<dyn Fn(RequestContext) -> RequestContext + Send + Sync>;

/// Enrichment step for the SSE transport, with access to request headers.
pub type HttpContextFn = Arc<dyn Fn(RequestContext, &HeaderMap) -> RequestContext + Send + Sync>;

/// Ensures `url` ends with exactly one `/graphql` suffix.
///
/// Surrounding whitespace and trailing slashes are removed first, so
/// `http://oap:12800/`, `http://oap:12800/graphql` and
/// `http://oap:12800/graphql/` all become `http://oap:12800/graphql`.
#[must_use]
pub fn normalize_backend_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.ends_with(GRAPHQL_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{GRAPHQL_SUFFIX}")
    }
}

/// Composes stdio enrichment steps, applied in order.
#[must_use]
pub fn compose_stdio(funcs: Vec<StdioContextFn>) -> StdioContextFn {
    Arc::new(move |ctx: RequestContext| funcs.iter().fold(ctx, |ctx, f| f(ctx)))
}

/// Composes SSE enrichment steps, applied in order.
#[must_use]
pub fn compose_http(funcs: Vec<HttpContextFn>) -> HttpContextFn {
    Arc::new(move |ctx: RequestContext, headers: &HeaderMap| {
        funcs.iter().fold(ctx, |ctx, f| f(ctx, headers))
    })
}

/// Derives the backend URL from static configuration.
#[must_use]
pub fn url_from_config(config: &ServerConfig) -> StdioContextFn {
    let url = normalize_backend_url(config.url().unwrap_or(DEFAULT_SW_URL));
    let read_only = config.read_only;
    Arc::new(move |ctx: RequestContext| {
        ctx.with_backend(url.clone(), false)
            .with_read_only(read_only)
    })
}

/// Derives the backend URL from the `SW-URL` header, falling back to static
/// configuration and then to [`DEFAULT_SW_URL`].
#[must_use]
pub fn url_from_headers(config: &ServerConfig) -> HttpContextFn {
    let fallback = config.url().unwrap_or(DEFAULT_SW_URL).to_string();
    let read_only = config.read_only;
    Arc::new(move |ctx: RequestContext, headers: &HeaderMap| {
        let url = headers
            .get(SW_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(fallback.as_str());
        ctx.with_backend(normalize_backend_url(url), false)
            .with_read_only(read_only)
    })
}

/// The full enrichment chain for the stdio transport.
#[must_use]
pub fn stdio_context_fn(config: &ServerConfig) -> StdioContextFn {
    compose_stdio(vec![url_from_config(config)])
}

/// The full enrichment chain for the SSE transport.
#[must_use]
pub fn http_context_fn(config: &ServerConfig) -> HttpContextFn {
    compose_http(vec![url_from_headers(config)])
}
