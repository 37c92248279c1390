//! Resolution of the readings service base URL.
//!
//! # Design
//! The service location may change at runtime (service discovery), so the
//! client asks for it on every call instead of caching it. `UrlResolver` is
//! built once per client and only reads its parameters afterwards; any
//! changing state lives behind the injected `Endpointer`.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::ResolveError;

pub const DEFAULT_SERVICE_KEY: &str = "core-data";
pub const DEFAULT_PATH: &str = "/api/v1/reading";

/// Where to find the readings service.
///
/// With `use_registry` unset the base URL is `url`; otherwise it is asked
/// from the client's `Endpointer` using `service_key`. `path` is appended to
/// the base URL in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointParams {
    pub service_key: String,
    pub path: String,
    pub use_registry: bool,
    pub url: String,
}

impl Default for EndpointParams {
    fn default() -> Self {
        Self {
            service_key: DEFAULT_SERVICE_KEY.to_string(),
            path: DEFAULT_PATH.to_string(),
            use_registry: false,
            url: String::new(),
        }
    }
}

impl EndpointParams {
    /// Parameters pointing straight at `url` with the default path.
    pub fn fixed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Read parameters from `READINGS_*` environment variables.
    ///
    /// `READINGS_URL` is required unless `READINGS_USE_REGISTRY` is true.
    pub fn from_env() -> Result<Self, ResolveError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ResolveError> {
        let mut params = Self::default();
        if let Some(key) = lookup("READINGS_SERVICE_KEY") {
            params.service_key = key;
        }
        if let Some(path) = lookup("READINGS_PATH") {
            params.path = path;
        }
        if let Some(flag) = lookup("READINGS_USE_REGISTRY") {
            params.use_registry = flag
                .trim()
                .parse()
                .map_err(|_| ResolveError::Config(format!("READINGS_USE_REGISTRY={flag}")))?;
        }
        match lookup("READINGS_URL") {
            Some(url) => params.url = url,
            None if params.use_registry => {}
            None => return Err(ResolveError::Config("READINGS_URL is not set".to_string())),
        }
        Ok(params)
    }
}

/// Supplies the current base URL of a service.
///
/// Implementations may return a different URL on every call.
pub trait Endpointer: Send + Sync {
    fn base_url(&self, params: &EndpointParams) -> Result<String, ResolveError>;
}

impl<F> Endpointer for F
where
    F: Fn(&EndpointParams) -> Result<String, ResolveError> + Send + Sync,
{
    fn base_url(&self, params: &EndpointParams) -> Result<String, ResolveError> {
        self(params)
    }
}

/// An `Endpointer` that always answers with the same URL.
#[derive(Debug, Clone)]
pub struct StaticEndpointer {
    url: String,
}

impl StaticEndpointer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Endpointer for StaticEndpointer {
    fn base_url(&self, _params: &EndpointParams) -> Result<String, ResolveError> {
        Ok(self.url.clone())
    }
}

/// Turns `EndpointParams` into the URL prefix of the readings resource.
#[derive(Clone)]
pub struct UrlResolver {
    params: EndpointParams,
    endpointer: Arc<dyn Endpointer>,
}

impl UrlResolver {
    pub fn new(params: EndpointParams, endpointer: Arc<dyn Endpointer>) -> Self {
        Self { params, endpointer }
    }

    pub fn params(&self) -> &EndpointParams {
        &self.params
    }

    /// Resolve the current prefix: base URL followed by the resource path,
    /// without a trailing slash.
    pub fn prefix(&self) -> Result<String, ResolveError> {
        let base = if self.params.use_registry {
            self.endpointer.base_url(&self.params)?
        } else {
            self.params.url.clone()
        };

        let base = base.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(ResolveError::Unavailable(self.params.service_key.clone()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ResolveError::Invalid(base.to_string()));
        }

        let path = self.params.path.trim().trim_end_matches('/');
        if path.is_empty() || path.starts_with('/') {
            Ok(format!("{base}{path}"))
        } else {
            Ok(format!("{base}/{path}"))
        }
    }
}

impl std::fmt::Debug for UrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlResolver")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
