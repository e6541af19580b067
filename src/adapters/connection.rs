//! Credentials, settings and transport shared by one adapter instance.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::default_transport;
use crate::config::ClientSettings;
use crate::credentials::{resolve_api_key, resolve_from_env, ApiKey};
use crate::error::Result;
use crate::transport::{Auth, HttpTransport};

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Resolved credential plus the transport it is sent over.
///
/// Serializes with the key redacted and the transport omitted.
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    api_key: ApiKey,
    settings: ClientSettings,
    #[serde(skip)]
    transport: Arc<dyn HttpTransport>,
}

impl Connection {
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }

    /// Key from `PARALLEL_AI_API_KEY`, default settings and transport
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub(crate) fn bearer(&self) -> Auth {
        Auth::Bearer(self.api_key.clone())
    }

    pub(crate) fn api_key_header(&self) -> Auth {
        Auth::Header {
            name: "x-api-key",
            key: self.api_key.clone(),
        }
    }
}

/// Builder for [`Connection`]. Key resolution happens in [`build`](Self::build),
/// before any transport is used.
#[derive(Default)]
pub struct ConnectionBuilder {
    api_key: Option<String>,
    settings: ClientSettings,
    transport: Option<Arc<dyn HttpTransport>>,
    env_lookup: Option<EnvLookup>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionBuilder")
            .field("api_key", &self.api_key.as_ref().map(|_| "**********"))
            .field("settings", &self.settings)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl ConnectionBuilder {
    /// Explicit key; takes precedence over the environment
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn maybe_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.settings.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.settings.max_retries = max_retries;
        self
    }

    /// Replace the HTTP transport
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the environment used for key fallback
    pub fn env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env_lookup = Some(Box::new(lookup));
        self
    }

    pub fn build(self) -> Result<Connection> {
        let api_key = match &self.env_lookup {
            Some(lookup) => resolve_api_key(self.api_key.as_deref(), |name| lookup(name)),
            None => resolve_from_env(self.api_key.as_deref()),
        }?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport(&self.settings)?,
        };

        Ok(Connection {
            api_key,
            settings: self.settings,
            transport,
        })
    }
}
