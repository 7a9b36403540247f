/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 25/10/25
******************************************************************************/

//! Configuration for a TLCP client session.
//!
//! This module provides a simple way to configure all aspects of a session
//! with sensible defaults.

use std::time::Duration;

/// The public Lightstreamer demo server.
pub const DEFAULT_SERVER_URL: &str = "https://push.lightstreamer.com/lightstreamer";

/// The well-known opaque client identifier sent as `LS_cid` when the
/// application does not supply its own.
pub const DEFAULT_CID: &str = "mgQkwtwdysogQz2BJ4Ji%20kOj2Bg";

const DEFAULT_BIND_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for a [`ClientSession`](crate::client::ClientSession).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base server URL, without the endpoint suffix.
    pub server_url: String,
    /// Adapter set to bind the session to. There is no default.
    pub adapter_set: Option<String>,
    /// Client identifier sent as `LS_cid`.
    pub cid: String,
    /// Content-length hint sent as `LS_content_length`. Influences how much
    /// data the server sends before cycling the connection with a LOOP; the
    /// client copes with rebinds regardless of the value.
    pub content_length: Option<u64>,
    /// How long [`connect`](crate::client::ClientSession::connect) waits for
    /// the session to become bound.
    pub bind_timeout: Duration,
    /// HTTP client used for every request.
    pub http_client: reqwest::Client,
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            adapter_set: None,
            cid: DEFAULT_CID.to_string(),
            content_length: None,
            bind_timeout: DEFAULT_BIND_TIMEOUT,
            http_client: reqwest::Client::new(),
        }
    }

    /// Sets the server base URL.
    #[must_use]
    pub fn server_url(mut self, server_url: impl Into<String>) -> Self {
        self.server_url = server_url.into();
        self
    }

    /// Sets the adapter set name.
    #[must_use]
    pub fn adapter_set(mut self, adapter_set: impl Into<String>) -> Self {
        self.adapter_set = Some(adapter_set.into());
        self
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn cid(mut self, cid: impl Into<String>) -> Self {
        self.cid = cid.into();
        self
    }

    /// Sets the content-length hint.
    #[must_use]
    pub fn content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Sets the bind timeout.
    #[must_use]
    pub fn bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    /// Sets the HTTP client to interact with the server.
    #[must_use]
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = client;
        self
    }

    /// The login form posted to `create_session`.
    pub(crate) fn session_form(&self) -> Vec<(&'static str, String)> {
        let mut form = vec![("LS_cid", self.cid.clone())];
        if let Some(adapter_set) = &self.adapter_set {
            form.push(("LS_adapter_set", adapter_set.clone()));
        }
        if let Some(length) = self.content_length {
            form.push(("LS_content_length", length.to_string()));
        }
        form
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_builder() {
        let config = ClientConfig::new()
            .server_url("http://localhost:8080/lightstreamer")
            .adapter_set("DEMO")
            .cid("myCID")
            .content_length(50_000_000)
            .bind_timeout(Duration::from_secs(2));

        assert_eq!(config.server_url, "http://localhost:8080/lightstreamer");
        assert_eq!(config.adapter_set, Some("DEMO".to_string()));
        assert_eq!(config.cid, "myCID");
        assert_eq!(config.content_length, Some(50_000_000));
        assert_eq!(config.bind_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.server_url, DEFAULT_SERVER_URL);
        assert_eq!(config.cid, DEFAULT_CID);
        assert_eq!(config.adapter_set, None);
        assert_eq!(config.content_length, None);
        assert_eq!(config.bind_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_session_form() {
        let form = ClientConfig::new()
            .adapter_set("ISSLIVE")
            .cid("cid")
            .content_length(1024)
            .session_form();
        assert_eq!(
            form,
            vec![
                ("LS_cid", "cid".to_string()),
                ("LS_adapter_set", "ISSLIVE".to_string()),
                ("LS_content_length", "1024".to_string()),
            ]
        );
    }

    #[test]
    fn test_session_form_minimal() {
        let form = ClientConfig::new().cid("cid").session_form();
        assert_eq!(form, vec![("LS_cid", "cid".to_string())]);
    }
}
