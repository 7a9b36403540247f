use crate::utils::Error;
use reqwest::{Client, Response, StatusCode};

/// Protocol version pinned in the query string of every request. Servers
/// receiving any other value reject with HTTP 400.
pub(crate) const PROTOCOL_VERSION: &str = "TLCP-2.1.0";

/// Issues the three TLCP endpoint requests against one server.
///
/// All endpoints are POSTed with a form-encoded body. `create_session` and
/// `bind_session` return a streaming response the caller keeps open;
/// `control` returns its single-line reply buffered and trimmed.
#[derive(Debug, Clone)]
pub(crate) struct HttpCaller {
    client: Client,
    server_url: String,
}

impl HttpCaller {
    pub(crate) fn new(client: Client, server_url: impl Into<String>) -> Self {
        Self {
            client,
            server_url: server_url.into(),
        }
    }

    /// Opens a new session stream.
    pub(crate) async fn create_session(
        &self,
        form: &[(&str, String)],
    ) -> Result<Response, Error> {
        self.call("create_session", form).await
    }

    /// Opens a continuation stream for an existing session.
    pub(crate) async fn bind_session(&self, session_id: &str) -> Result<Response, Error> {
        self.call("bind_session", &[("LS_session", session_id.to_string())])
            .await
    }

    /// Sends a control request and returns the reply line with trailing
    /// CR/LF removed.
    pub(crate) async fn control(&self, form: &[(&str, String)]) -> Result<String, Error> {
        let response = self.call("control", form).await?;
        let body = response.text().await?;
        Ok(body.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn call(&self, endpoint: &str, form: &[(&str, String)]) -> Result<Response, Error> {
        let url = format!(
            "{}/{endpoint}.txt?LS_protocol={PROTOCOL_VERSION}",
            self.server_url
        );
        let response = self.client.post(url).form(&form).send().await?;
        if response.status() != StatusCode::OK {
            return Err(status_error(response).await);
        }
        Ok(response)
    }
}

/// Maps a non-OK response to an error: the body content when the server
/// sent a diagnostic, the bare status otherwise.
async fn status_error(response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim_end_matches(['\r', '\n']);
    if body.is_empty() {
        Error::Http(status)
    } else {
        Error::Server(body.to_string())
    }
}
