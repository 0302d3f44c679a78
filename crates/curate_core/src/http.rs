//! Remote Item Service over the Curate REST API.
//!
//! Routes: `GET|POST /api/items/{parent}` and `PUT|DELETE /api/item/{id}`.

use crate::config::Config;
use crate::error::RemoteError;
use crate::models::{CreateItemRequest, ItemId, ParentId, Payload, RemoteItem, UpdateItemRequest};
use crate::remote::RemoteItemService;
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;

/// reqwest-backed client for a running `curate-server`.
#[derive(Debug, Clone)]
pub struct HttpItemService {
    client: Client,
    base: Url,
}

impl HttpItemService {
    /// Build a client for `server` with a per-request `timeout`.
    ///
    /// # Errors
    /// [`RemoteError::Rejected`] when the URL cannot be used as an API base or the
    /// client cannot be constructed.
    pub fn new(server: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base = Url::parse(server.trim()).map_err(|err| {
            RemoteError::Rejected(format!("Invalid server URL '{}': {}", server, err))
        })?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::Rejected(format!(
                "Server URL '{}' cannot be used as an API base",
                server
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Rejected(format!("failed to build HTTP client: {}", err)))?;
        Ok(Self { client, base })
    }

    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        Self::new(&config.server_url, config.request_timeout())
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Append percent-encoded `segments` to the base URL, keeping any base path.
    pub fn api_url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                RemoteError::Rejected("Server URL cannot be used as an API base".to_string())
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, RemoteError> {
        let res = request.send().await.map_err(transport_error)?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => format!("failed to read error response body: {}", err),
        };
        Err(status_error(status, &error_message_for_response(status, &body)))
    }
}

/// Extract the `{"error": ...}` message from a failed response body.
pub fn error_message_for_response(status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return value
            .get("error")
            .and_then(|v| v.as_str())
            .unwrap_or(body)
            .to_string();
    }

    body.to_string()
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() || err.is_request() {
        RemoteError::Unavailable(err.to_string())
    } else if err.is_decode() {
        RemoteError::Malformed(err.to_string())
    } else {
        RemoteError::Rejected(err.to_string())
    }
}

fn status_error(status: StatusCode, message: &str) -> RemoteError {
    match status {
        StatusCode::NOT_FOUND => RemoteError::NotFound(message.to_string()),
        StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::BAD_GATEWAY
        | StatusCode::GATEWAY_TIMEOUT => {
            RemoteError::Unavailable(format!("{}: {}", status, message))
        }
        _ => RemoteError::Rejected(format!("{}: {}", status, message)),
    }
}

#[async_trait]
impl<P: Payload> RemoteItemService<P> for HttpItemService {
    async fn list_items(&self, parent_id: &ParentId) -> Result<Value, RemoteError> {
        let url = self.api_url(&["api", "items", parent_id.as_str()])?;
        let res = self.send(self.client.get(url)).await?;
        res.json::<Value>().await.map_err(|err| RemoteError::Malformed(err.to_string()))
    }

    async fn create_item(
        &self,
        parent_id: &ParentId,
        payload: &P,
        position: usize,
    ) -> Result<RemoteItem<P>, RemoteError> {
        let url = self.api_url(&["api", "items", parent_id.as_str()])?;
        let body = CreateItemRequest {
            payload,
            position: Some(position),
        };
        let res = self.send(self.client.post(url).json(&body)).await?;
        res.json::<RemoteItem<P>>()
            .await
            .map_err(|err| RemoteError::Malformed(err.to_string()))
    }

    async fn update_item(
        &self,
        id: &ItemId,
        position: usize,
        payload: &P,
    ) -> Result<(), RemoteError> {
        let url = self.api_url(&["api", "item", id.as_str()])?;
        let body = UpdateItemRequest {
            position: Some(position),
            payload: Some(payload),
        };
        self.send(self.client.put(url).json(&body)).await?;
        Ok(())
    }

    async fn delete_item(&self, id: &ItemId) -> Result<(), RemoteError> {
        let url = self.api_url(&["api", "item", id.as_str()])?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_PORT;

    fn service(base: &str) -> HttpItemService {
        HttpItemService::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn api_url_encodes_path_segments() {
        let url = service(&format!("http://127.0.0.1:{}", DEFAULT_PORT))
            .api_url(&["api", "item", "id/with?reserved#chars"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            format!(
                "http://127.0.0.1:{}/api/item/id%2Fwith%3Freserved%23chars",
                DEFAULT_PORT
            )
        );
    }

    #[test]
    fn api_url_appends_segments_to_existing_base_path() {
        let url = service(&format!("http://127.0.0.1:{}/base/", DEFAULT_PORT))
            .api_url(&["api", "items", "court-1"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            format!("http://127.0.0.1:{}/base/api/items/court-1", DEFAULT_PORT)
        );
    }

    #[test]
    fn invalid_server_urls_are_rejected() {
        for server in ["not a url", "mailto:someone@example.com"] {
            assert!(matches!(
                HttpItemService::new(server, Duration::from_secs(1)),
                Err(RemoteError::Rejected(_))
            ));
        }
    }

    #[test]
    fn error_message_prefers_json_error_field() {
        let message =
            error_message_for_response(StatusCode::NOT_FOUND, r#"{"error":"Item not found"}"#);
        assert_eq!(message, "Item not found");
        assert_eq!(
            error_message_for_response(StatusCode::BAD_REQUEST, "   "),
            "Bad Request"
        );
    }

    #[test]
    fn status_codes_map_to_remote_errors() {
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "gone"),
            RemoteError::NotFound(_)
        ));
        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "down").is_unavailable());
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad"),
            RemoteError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn refused_connection_is_unavailable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let service = service(&format!("http://{}", addr));
        let err = RemoteItemService::<serde_json::Value>::list_items(
            &service,
            &ParentId::new("court-1"),
        )
        .await
        .unwrap_err();
        assert!(err.is_unavailable(), "unexpected error: {err}");
    }
}
