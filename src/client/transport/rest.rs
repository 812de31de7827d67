//! REST Adapter
//!
//! `reqwest`-backed implementation of [`RestTransport`]. The bearer token
//! from [`Config`] is attached to every request when present.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::RestTransport;
use crate::client::config::Config;
use crate::client::error::TransportError;
use crate::shared::messaging::{
    ApiEnvelope, Conversation, ConversationFilter, Message, MessagePage, SendMessageRequest,
};

const MESSAGES_API: [&str; 2] = ["api", "messages"];

/// HTTP client for the messaging endpoints
#[derive(Debug, Clone)]
pub struct HttpRestClient {
    config: Config,
    client: Client,
}

impl HttpRestClient {
    pub fn new(config: Config) -> Result<Self, TransportError> {
        let client = build_http_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn messages_endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut path: Vec<&str> = MESSAGES_API.to_vec();
        path.extend_from_slice(segments);
        endpoint(&self.config, &path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.config.get_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl RestTransport for HttpRestClient {
    async fn fetch_conversations(
        &self,
        filter: ConversationFilter,
    ) -> Result<Vec<Conversation>, TransportError> {
        let url = self.messages_endpoint(&["conversations"])?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("filter", filter.as_str())])
            .send()
            .await?;
        let envelope: ApiEnvelope<Vec<Conversation>> = read_envelope(response).await?;
        tracing::debug!("[REST] fetched {} conversations (filter={})", envelope.data.len(), filter);
        Ok(envelope.data)
    }

    async fn fetch_conversation(&self, conversation_id: &str) -> Result<Conversation, TransportError> {
        let url = self.messages_endpoint(&["conversations", conversation_id])?;
        let response = self.authorized(self.client.get(url)).send().await?;
        let envelope: ApiEnvelope<Conversation> = read_envelope(response).await?;
        Ok(envelope.data)
    }

    async fn fetch_page(
        &self,
        conversation_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<MessagePage, TransportError> {
        let url = self.messages_endpoint(&["conversations", conversation_id, "messages"])?;
        let response = self
            .authorized(self.client.get(url))
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;
        let envelope: ApiEnvelope<Vec<Message>> = read_envelope(response).await?;

        // Without a pagination block, a full page is the only hint that more exist.
        let has_more = envelope
            .pagination
            .map(|p| p.has_more)
            .unwrap_or(envelope.data.len() as u32 >= limit);
        tracing::debug!(
            "[REST] conversation={} page={} -> {} messages, has_more={}",
            conversation_id,
            page,
            envelope.data.len(),
            has_more
        );
        Ok(MessagePage {
            messages: envelope.data,
            has_more,
        })
    }

    async fn post_message(
        &self,
        conversation_id: &str,
        text: &str,
        contact_name: Option<&str>,
    ) -> Result<Message, TransportError> {
        let url = self.messages_endpoint(&["send"])?;
        let body = SendMessageRequest {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
            contact_name: contact_name.map(str::to_string),
        };
        let response = self.authorized(self.client.post(url)).json(&body).send().await?;
        let envelope: ApiEnvelope<Message> = read_envelope(response).await?;
        Ok(envelope.data)
    }

    async fn mark_read(&self, conversation_id: &str) -> Result<(), TransportError> {
        let url = self.messages_endpoint(&["conversations", conversation_id, "read"])?;
        let response = self.authorized(self.client.put(url)).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

pub(crate) fn build_http_client(config: &Config) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| TransportError::Network(format!("Failed to build HTTP client: {}", e)))
}

/// Join path segments onto the server URL, percent-encoding each one
pub(crate) fn endpoint(config: &Config, segments: &[&str]) -> Result<Url, TransportError> {
    let mut url = Url::parse(config.server_url())
        .map_err(|e| TransportError::Network(format!("invalid server URL: {}", e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TransportError::Network("server URL cannot be a base".to_string()))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

pub(crate) async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| status.to_string());
    tracing::warn!("[REST] {} {}", status, body);
    Err(TransportError::status(status.as_u16(), body))
}

pub(crate) async fn read_envelope<T: DeserializeOwned>(
    response: Response,
) -> Result<ApiEnvelope<T>, TransportError> {
    let response = check_status(response).await?;
    let code = response.status().as_u16();
    let body: Value = response
        .json()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))?;

    // An unsuccessful envelope usually carries no usable `data`
    if body.get("success").and_then(Value::as_bool) == Some(false) {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("request unsuccessful");
        tracing::warn!("[REST] {} unsuccessful: {}", code, message);
        return Err(TransportError::status(code, message));
    }
    serde_json::from_value(body).map_err(|e| TransportError::Decode(e.to_string()))
}
