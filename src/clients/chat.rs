use std::path::Path;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::{
    Client, Method, RequestBuilder, Response,
    multipart::{Form, Part},
};
use tracing::{debug, info};

use crate::{
    config::Config,
    models::chat::{
        LookupRequest, LookupResult, OutgoingMessage, PresenceRequest, PresenceState,
        SentMessage, TextMessageRequest,
    },
};

const USER_DOMAIN: &str = "@s.whatsapp.net";

/// Chat-channel capability shared by every component that talks to users.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn lookup(&self, recipient_id: &str) -> Result<LookupResult, Error>;

    async fn send(
        &self,
        resolved_id: &str,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, Error>;

    async fn presence_update(&self, state: PresenceState, recipient_id: &str)
    -> Result<(), Error>;
}

/// Bare phone numbers become user JIDs; anything with a domain is kept.
pub fn to_jid(recipient: &str) -> String {
    if recipient.contains('@') {
        recipient.to_string()
    } else {
        format!("{}{}", recipient, USER_DOMAIN)
    }
}

/// Client for the HTTP gateway that holds the chat session.
pub struct HttpChatChannel {
    http_client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpChatChannel {
    pub fn new(config: &Config) -> Result<Self, Error> {
        Self::with_base_url(&config.chat_gateway_url, config.chat_gateway_token.clone())
    }

    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self, Error> {
        let http_client = Client::builder()
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url = %base_url, "Chat gateway client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{}", self.base_url, path));

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn media_form(path: &Path, to: &str, caption: &str) -> Result<Form, Error> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read media file {}: {}", path.display(), e))?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());

        Ok(Form::new()
            .text("to", to.to_string())
            .text("caption", caption.to_string())
            .part("file", Part::bytes(bytes).file_name(file_name)))
    }
}

async fn ensure_success(response: Response, action: &str) -> Result<Response, Error> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("Chat gateway {} returned status {}: {}", action, status, body))
}

#[async_trait]
impl ChatChannel for HttpChatChannel {
    async fn lookup(&self, recipient_id: &str) -> Result<LookupResult, Error> {
        let jid = to_jid(recipient_id);

        let response = self
            .request(Method::POST, "/contacts/lookup")
            .json(&LookupRequest { jid: &jid })
            .send()
            .await?;

        let result: LookupResult = ensure_success(response, "lookup")
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse lookup response: {}", e))?;

        debug!(jid = %jid, exists = result.exists, "Recipient lookup completed");

        Ok(result)
    }

    async fn send(
        &self,
        resolved_id: &str,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, Error> {
        let to = to_jid(resolved_id);

        let request = match message {
            OutgoingMessage::Text { text } => self
                .request(Method::POST, "/messages")
                .json(&TextMessageRequest { to: &to, text }),
            OutgoingMessage::Media { path, caption } => self
                .request(Method::POST, "/messages/media")
                .multipart(Self::media_form(path, &to, caption).await?),
        };

        let sent: SentMessage = ensure_success(request.send().await?, "send")
            .await?
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse send response: {}", e))?;

        debug!(to = %to, message_id = %sent.message_id, "Chat message sent");

        Ok(sent)
    }

    async fn presence_update(
        &self,
        state: PresenceState,
        recipient_id: &str,
    ) -> Result<(), Error> {
        let to = to_jid(recipient_id);

        let response = self
            .request(Method::POST, "/presence")
            .json(&PresenceRequest { to: &to, state })
            .send()
            .await?;

        ensure_success(response, "presence update").await?;

        Ok(())
    }
}
