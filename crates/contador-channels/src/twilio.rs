//! Twilio Messaging REST adapter (SMS and WhatsApp)

use crate::channel::MessageChannel;
use anyhow::{Context, Result};
use async_trait::async_trait;
use contador_core::types::{ChannelType, OutgoingMessage};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Twilio credentials are not configured")]
    MissingCredentials,
    #[error("Twilio rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Pushes messages through `POST /2010-04-01/Accounts/{sid}/Messages.json`
pub struct TwilioChannel {
    client: Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    base_url: String,
}

impl std::fmt::Debug for TwilioChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioChannel")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
    status: Option<String>,
}

impl TwilioChannel {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Result<Self> {
        Self::with_base_url(
            account_sid,
            auth_token,
            from_number,
            DEFAULT_TWILIO_BASE_URL.to_string(),
        )
    }

    pub fn with_base_url(
        account_sid: String,
        auth_token: String,
        from_number: String,
        base_url: String,
    ) -> Result<Self> {
        if account_sid.trim().is_empty() || auth_token.trim().is_empty() {
            return Err(ChannelError::MissingCredentials.into());
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client for Twilio")?;

        Ok(Self {
            client,
            account_sid,
            auth_token,
            from_number,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }

    fn form_fields<'a>(&'a self, msg: &'a OutgoingMessage) -> [(&'static str, &'a str); 3] {
        [
            ("From", self.from_number.as_str()),
            ("To", msg.to.as_str()),
            ("Body", msg.content.as_str()),
        ]
    }
}

#[async_trait]
impl MessageChannel for TwilioChannel {
    async fn send(&self, msg: OutgoingMessage) -> Result<()> {
        debug!("Pushing {} message to {}", msg.channel, msg.to);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form_fields(&msg))
            .send()
            .await
            .context("Failed to send request to Twilio")?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ChannelError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let resource: MessageResource = response
            .json()
            .await
            .context("Failed to parse Twilio message resource")?;
        info!(
            "Twilio accepted message {} ({})",
            resource.sid.as_deref().unwrap_or("?"),
            resource.status.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::from_address(&self.from_number)
    }
}
