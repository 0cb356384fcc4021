//! Inbound message webhook

use anyhow::{Result, anyhow};
use axum::extract::{Form, FromRequest, Json, Request, State};
use axum::http::header;
use axum::response::IntoResponse;
use contador_channels::twiml::{TWIML_CONTENT_TYPE, message_response};
use contador_core::extract::extract_amount;
use contador_core::format::{format_ack, format_today_warning};
use contador_core::providers;
use contador_core::summary::fetch_summary;
use contador_core::types::{ChannelType, IncomingMessage, NewEntry, Window};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::server::GatewayState;

/// Reply sent whenever handling a message fails
pub const ERROR_REPLY: &str = "❌ Ocurrió un error procesando tu mensaje.";

/// Plain-text body of the health endpoint
pub const HEALTH_TEXT: &str = "🤖 Contador personal activo y escuchando.";

/// Fields posted by the messaging provider, as a urlencoded form or a JSON
/// object. Missing fields are empty.
#[derive(Debug, Default, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

/// Decode the inbound body, JSON when declared as such and a form otherwise
pub async fn read_inbound(request: Request) -> Result<InboundForm> {
    if is_json(&request) {
        let Json(form) = Json::<InboundForm>::from_request(request, &())
            .await
            .map_err(|e| anyhow!("unreadable JSON body: {}", e.body_text()))?;
        return Ok(form);
    }
    let Form(form) = Form::<InboundForm>::from_request(request, &())
        .await
        .map_err(|e| anyhow!("unreadable form body: {}", e.body_text()))?;
    Ok(form)
}

/// Compute the reply text for one inbound message.
///
/// With an amount the message is appended to the ledger, then today's
/// summary decides between the acknowledgment and the overspend warning.
/// Without one the message is relayed to the completion provider.
pub async fn handle_inbound(state: &GatewayState, msg: &IncomingMessage) -> Result<String> {
    let Some(amount) = extract_amount(&msg.content) else {
        debug!("No amount in message from {}, asking the assistant", msg.sender);
        return providers::ask(state.assistant.as_ref(), &state.system_prompt, &msg.content).await;
    };

    state
        .ledger
        .append(&NewEntry {
            timestamp: msg.received_at,
            raw_message: msg.content.clone(),
            amount: amount.clone(),
        })
        .await?;
    info!("Recorded expense of {} from {}", amount, msg.sender);

    let today = fetch_summary(state.ledger.as_ref(), Window::Today, state.clock.now()).await?;
    if today.total > state.daily_threshold {
        info!(
            "Daily total {} is over the {} threshold",
            today.total, state.daily_threshold
        );
        Ok(format_today_warning(&today))
    } else {
        Ok(format_ack(&amount))
    }
}

/// `POST /webhook`. Always answers 200 with exactly one TwiML message,
/// even when the body cannot be decoded.
pub async fn webhook_handler(
    State(state): State<GatewayState>,
    request: Request,
) -> impl IntoResponse {
    let request_id = uuid::Uuid::new_v4();

    let reply = match read_inbound(request).await {
        Ok(form) => {
            let msg = IncomingMessage {
                channel: ChannelType::from_address(&form.from),
                sender: form.from,
                content: form.body,
                received_at: state.clock.now(),
            };
            debug!("[{}] Inbound {} message from {}", request_id, msg.channel, msg.sender);

            match handle_inbound(&state, &msg).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("[{}] Failed to handle message from {}: {:#}", request_id, msg.sender, e);
                    ERROR_REPLY.to_string()
                }
            }
        }
        Err(e) => {
            warn!("[{}] Rejected webhook body: {:#}", request_id, e);
            ERROR_REPLY.to_string()
        }
    };

    (
        [(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)],
        message_response(&reply),
    )
}

/// `GET /`
pub async fn health_handler() -> &'static str {
    HEALTH_TEXT
}
