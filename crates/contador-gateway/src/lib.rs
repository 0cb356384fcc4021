//! contador-gateway — webhook server for inbound messages
//!
//! Accepts the messaging provider's form-encoded webhook, records expenses
//! and answers each request with a single TwiML message.

pub mod server;
pub mod webhook;

pub use server::{GatewayServer, GatewayState, router};
pub use webhook::{ERROR_REPLY, HEALTH_TEXT, InboundForm, handle_inbound};
