//! Messaging channels for contador
//!
//! Outbound pushes go through [`MessageChannel`] adapters; synchronous
//! webhook replies are rendered as TwiML.

pub mod channel;
pub mod digest;
pub mod twilio;
pub mod twiml;

// Re-export main types
pub use channel::MessageChannel;
pub use digest::run_weekly_digest;
pub use twilio::{ChannelError, TwilioChannel};
pub use twiml::message_response;
