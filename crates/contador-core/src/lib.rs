//! contador-core - expense extraction, ledger access and spend summaries
//!
//! This crate provides:
//! - Amount extraction from free-text messages
//! - Today / this-week window classification over ledger timestamps
//! - Summary aggregation and es-CL message formatting
//! - The Google Sheets ledger client and the OpenAI completion client
//! - The weekly digest body shared with the scheduler

pub mod clock;
pub mod digest;
pub mod extract;
pub mod format;
pub mod ledger;
pub mod providers;
pub mod summary;
pub mod testing;
pub mod types;
pub mod window;

// Re-export main types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use extract::extract_amount;
pub use format::{format_ack, format_amount, format_summary, format_today_warning};
pub use ledger::{LedgerError, LedgerStore, MemoryLedger, SheetsStore};
pub use providers::{LlmProvider, OpenAiProvider};
pub use summary::{fetch_summary, summarize};
pub use types::{
    ChannelType, IncomingMessage, LedgerRow, NewEntry, OutgoingMessage, Summary, Window,
};
