//! Weekly digest push

use crate::channel::MessageChannel;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use contador_core::digest::weekly_digest_message;
use contador_core::ledger::LedgerStore;
use tracing::info;

/// Summarise the current week and push it to `recipient`
///
/// Failures are returned to the caller; nothing is retried.
pub async fn run_weekly_digest(
    store: &dyn LedgerStore,
    channel: &dyn MessageChannel,
    recipient: &str,
    now: NaiveDateTime,
) -> Result<()> {
    let msg = weekly_digest_message(store, recipient, now).await?;
    channel
        .send(msg)
        .await
        .with_context(|| format!("Failed to push weekly digest to {}", recipient))?;
    info!("Weekly digest pushed to {}", recipient);
    Ok(())
}
