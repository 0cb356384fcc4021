//! Weekly spend digest

use anyhow::Result;
use chrono::NaiveDateTime;
use tracing::info;

use crate::format::format_summary;
use crate::ledger::LedgerStore;
use crate::summary::fetch_summary;
use crate::types::{ChannelType, OutgoingMessage, Window};

/// Summary of the current week, formatted for pushing
pub async fn weekly_digest(store: &dyn LedgerStore, now: NaiveDateTime) -> Result<String> {
    let summary = fetch_summary(store, Window::ThisWeek, now).await?;
    info!(
        "Weekly digest: total {} over {} categories",
        summary.total,
        summary.categories.len()
    );
    Ok(format_summary(&summary, Window::ThisWeek.label()))
}

/// The digest addressed to `recipient`
pub async fn weekly_digest_message(
    store: &dyn LedgerStore,
    recipient: &str,
    now: NaiveDateTime,
) -> Result<OutgoingMessage> {
    Ok(OutgoingMessage {
        to: recipient.to_string(),
        content: weekly_digest(store, now).await?,
        channel: ChannelType::from_address(recipient),
    })
}
