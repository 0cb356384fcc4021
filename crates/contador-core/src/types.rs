//! Shared types for contador-core

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Category assigned to rows whose category cell is empty
pub const DEFAULT_CATEGORY: &str = "otro";

/// One expense as read back from the ledger sheet
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    /// `None` when the date cell could not be parsed; such rows match no window
    pub timestamp: Option<NaiveDateTime>,
    pub raw_message: String,
    pub amount: f64,
    pub category: String,
}

/// A row to append to the ledger. Category is left for the sheet owner to fill in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub timestamp: NaiveDateTime,
    pub raw_message: String,
    pub amount: String,
}

/// Spend totals for one window
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total: f64,
    /// Per-category subtotals in first-seen order
    pub categories: Vec<(String, f64)>,
}

impl Summary {
    /// Add an amount to the total and to its category bucket
    pub fn add(&mut self, category: &str, amount: f64) {
        self.total += amount;
        match self.categories.iter_mut().find(|(name, _)| name == category) {
            Some((_, subtotal)) => *subtotal += amount,
            None => self.categories.push((category.to_string(), amount)),
        }
    }

    /// Subtotal for a category, if any row fell into it
    pub fn category(&self, name: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, amount)| *amount)
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Date range a summary is computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    Today,
    ThisWeek,
}

impl Window {
    /// Period label used in summary headers
    pub fn label(&self) -> &'static str {
        match self {
            Self::Today => "día",
            Self::ThisWeek => "semana",
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Today => write!(f, "today"),
            Self::ThisWeek => write!(f, "this_week"),
        }
    }
}

/// Message received from the messaging provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub sender: String,
    pub content: String,
    pub channel: ChannelType,
    pub received_at: NaiveDateTime,
}

/// Message pushed to a recipient outside of a webhook reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub to: String,
    pub content: String,
    pub channel: ChannelType,
}

/// Transport a phone address belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Sms,
    WhatsApp,
}

impl ChannelType {
    /// Classify a provider address such as `+56912345678` or `whatsapp:+56912345678`
    pub fn from_address(address: &str) -> Self {
        if address.trim().to_lowercase().starts_with("whatsapp:") {
            Self::WhatsApp
        } else {
            Self::Sms
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sms => write!(f, "sms"),
            Self::WhatsApp => write!(f, "whatsapp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_add_keeps_first_seen_order() {
        let mut summary = Summary::default();
        summary.add("transporte", 500.0);
        summary.add("comida", 1000.0);
        summary.add("transporte", 250.0);

        assert_eq!(summary.total, 1750.0);
        assert_eq!(
            summary.categories,
            vec![("transporte".to_string(), 750.0), ("comida".to_string(), 1000.0)]
        );
        assert_eq!(summary.category("comida"), Some(1000.0));
        assert_eq!(summary.category("ocio"), None);
    }

    #[test]
    fn test_window_labels() {
        assert_eq!(Window::Today.label(), "día");
        assert_eq!(Window::ThisWeek.label(), "semana");
        assert_eq!(Window::ThisWeek.to_string(), "this_week");
    }

    #[test]
    fn test_channel_type_from_address() {
        assert_eq!(ChannelType::from_address("whatsapp:+56912345678"), ChannelType::WhatsApp);
        assert_eq!(ChannelType::from_address("WhatsApp:+1555"), ChannelType::WhatsApp);
        assert_eq!(ChannelType::from_address("+56912345678"), ChannelType::Sms);
        assert_eq!(ChannelType::from_address(""), ChannelType::Sms);
    }
}
