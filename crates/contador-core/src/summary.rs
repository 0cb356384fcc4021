//! Folding ledger rows into spend summaries

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::ledger::LedgerStore;
use crate::types::{DEFAULT_CATEGORY, LedgerRow, Summary, Window};
use crate::window::parse_timestamp;

/// Leading float literal, the way a lenient float parse reads it
static FLOAT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?")
        .expect("float pattern is valid")
});

/// Parse an amount cell. Anything unparseable counts as 0.
pub fn parse_amount(cell: &str) -> f64 {
    FLOAT_PREFIX_RE
        .find(cell.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Normalize a category cell: lowercased, `"otro"` when blank
pub fn normalize_category(cell: Option<&str>) -> String {
    match cell.map(str::trim) {
        Some(c) if !c.is_empty() => c.to_lowercase(),
        _ => DEFAULT_CATEGORY.to_string(),
    }
}

/// Convert the raw sheet range into ledger rows, skipping the header row.
///
/// Columns are date, message, amount, category; anything past that is ignored.
pub fn ledger_rows(values: &[Vec<String>]) -> Vec<LedgerRow> {
    values
        .iter()
        .skip(1)
        .map(|row| {
            let cell = |i: usize| row.get(i).map(String::as_str);
            LedgerRow {
                timestamp: cell(0).and_then(parse_timestamp),
                raw_message: cell(1).unwrap_or_default().to_string(),
                amount: cell(2).map(parse_amount).unwrap_or(0.0),
                category: normalize_category(cell(3)),
            }
        })
        .collect()
}

/// Total and per-category spend of the rows that fall inside `window`
pub fn summarize(rows: &[LedgerRow], window: Window, now: NaiveDateTime) -> Summary {
    let mut summary = Summary::default();
    for row in rows {
        let Some(ts) = row.timestamp else {
            continue;
        };
        if window.contains(ts, now) {
            summary.add(&row.category, row.amount);
        }
    }
    summary
}

/// Read the whole ledger and summarize it for `window`
pub async fn fetch_summary(
    store: &dyn LedgerStore,
    window: Window,
    now: NaiveDateTime,
) -> Result<Summary> {
    let values = store
        .read_all()
        .await
        .context("Failed to read ledger rows")?;
    let rows = ledger_rows(&values);
    let summary = summarize(&rows, window, now);
    debug!(
        "Summary for {}: {} rows read, total {} across {} categories",
        window,
        rows.len(),
        summary.total,
        summary.categories.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        let mut values = vec![vec![
            "Fecha".to_string(),
            "Mensaje".to_string(),
            "Monto".to_string(),
            "Categoría".to_string(),
        ]];
        values.extend(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect::<Vec<_>>()),
        );
        values
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("3000"), 3000.0);
        assert_eq!(parse_amount(" 12.5abc"), 12.5);
        assert_eq!(parse_amount("$3000"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("1e3"), 1000.0);
    }

    #[test]
    fn test_normalize_category() {
        assert_eq!(normalize_category(Some("Comida")), "comida");
        assert_eq!(normalize_category(Some("  ")), "otro");
        assert_eq!(normalize_category(None), "otro");
    }

    #[test]
    fn test_ledger_rows_skips_header_and_defaults() {
        let values = sheet(&[
            &["2026-10-21 09:00:00", "Café 3000", "3000"],
            &["2026-10-21 13:00:00", "Almuerzo", "abc", "Comida", "x"],
        ]);
        let rows = ledger_rows(&values);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, "otro");
        assert_eq!(rows[0].amount, 3000.0);
        assert_eq!(rows[0].timestamp, Some(at(21, 9)));
        assert_eq!(rows[1].category, "comida");
        assert_eq!(rows[1].amount, 0.0);
    }

    #[test]
    fn test_ledger_rows_empty_sheet() {
        assert!(ledger_rows(&[]).is_empty());
        assert!(ledger_rows(&sheet(&[])).is_empty());
    }

    #[test]
    fn test_summarize_today() {
        let values = sheet(&[
            &["2026-10-21 09:00:00", "", "3000", "Comida"],
            &["2026-10-20 09:00:00", "", "9999", "Comida"],
            &["2026-10-21 10:00:00", "", "1500", "Transporte"],
            &["2026-10-21 11:00:00", "", "2000", "comida"],
        ]);
        let summary = summarize(&ledger_rows(&values), Window::Today, at(21, 12));
        assert_eq!(summary.total, 6500.0);
        assert_eq!(
            summary.categories,
            vec![
                ("comida".to_string(), 5000.0),
                ("transporte".to_string(), 1500.0)
            ]
        );
    }

    #[test]
    fn test_summarize_week() {
        // 2026-10-21 is a Wednesday; the week starts Sunday the 18th at 12:00
        let values = sheet(&[
            &["2026-10-18 13:00:00", "", "1000"],
            &["2026-10-18 11:00:00", "", "4000"],
            &["2026-10-13 12:00:00", "", "8000"],
            &["2026-10-21 11:59:00", "", "500", "Ocio"],
        ]);
        let summary = summarize(&ledger_rows(&values), Window::ThisWeek, at(21, 12));
        assert_eq!(summary.total, 1500.0);
        assert_eq!(summary.category("otro"), Some(1000.0));
        assert_eq!(summary.category("ocio"), Some(500.0));
    }

    #[test]
    fn test_summarize_unparseable_amount_counts_zero() {
        let values = sheet(&[
            &["2026-10-21 09:00:00", "", "n/a", "Comida"],
            &["2026-10-21 09:30:00", "", "700", "Comida"],
        ]);
        let summary = summarize(&ledger_rows(&values), Window::Today, at(21, 12));
        assert_eq!(summary.total, 700.0);
        assert_eq!(summary.category("comida"), Some(700.0));
    }

    #[test]
    fn test_summarize_skips_undated_rows() {
        let values = sheet(&[&["ayer", "", "700"], &["", "", "100"]]);
        let summary = summarize(&ledger_rows(&values), Window::ThisWeek, at(21, 12));
        assert!(summary.is_empty());
        assert_eq!(summary.total, 0.0);
    }

    #[test]
    fn test_total_equals_sum_of_categories() {
        let values = sheet(&[
            &["2026-10-21 08:00:00", "", "1200", "Comida"],
            &["2026-10-20 08:00:00", "", "3400", "Transporte"],
            &["2026-10-19 08:00:00", "", "560"],
            &["2026-10-19 09:00:00", "", "12.5", "Comida"],
        ]);
        let rows = ledger_rows(&values);
        for window in [Window::Today, Window::ThisWeek] {
            let summary = summarize(&rows, window, at(21, 12));
            let sum: f64 = summary.categories.iter().map(|(_, v)| v).sum();
            assert_eq!(summary.total, sum);
        }
    }

    #[tokio::test]
    async fn test_fetch_summary_reads_store() {
        let store = MemoryLedger::with_rows(sheet(&[
            &["2026-10-21 09:00:00", "Café 3000", "3000"],
        ]));
        let summary = fetch_summary(&store, Window::Today, at(21, 12)).await.unwrap();
        assert_eq!(summary.total, 3000.0);
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_summary_store_failure() {
        let store = MemoryLedger::failing();
        assert!(fetch_summary(&store, Window::Today, at(21, 12)).await.is_err());
    }
}
