//! Amount extraction from free-text expense messages

use regex::Regex;
use std::sync::LazyLock;

/// Optional `$`, then a run of digits possibly broken by `.` or `,`.
/// The run starts and ends on a digit.
static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$?([0-9](?:[0-9.,]*[0-9])?)").expect("amount pattern is valid")
});

/// Extract the first monetary-looking number from `text`.
///
/// Separators are stripped, so `"$12.500"` becomes `"12500"`. Both `.` and
/// `,` are treated as group separators, which also folds a decimal like
/// `"12.50"` into `"1250"`. Returns `None` when the text has no digits.
pub fn extract_amount(text: &str) -> Option<String> {
    let caps = AMOUNT_RE.captures(text)?;
    let digits: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .collect();
    Some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_grouped_with_currency() {
        assert_eq!(extract_amount("Gasté $12.500 en comida").as_deref(), Some("12500"));
    }

    #[test]
    fn test_extract_plain_run() {
        assert_eq!(extract_amount("Café 3000").as_deref(), Some("3000"));
        assert_eq!(extract_amount("uber 15990 al centro").as_deref(), Some("15990"));
    }

    #[test]
    fn test_extract_comma_groups() {
        assert_eq!(extract_amount("arriendo $1,250,000").as_deref(), Some("1250000"));
    }

    #[test]
    fn test_extract_first_number_only() {
        assert_eq!(extract_amount("2 cafés por 4.000").as_deref(), Some("2"));
        assert_eq!(extract_amount("pan 1.200 y leche 990").as_deref(), Some("1200"));
    }

    #[test]
    fn test_extract_decimal_separator_is_stripped() {
        assert_eq!(extract_amount("12.50").as_deref(), Some("1250"));
        assert_eq!(extract_amount("1,250").as_deref(), Some("1250"));
    }

    #[test]
    fn test_extract_trailing_separator_dropped() {
        assert_eq!(extract_amount("gasté 4.000.").as_deref(), Some("4000"));
        assert_eq!(extract_amount("total: 3000, gracias").as_deref(), Some("3000"));
    }

    #[test]
    fn test_extract_no_digits() {
        assert_eq!(extract_amount("¿Cuánto debería ahorrar al mes?"), None);
        assert_eq!(extract_amount(""), None);
        assert_eq!(extract_amount("$"), None);
    }

    #[test]
    fn test_extract_never_negative() {
        assert_eq!(extract_amount("-500 de vuelto").as_deref(), Some("500"));
    }

    #[test]
    fn test_extract_ignores_non_ascii_digits() {
        assert_eq!(extract_amount("٣٠٠٠"), None);
    }
}
