//! Reply and digest message formatting (es-CL conventions)

use crate::types::{Summary, Window};

/// Format a number the es-CL way: `.` groups thousands, `,` marks decimals,
/// at most three fraction digits.
pub fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let scaled = (value.abs() * 1000.0).round() as u128;
    let integer = (scaled / 1000).to_string();
    let fraction = format!("{:03}", scaled % 1000);
    let fraction = fraction.trim_end_matches('0');

    let mut out = String::new();
    if value < 0.0 && scaled != 0 {
        out.push('-');
    }
    out.push_str(&group_thousands(&integer));
    if !fraction.is_empty() {
        out.push(',');
        out.push_str(fraction);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

/// Header line with the total, then one bullet per category
pub fn format_summary(summary: &Summary, period: &str) -> String {
    let mut msg = format!(
        "📊 Resumen de la {}:\nTotal: ${}",
        period,
        format_amount(summary.total)
    );
    for (category, amount) in &summary.categories {
        msg.push_str(&format!("\n• {}: ${}", category, format_amount(*amount)));
    }
    msg
}

/// Reply sent when today's spend crosses the warning threshold
pub fn format_today_warning(summary: &Summary) -> String {
    format!(
        "⚠️ Hoy llevas gastado ${}\n{}",
        format_amount(summary.total),
        format_summary(summary, Window::Today.label())
    )
}

/// Short acknowledgment carrying the extracted amount as typed
pub fn format_ack(amount: &str) -> String {
    format!("✅ Gasto registrado: ${}", amount)
}
