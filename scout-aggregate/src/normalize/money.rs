//! Monetary amount display normalisation.

/// Suffix appended to every normalised amount (Korean won).
pub const CURRENCY_SUFFIX: &str = "원";

/// Normalise an amount string for display.
///
/// `"12,345,000"` and `"12345000.0"` both become `"12,345,000원"`.
/// Values that do not parse as a number, or are too large to render
/// exactly, are passed through trimmed; blank input yields `None`.
pub fn normalize_amount(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let digits: String = trimmed
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    match digits.parse::<f64>() {
        Ok(n) if n.is_finite() && n.abs() < i64::MAX as f64 => {
            Some(format!("{}{CURRENCY_SUFFIX}", group_thousands(n.trunc() as i64)))
        }
        _ => Some(trimmed.to_owned()),
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
