//! Locale-aware number rendering for map labels.
//!
//! Currency follows the Italian convention the dataset is published in:
//! `.` groups thousands, `,` separates decimals, and the euro sign trails
//! the amount (`3.406 €`). Trailing fractional zeros are dropped, so the
//! precision argument is a maximum rather than a fixed width.

/// Placeholder for values that could not be computed.
pub const NOT_AVAILABLE: &str = "N/D";

/// Formats `value` as euros with at most `max_fraction_digits` decimals.
#[must_use]
pub fn format_currency(value: f64, max_fraction_digits: usize) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }

    let rounded = format!("{:.*}", max_fraction_digits, value.abs());
    let (integer, fraction) = rounded
        .split_once('.')
        .unwrap_or((rounded.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let sign = if value < 0.0 && !is_all_zero(&rounded) {
        "-"
    } else {
        ""
    };
    let grouped = group_thousands(integer, '.');

    if fraction.is_empty() {
        format!("{sign}{grouped} €")
    } else {
        format!("{sign}{grouped},{fraction} €")
    }
}

/// Formats a percentage with an explicit sign (`+5.21%`, `-0.40%`).
///
/// A value that rounds to zero is shown as positive.
#[must_use]
pub fn format_signed_percent(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return NOT_AVAILABLE.to_string();
    }

    let magnitude = format!("{:.*}", digits, value.abs());
    let sign = if value < 0.0 && !is_all_zero(&magnitude) {
        '-'
    } else {
        '+'
    };
    format!("{sign}{magnitude}%")
}

fn is_all_zero(digits: &str) -> bool {
    digits.chars().all(|c| c == '0' || c == '.')
}

fn group_thousands(integer: &str, separator: char) -> String {
    let len = integer.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(3406.0, 0), "3.406 €");
        assert_eq!(format_currency(1_234_567.0, 0), "1.234.567 €");
        assert_eq!(format_currency(950.0, 0), "950 €");
    }

    #[test]
    fn currency_rounds_and_trims_fraction() {
        assert_eq!(format_currency(12.75, 1), "12,8 €");
        assert_eq!(format_currency(12.0, 1), "12 €");
        assert_eq!(format_currency(8425.4, 0), "8.425 €");
    }

    #[test]
    fn negative_currency_keeps_sign_unless_rounded_to_zero() {
        assert_eq!(format_currency(-1500.0, 0), "-1.500 €");
        assert_eq!(format_currency(-0.2, 0), "0 €");
    }

    #[test]
    fn percent_has_explicit_sign() {
        assert_eq!(format_signed_percent(5.2134, 2), "+5.21%");
        assert_eq!(format_signed_percent(-0.4, 2), "-0.40%");
        assert_eq!(format_signed_percent(0.0, 1), "+0.0%");
        assert_eq!(format_signed_percent(-0.01, 1), "+0.0%");
    }

    #[test]
    fn non_finite_is_not_available() {
        assert_eq!(format_currency(f64::NAN, 0), NOT_AVAILABLE);
        assert_eq!(format_signed_percent(f64::INFINITY, 2), NOT_AVAILABLE);
    }
}
