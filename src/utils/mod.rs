//! Utility functions for formatting
//!
//! Centralized display of money amounts and returns so that tables and
//! summaries agree on separators and precision.

use rust_decimal::{Decimal, RoundingStrategy};

/// Insert `,` every three digits of an unsigned integer string
fn group_thousands(integer_part: &str) -> String {
    let digits: Vec<char> = integer_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }
    grouped
}

/// Format a money amount with two decimals and thousands separators,
/// right-aligned to `width` (0 for no padding).
///
/// # Examples
/// ```
/// use wealthindex::utils::format_amount_with_width;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_amount_with_width(dec!(1234.5), 0), "1,234.50");
/// assert_eq!(format_amount_with_width(dec!(-3697.04), 12), "   -3,697.04");
/// ```
pub fn format_amount_with_width(value: Decimal, width: usize) -> String {
    let rounded = value
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let formatted = format!("{:.2}", rounded);
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    // "-0.00" reads as noise
    let sign = if value.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let result = format!("{}{}.{}", sign, group_thousands(integer_part), decimal_part);

    if width > 0 && result.len() < width {
        format!("{:>width$}", result, width = width)
    } else {
        result
    }
}

/// Format a money amount: "1,234.56"
pub fn format_amount(value: Decimal) -> String {
    format_amount_with_width(value, 0)
}

/// Format a fractional return as a percentage: `0.023` -> "2.30%"
///
/// # Examples
/// ```
/// use wealthindex::utils::format_percent;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(format_percent(dec!(0.023), 2), "2.30%");
/// assert_eq!(format_percent(dec!(-0.0713587), 4), "-7.1359%");
/// ```
pub fn format_percent(value: Decimal, decimals: u32) -> String {
    let pct = (value * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let pct = if pct.is_zero() { Decimal::ZERO } else { pct };
    format!("{:.*}%", decimals as usize, pct)
}
