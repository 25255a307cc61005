//! Utility functions and helpers

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept for money and percentage outputs
pub const DISPLAY_SCALE: u32 = 2;

/// Format a decimal with thousands separators, keeping its fraction
pub fn format_number(n: Decimal) -> String {
    let s = n.abs().to_string();
    let (int_part, frac_part) = match s.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (s.as_str(), None),
    };

    let mut result = String::new();
    let mut count = 0;
    for c in int_part.chars().rev() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(c);
        count += 1;
    }
    let mut formatted: String = result.chars().rev().collect();

    if let Some(frac_part) = frac_part {
        formatted.push('.');
        formatted.push_str(frac_part);
    }
    if n.is_sign_negative() && !n.is_zero() {
        formatted.insert(0, '-');
    }
    formatted
}

/// Round half away from zero to `DISPLAY_SCALE` places
pub fn round_display(n: Decimal) -> Decimal {
    n.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `part / total`, or `None` when `total` is zero or the quotient does not fit
pub fn ratio(part: Decimal, total: Decimal) -> Option<Decimal> {
    if total.is_zero() {
        None
    } else {
        part.checked_div(total)
    }
}

/// `part` as a percentage of `total`, or `None` when `total` is zero
/// or the percentage does not fit
pub fn percentage(part: Decimal, total: Decimal) -> Option<Decimal> {
    ratio(part, total)?.checked_mul(Decimal::ONE_HUNDRED)
}

/// Arithmetic mean, or `None` for an empty slice or a sum that does not fit
pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let sum = values.iter().try_fold(Decimal::ZERO, |sum, value| sum.checked_add(*value))?;
    ratio(sum, Decimal::from(values.len()))
}
