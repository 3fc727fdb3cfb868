//! Display Formatters
//!
//! Pure functions turning raw prices, changes and timestamps into display
//! strings. Missing or non-finite inputs render as `--`.

use chrono::{DateTime, Utc};

/// Placeholder for values that cannot be shown.
pub const PLACEHOLDER: &str = "--";

/// Direction of a price change, used to pick a display style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceChangeClass {
    /// Change above zero.
    Positive,
    /// Change below zero.
    Negative,
    /// Zero or unknown change.
    Neutral,
}

impl PriceChangeClass {
    /// Style class name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for PriceChangeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a price with two decimals and thousands grouping.
///
/// `1234.5` renders as `1,234.50`.
#[must_use]
pub fn format_price(price: f64) -> String {
    if !price.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let (negative, body) = grouped_two_decimals(price);
    if negative {
        format!("-{body}")
    } else {
        body
    }
}

/// Format an optional price, rendering `None` as the placeholder.
#[must_use]
pub fn format_optional_price(price: Option<f64>) -> String {
    price.map_or_else(|| PLACEHOLDER.to_string(), format_price)
}

/// Format a price change with an explicit sign.
///
/// The sign follows the unrounded input, so `0.0` renders as `+0.00` and
/// `-0.001` as `-0.00`.
#[must_use]
pub fn format_change(value: f64) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    let (_, body) = grouped_two_decimals(value);
    if value.is_sign_negative() {
        format!("-{body}")
    } else {
        format!("+{body}")
    }
}

/// Format a percent change with an explicit sign, e.g. `+5.25%`.
///
/// `value` is already in percent units, so `5.25` means five and a quarter
/// percent.
#[must_use]
pub fn format_percentage(value: f64) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    format!("{}%", format_change(value))
}

/// Classify a change value.
#[must_use]
pub fn price_change_class(value: f64) -> PriceChangeClass {
    if value > 0.0 {
        PriceChangeClass::Positive
    } else if value < 0.0 {
        PriceChangeClass::Negative
    } else {
        // zero and NaN
        PriceChangeClass::Neutral
    }
}

/// Describe how long ago `updated` happened relative to `now`.
///
/// `Never` without a timestamp, `Just now` under ten seconds, then
/// seconds, minutes and hours, and finally the calendar date as `M/D/YYYY`.
#[must_use]
pub fn format_last_updated(updated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(updated) = updated else {
        return "Never".to_string();
    };

    let seconds = (now - updated).num_seconds();
    if seconds < 10 {
        return "Just now".to_string();
    }
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    updated.format("%-m/%-d/%Y").to_string()
}

/// Round to two decimals and group the integer part by thousands.
///
/// Returns whether the rounded value is negative, and the unsigned body.
fn grouped_two_decimals(value: f64) -> (bool, String) {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let is_zero = int_part.bytes().all(|b| b == b'0') && frac_part.bytes().all(|b| b == b'0');
    let negative = value.is_sign_negative() && !is_zero;
    (negative, format!("{grouped}.{frac_part}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use test_case::test_case;

    #[test_case(123.4, "123.40" ; "pads to two decimals")]
    #[test_case(0.0, "0.00" ; "zero")]
    #[test_case(1234.5, "1,234.50" ; "groups thousands")]
    #[test_case(1_234_567.891, "1,234,567.89" ; "groups millions")]
    #[test_case(-987.654, "-987.65" ; "negative")]
    #[test_case(150.226, "150.23" ; "rounds")]
    fn price(input: f64, expected: &str) {
        assert_eq!(format_price(input), expected);
    }

    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "infinity")]
    #[test_case(f64::NEG_INFINITY ; "negative infinity")]
    fn non_finite_renders_placeholder(input: f64) {
        assert_eq!(format_price(input), "--");
        assert_eq!(format_change(input), "--");
        assert_eq!(format_percentage(input), "--");
    }

    #[test]
    fn optional_price() {
        assert_eq!(format_optional_price(None), "--");
        assert_eq!(format_optional_price(Some(2.0)), "2.00");
    }

    #[test_case(-4.56, "-4.56" ; "negative")]
    #[test_case(4.56, "+4.56" ; "positive")]
    #[test_case(0.0, "+0.00" ; "zero is signed positive")]
    #[test_case(-0.001, "-0.00" ; "negative rounding to zero keeps its sign")]
    #[test_case(0.001, "+0.00" ; "positive rounding to zero")]
    #[test_case(1500.0, "+1,500.00" ; "grouped")]
    fn change(input: f64, expected: &str) {
        assert_eq!(format_change(input), expected);
    }

    #[test_case(5.25, "+5.25%" ; "positive")]
    #[test_case(-1.5, "-1.50%" ; "negative")]
    #[test_case(0.0, "+0.00%" ; "zero")]
    #[test_case(-0.004, "-0.00%" ; "small negative")]
    fn percentage(input: f64, expected: &str) {
        assert_eq!(format_percentage(input), expected);
    }

    #[test_case(0.0, PriceChangeClass::Neutral ; "zero")]
    #[test_case(0.01, PriceChangeClass::Positive ; "positive")]
    #[test_case(-3.0, PriceChangeClass::Negative ; "negative")]
    #[test_case(f64::NAN, PriceChangeClass::Neutral ; "nan")]
    fn change_class(input: f64, expected: PriceChangeClass) {
        assert_eq!(price_change_class(input), expected);
    }

    #[test]
    fn change_class_names() {
        assert_eq!(price_change_class(0.0).as_str(), "neutral");
        assert_eq!(PriceChangeClass::Positive.to_string(), "positive");
    }

    #[test_case(0, "Just now" ; "immediate")]
    #[test_case(9, "Just now" ; "under ten seconds")]
    #[test_case(42, "42s ago" ; "seconds")]
    #[test_case(125, "2m ago" ; "minutes")]
    #[test_case(3 * 3600 + 59, "3h ago" ; "hours")]
    fn last_updated_relative(seconds_ago: i64, expected: &str) {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let updated = now - Duration::seconds(seconds_ago);
        assert_eq!(format_last_updated(Some(updated), now), expected);
    }

    #[test]
    fn last_updated_never() {
        assert_eq!(format_last_updated(None, Utc::now()), "Never");
    }

    #[test]
    fn last_updated_old_shows_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2024, 3, 7, 8, 30, 0).unwrap();
        assert_eq!(format_last_updated(Some(updated), now), "3/7/2024");
    }

    #[test]
    fn last_updated_in_future_is_just_now() {
        let now = Utc::now();
        assert_eq!(
            format_last_updated(Some(now + Duration::seconds(30)), now),
            "Just now"
        );
    }
}
