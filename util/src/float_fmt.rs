//! Floating point text formatting
//!
//! Archive files are read by analysis scripts which expect C-style `%.*g`
//! output, so values are formatted the same way here.

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of significant digits which always round-trips an `f64`.
pub const ROUND_TRIP_DIGITS: usize = 17;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Format a value with the given number of significant digits, following the
/// rules of C's `%.{sig_digits}g`.
///
/// Fixed notation is used when the decimal exponent `x` (after rounding)
/// satisfies `-4 <= x < sig_digits`, otherwise scientific notation with at
/// least two exponent digits. Trailing zeros and a trailing decimal point are
/// removed in both cases.
pub fn fmt_sig(value: f64, sig_digits: usize) -> String {
    let precision = sig_digits.max(1);

    if value.is_nan() {
        return String::from("nan");
    }
    if value.is_infinite() {
        return String::from(if value > 0.0 { "inf" } else { "-inf" });
    }
    if value == 0.0 {
        return String::from(if value.is_sign_negative() { "-0" } else { "0" });
    }

    // Rust's scientific formatting rounds to the requested digits, which gives
    // the exponent that C uses to pick the notation.
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= precision as i32 {
        format!(
            "{}e{}{:02}",
            strip_trailing_zeros(mantissa),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        )
    } else {
        let decimals = (precision as i32 - 1 - exp) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

/// Format a value with enough digits to read back the exact same `f64`.
pub fn fmt_round_trip(value: f64) -> String {
    fmt_sig(value, ROUND_TRIP_DIGITS)
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn strip_trailing_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fmt_round_trip_matches_c() {
        assert_eq!(fmt_round_trip(0.05), "0.050000000000000003");
        assert_eq!(fmt_round_trip(0.1), "0.10000000000000001");
        assert_eq!(fmt_round_trip(1.0), "1");
        assert_eq!(fmt_round_trip(-2.5), "-2.5");
        assert_eq!(fmt_round_trip(123456.0), "123456");
        assert_eq!(fmt_round_trip(1e-5), "1.0000000000000001e-05");
        assert_eq!(fmt_round_trip(1e20), "1e+20");
        assert_eq!(fmt_round_trip(0.0), "0");
        assert_eq!(fmt_round_trip(std::f64::NAN), "nan");
    }

    #[test]
    fn test_fmt_sig_short() {
        assert_eq!(fmt_sig(3.14159, 3), "3.14");
        assert_eq!(fmt_sig(0.0001234, 2), "0.00012");
        assert_eq!(fmt_sig(99.99, 2), "1e+02");
    }

    #[test]
    fn test_round_trip_parses_back() {
        for v in &[0.1, 1.0 / 3.0, -1234.5678e-9, 90.00000000000001, 6.02214076e23] {
            let s = fmt_round_trip(*v);
            assert_eq!(s.parse::<f64>().unwrap(), *v, "{}", s);
        }
    }
}
