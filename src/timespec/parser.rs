use tracing::warn;

use crate::timespec::units::{Millis, to_milliseconds};

/// Parses a compound duration such as `1h20m30s`, `1.5h` or `90`.
///
/// Scanning stops at the first position that does not start a number, so a
/// trailing suffix is ignored. A number that cannot be read yields zero for
/// the whole input; an unknown unit only contributes zero.
pub fn parse_duration(text: &str) -> Millis {
    let bytes = text.as_bytes();
    let mut total = Millis::ZERO;
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }

        let number_start = i;
        let mut seen_dot = false;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || (!seen_dot && bytes[i] == b'.')) {
            seen_dot |= bytes[i] == b'.';
            i += 1;
        }
        if number_start == i {
            break;
        }

        let Ok(value) = text[number_start..i].parse::<f64>() else {
            return Millis::ZERO;
        };
        if !value.is_finite() || value < 0.0 {
            return Millis::ZERO;
        }

        let unit_start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }
        let unit = &text[unit_start..i];

        match to_milliseconds(value, unit) {
            Ok(ms) => total = total.saturating_add(ms),
            Err(err) => warn!("{err} in '{text}'"),
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timespec::units::MAX_MS;

    #[test]
    fn parses_compound_expressions() {
        let cases = [
            ("1h20m30s", 4_830_000),
            ("1.5h", 5_400_000),
            ("90s", 90_000),
            ("1m30s", 90_000),
            ("90", 90_000),
            ("500ms", 500),
            ("2d 3h", 2 * 86_400_000 + 3 * 3_600_000),
            ("1w", 604_800_000),
            ("1mo", 2_592_000_000),
            ("1y", 31_536_000_000),
            ("  10 s ", 10_000),
            (".5m", 30_000),
            ("2.m", 120_000),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_duration(input), Millis::new(expected), "input {input:?}");
        }
    }

    #[test]
    fn equivalent_spellings_agree() {
        assert_eq!(parse_duration("90s"), parse_duration("1m30s"));
        assert_eq!(parse_duration("1.5h"), parse_duration("1h30m"));
    }

    #[test]
    fn empty_and_non_numeric_inputs_are_zero() {
        assert_eq!(parse_duration(""), Millis::ZERO);
        assert_eq!(parse_duration("   "), Millis::ZERO);
        assert_eq!(parse_duration("gong.wav"), Millis::ZERO);
        assert_eq!(parse_duration("/tmp/alarm.ogg"), Millis::ZERO);
    }

    #[test]
    fn trailing_suffix_is_not_consumed() {
        assert_eq!(parse_duration("5m-ignored"), Millis::new(300_000));
        assert_eq!(parse_duration("1h/2h"), Millis::new(3_600_000));
    }

    #[test]
    fn lone_decimal_point_fails_whole_parse() {
        assert_eq!(parse_duration("5m ."), Millis::ZERO);
    }

    #[test]
    fn second_decimal_point_ends_the_number() {
        // "1.2.3" reads 1.2s, then a fresh number .3s starts at the second dot.
        assert_eq!(parse_duration("1.2.3"), Millis::new(1_500));
    }

    #[test]
    fn unknown_units_contribute_nothing() {
        assert_eq!(parse_duration("5x"), Millis::ZERO);
        assert_eq!(parse_duration("1h5x30s"), Millis::new(3_630_000));
        assert_eq!(parse_duration("1.wav"), Millis::ZERO);
    }

    #[test]
    fn accumulation_saturates_at_ceiling() {
        let huge = "99999999999999y99999999999999y1s";
        assert_eq!(parse_duration(huge).get(), MAX_MS);
    }
}
