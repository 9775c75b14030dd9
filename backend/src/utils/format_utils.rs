use once_cell::sync::Lazy;
use regex::Regex;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").expect("valid regex"));
static AREA_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{2})([0-9])").expect("valid regex"));
static LINE_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([0-9])([0-9]{4})$").expect("valid regex"));
static FULL_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{2})([0-9]{5})([0-9]{4})").expect("valid regex"));

/// Brazilian mobile mask, applied progressively while typing:
/// `"119"` -> `"(11) 9"`, `"11999998888"` -> `"(11) 99999-8888"`.
/// Only ASCII digits count; anything past 11 of them is dropped. Output only depends on the digits,
/// so formatting an already formatted value is a no-op.
pub fn format_phone_number(value: &str) -> String {
    let digits = NON_DIGIT.replace_all(value, "");
    if digits.len() <= 11 {
        let with_area = AREA_CODE.replace(&digits, "($1) $2");
        return LINE_SUFFIX.replace(&with_area, "$1-$2").into_owned();
    }
    FULL_NUMBER.replace(&digits[..11], "($1) $2-$3").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_number() {
        assert_eq!(format_phone_number("11999998888"), "(11) 99999-8888");
    }

    #[test]
    fn test_progressive_mask() {
        assert_eq!(format_phone_number(""), "");
        assert_eq!(format_phone_number("1"), "1");
        assert_eq!(format_phone_number("11"), "11");
        assert_eq!(format_phone_number("119"), "(11) 9");
        assert_eq!(format_phone_number("119999"), "(11) 9999");
        assert_eq!(format_phone_number("1199999"), "(11) 9-9999");
        assert_eq!(format_phone_number("1133334444"), "(11) 3333-4444");
    }

    #[test]
    fn test_strips_non_digits() {
        assert_eq!(format_phone_number("+55 (11) 99999-8888"), "(55) 11999-9988");
        assert_eq!(format_phone_number("(11) 9abc"), "(11) 9");
    }

    #[test]
    fn test_truncates_past_eleven_digits() {
        assert_eq!(format_phone_number("119999988887777"), "(11) 99999-8888");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "", "1", "12", "119", "1199", "11999", "1199999", "119999988", "11999998888",
            "119999988887", "+55 11 9 9999 8888", "abc", "(11) 9", "tel: 11-99999-8888 ramal 2",
        ];
        for input in inputs {
            let once = format_phone_number(input);
            assert_eq!(format_phone_number(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn test_ignores_non_ascii_digits() {
        assert_eq!(format_phone_number("١٢٣٤٥٦"), "");
        assert_eq!(format_phone_number("١١٩"), "");
        assert_eq!(format_phone_number("11٩9"), "(11) 9");
        assert_eq!(format_phone_number("١١٩٩٩٩٩٨٨٨٨11999998888"), "(11) 99999-8888");
    }

    #[test]
    fn test_never_more_than_eleven_digits() {
        let formatted = format_phone_number("1234567890123456789");
        assert_eq!(formatted.chars().filter(|c| c.is_ascii_digit()).count(), 11);
    }
}
