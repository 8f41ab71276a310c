//! Year-prefix equivalence between two- and four-digit notations.
//!
//! Reference systems and source systems do not agree on whether a
//! sequence such as `24/001` carries a short or a long year, so every
//! value is expanded to both spellings before it is stored or looked up.

/// Returns `value` plus its alternate year-prefix spelling, if any.
///
/// - `NN/...` also yields `20NN/...`
/// - `20NN/...` also yields `NN/...`
///
/// The two prefixes are mutually exclusive, so at most two distinct
/// values are returned. Order carries no meaning.
#[must_use]
pub fn year_variants(value: &str) -> Vec<String> {
    let mut variants = Vec::with_capacity(2);
    variants.push(value.to_string());

    let bytes = value.as_bytes();
    if bytes.len() >= 3 && bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() && bytes[2] == b'/' {
        variants.push(format!("20{value}"));
    }

    if bytes.len() >= 5
        && value.starts_with("20")
        && bytes[2].is_ascii_digit()
        && bytes[3].is_ascii_digit()
        && bytes[4] == b'/'
    {
        // Prefix is ASCII, so byte offset 2 is a char boundary.
        variants.push(value[2..].to_string());
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[test]
    fn short_year_gains_long_form() {
        assert_eq!(sorted(year_variants("24/001")), vec!["2024/001", "24/001"]);
    }

    #[test]
    fn long_year_gains_short_form() {
        assert_eq!(sorted(year_variants("2024/001")), vec!["2024/001", "24/001"]);
    }

    #[test]
    fn short_twenty_expands_once() {
        assert_eq!(sorted(year_variants("20/5")), vec!["2020/5", "20/5"]);
    }

    #[test]
    fn unrelated_values_are_untouched() {
        assert_eq!(year_variants("abc"), vec!["abc"]);
        assert_eq!(year_variants("2/001"), vec!["2/001"]);
        assert_eq!(year_variants("1924/001"), vec!["1924/001"]);
        assert_eq!(year_variants("24-001"), vec!["24-001"]);
        assert_eq!(year_variants(""), vec![""]);
    }

    #[test]
    fn non_ascii_digits_do_not_expand() {
        assert_eq!(year_variants("٢٤/001"), vec!["٢٤/001"]);
    }

    #[test]
    fn different_sequence_is_not_equivalent() {
        let variants = year_variants("2024/001");
        assert!(!variants.iter().any(|v| v == "24/002"));
    }
}
