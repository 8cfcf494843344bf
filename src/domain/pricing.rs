//! Message pricing.
//!
//! A message is billed per started block of [`CHARS_PER_UNIT`] characters.
//! Characters are Unicode scalar values, so a CJK character counts as one
//! unit just like an ASCII letter.

use super::money::Money;

/// Number of characters covered by one billing unit.
pub const CHARS_PER_UNIT: usize = 60;

/// Price of one billing unit.
pub const UNIT_PRICE: Money = Money::from_cents(100);

pub fn char_count(content: &str) -> usize {
    content.chars().count()
}

/// Number of billing units for `content`; empty content is zero units.
pub fn billing_units(content: &str) -> u64 {
    char_count(content).div_ceil(CHARS_PER_UNIT) as u64
}

/// `ceil(char_count / 60) * UNIT_PRICE`. Empty content is free.
pub fn message_cost(content: &str) -> Money {
    UNIT_PRICE * billing_units(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_content_is_free() {
        assert_eq!(message_cost(""), Money::ZERO);
    }

    #[test]
    fn test_short_message_costs_one_unit() {
        assert_eq!(message_cost("hello").value(), dec!(1.00));
    }

    #[test]
    fn test_unit_boundaries() {
        let sixty = "a".repeat(60);
        let sixty_one = "a".repeat(61);
        assert_eq!(message_cost(&sixty), UNIT_PRICE);
        assert_eq!(message_cost(&sixty_one), UNIT_PRICE * 2);
        assert_eq!(message_cost(&"a".repeat(120)), UNIT_PRICE * 2);
        assert_eq!(message_cost(&"a".repeat(121)), UNIT_PRICE * 3);
    }

    #[test]
    fn test_multibyte_characters_count_once() {
        let content = "你好".repeat(30);
        assert_eq!(content.len(), 180);
        assert_eq!(char_count(&content), 60);
        assert_eq!(message_cost(&content), UNIT_PRICE);

        let emoji = "🙂".repeat(61);
        assert_eq!(message_cost(&emoji), UNIT_PRICE * 2);
    }
}
