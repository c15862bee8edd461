//! Rupee amounts in words, Indian numbering (crore / lakh / thousand)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

const ONES: [&str; 20] = [
    "Zero",
    "One",
    "Two",
    "Three",
    "Four",
    "Five",
    "Six",
    "Seven",
    "Eight",
    "Nine",
    "Ten",
    "Eleven",
    "Twelve",
    "Thirteen",
    "Fourteen",
    "Fifteen",
    "Sixteen",
    "Seventeen",
    "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn below_hundred(n: u64) -> String {
    if n < 20 {
        ONES[n as usize].to_string()
    } else if n % 10 == 0 {
        TENS[(n / 10) as usize].to_string()
    } else {
        format!("{} {}", TENS[(n / 10) as usize], ONES[(n % 10) as usize])
    }
}

fn below_thousand(n: u64) -> String {
    match (n / 100, n % 100) {
        (0, rest) => below_hundred(rest),
        (h, 0) => format!("{} Hundred", ONES[h as usize]),
        (h, rest) => format!("{} Hundred {}", ONES[h as usize], below_hundred(rest)),
    }
}

/// Whole number in words using Indian grouping
pub fn number_in_words(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut parts = Vec::new();
    let crore = n / 10_000_000;
    let rest = n % 10_000_000;

    if crore > 0 {
        parts.push(format!("{} Crore", number_in_words(crore)));
    }

    let lakh = rest / 100_000;
    let thousand = (rest % 100_000) / 1_000;
    let hundreds = rest % 1_000;

    if lakh > 0 {
        parts.push(format!("{} Lakh", below_hundred(lakh)));
    }
    if thousand > 0 {
        parts.push(format!("{} Thousand", below_hundred(thousand)));
    }
    if hundreds > 0 {
        parts.push(below_thousand(hundreds));
    }

    parts.join(" ")
}

/// Format an amount as `Rupees <words> [and <words> Paise] Only`
///
/// Negative amounts are formatted by magnitude.
pub fn amount_in_words(amount: Decimal) -> String {
    let amount = amount
        .abs()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let rupees = amount.trunc().to_u64().unwrap_or(0);
    let paise = ((amount - amount.trunc()) * Decimal::from(100))
        .to_u64()
        .unwrap_or(0);

    if paise == 0 {
        format!("Rupees {} Only", number_in_words(rupees))
    } else {
        format!(
            "Rupees {} and {} Paise Only",
            number_in_words(rupees),
            below_hundred(paise)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_small_numbers() {
        assert_eq!(number_in_words(0), "Zero");
        assert_eq!(number_in_words(7), "Seven");
        assert_eq!(number_in_words(19), "Nineteen");
        assert_eq!(number_in_words(40), "Forty");
        assert_eq!(number_in_words(945), "Nine Hundred Forty Five");
    }

    #[test]
    fn test_indian_grouping() {
        assert_eq!(number_in_words(1_000), "One Thousand");
        assert_eq!(
            number_in_words(1_23_456),
            "One Lakh Twenty Three Thousand Four Hundred Fifty Six"
        );
        assert_eq!(
            number_in_words(2_50_00_000),
            "Two Crore Fifty Lakh"
        );
        assert_eq!(
            number_in_words(1_05_00_00_000),
            "One Hundred Five Crore"
        );
    }

    #[test]
    fn test_amount_in_words() {
        assert_eq!(amount_in_words(Decimal::from(945)), "Rupees Nine Hundred Forty Five Only");
        assert_eq!(
            amount_in_words(Decimal::from_str("1200.50").unwrap()),
            "Rupees One Thousand Two Hundred and Fifty Paise Only"
        );
        assert_eq!(amount_in_words(Decimal::ZERO), "Rupees Zero Only");
    }
}
