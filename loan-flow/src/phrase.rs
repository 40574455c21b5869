//! Free-text interpretation used by the stage tasks.
//!
//! The flow only depends on the [`PhraseInterpreter`] trait; the keyword
//! interpreter here is the default and holds every parsing heuristic.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum YesNo {
    Affirmative,
    Negative,
    Ambiguous,
}

pub trait PhraseInterpreter: Send + Sync {
    /// Rupee amount, or `None` when no positive amount can be read
    fn parse_amount(&self, text: &str) -> Option<u64>;

    /// Tenure in months, or `None` when no positive duration can be read
    fn parse_tenure(&self, text: &str) -> Option<u32>;

    fn classify_yesno(&self, text: &str) -> YesNo;

    /// Digits only, trimmed to the last ten when longer
    fn normalize_phone(&self, text: &str) -> String;
}

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("phrase pattern is valid")
}

static CRORE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d+(?:\.\d+)?)\s*(?:crores?|cr)\b"));
static LAKH: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d+(?:\.\d+)?)\s*(?:lakhs?|lacs?|l)\b"));
static THOUSAND: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d+(?:\.\d+)?)\s*(?:thousand|k)\b"));
static DIGITS: LazyLock<Regex> = LazyLock::new(|| pattern(r"\d+"));

static YEARS: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d+)\s*(?:years?|yrs?)\b"));
static MONTHS: LazyLock<Regex> = LazyLock::new(|| pattern(r"(\d+)\s*(?:months?|mon|mo|m)\b"));
static BARE_NUMBER: LazyLock<Regex> = LazyLock::new(|| pattern(r"\b(\d+)\b"));
static FRACTION: LazyLock<Regex> = LazyLock::new(|| pattern(r"\d+\.\d+"));

static AFFIRMATIVE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"\b(?:yes|yeah|yep|sure|ok|okay|correct|right|proceed|continue|go ahead|fine|alright)\b")
});
static NEGATIVE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"\b(?:no|nope|nah|not|cancel|stop|dont|don't)\b"));

/// Regex and keyword based interpreter
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordInterpreter;

impl KeywordInterpreter {
    pub fn new() -> Self {
        Self
    }
}

fn scaled(re: &Regex, text: &str, multiplier: f64) -> Option<Option<u64>> {
    let captures = re.captures(text)?;
    let value: f64 = captures[1].parse().ok()?;
    let amount = (value * multiplier).round();
    Some((amount >= 1.0 && amount < u64::MAX as f64).then_some(amount as u64))
}

impl PhraseInterpreter for KeywordInterpreter {
    fn parse_amount(&self, text: &str) -> Option<u64> {
        let text = text.to_lowercase().replace(',', "");
        let text = text.trim();

        for (re, multiplier) in [
            (&*CRORE, 10_000_000.0),
            (&*LAKH, 100_000.0),
            (&*THOUSAND, 1_000.0),
        ] {
            if let Some(amount) = scaled(re, text, multiplier) {
                return amount;
            }
        }

        DIGITS
            .find(text)
            .and_then(|digits| digits.as_str().parse::<u64>().ok())
            .filter(|amount| *amount > 0)
    }

    fn parse_tenure(&self, text: &str) -> Option<u32> {
        let text = text.to_lowercase();
        let text = text.trim();

        // Tenures are whole years or months; "2.5 years" must not read as 5
        if FRACTION.is_match(text) {
            return None;
        }

        if let Some(captures) = YEARS.captures(text) {
            let years: u32 = captures[1].parse().ok()?;
            return years.checked_mul(12).filter(|months| *months > 0);
        }

        if let Some(captures) = MONTHS.captures(text) {
            return captures[1].parse().ok().filter(|months: &u32| *months > 0);
        }

        let number: u32 = BARE_NUMBER.captures(text)?[1].parse().ok()?;
        match number {
            1..=5 => Some(number * 12),
            12..=60 => Some(number),
            _ => None,
        }
    }

    fn classify_yesno(&self, text: &str) -> YesNo {
        let text = text.to_lowercase();
        match (AFFIRMATIVE.is_match(&text), NEGATIVE.is_match(&text)) {
            (true, false) => YesNo::Affirmative,
            (false, true) => YesNo::Negative,
            _ => YesNo::Ambiguous,
        }
    }

    fn normalize_phone(&self, text: &str) -> String {
        let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() > 10 {
            digits[digits.len() - 10..].to_string()
        } else {
            digits
        }
    }
}
