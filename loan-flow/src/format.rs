//! Rupee formatting for chat messages.

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// `250000` -> `₹250,000`
pub fn inr(amount: u64) -> String {
    format!("₹{}", group_thousands(&amount.to_string()))
}

/// `8884.876` -> `₹8,884.88`
pub fn inr_decimal(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}₹{}.{fraction}", group_thousands(whole))
}

/// Compact Indian units: `₹1.20 Crore`, `₹2.50 Lakh`, `₹50.00K`.
pub fn humanize(amount: u64) -> String {
    let value = amount as f64;
    if amount >= 10_000_000 {
        format!("₹{:.2} Crore", value / 10_000_000.0)
    } else if amount >= 100_000 {
        format!("₹{:.2} Lakh", value / 100_000.0)
    } else if amount >= 1_000 {
        format!("₹{:.2}K", value / 1_000.0)
    } else {
        inr(amount)
    }
}
