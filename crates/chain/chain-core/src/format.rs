use chain_events::Strike;

/// Live bid/ask/last are always shown with two decimals.
pub fn format_price(price: f64) -> String {
    format!("{price:.2}")
}

/// Strike label: no decimals when the fractional part is under 0.1,
/// one decimal otherwise.
pub fn format_strike(strike: Strike) -> String {
    if strike.frac_hundredths() < 10 {
        strike.whole().to_string()
    } else {
        format!("{:.1}", strike.as_f64())
    }
}

/// Centers `text` in a `width` wide cell, padding both sides with spaces.
/// Text wider than the cell is cut to `width`.
pub fn center_in(text: &str, width: usize) -> String {
    let text: String = text.chars().take(width).collect();
    let len = text.chars().count();
    let left = (width - len) / 2;
    let right = width - len - left;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(right))
}
