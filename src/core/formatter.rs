//! Fixed-format display strings for the progress table.

use crate::core::calculator::round_half_up;
use crate::core::models::Counters;

/// Shown for unknown rate and ETA values
pub const PLACEHOLDER: &str = "—";

const FILLED_BLOCK: char = '█';
const EMPTY_BLOCK: char = '░';
const ELLIPSIS: char = '…';
const COUNTER_SEPARATOR: &str = " | ";

/// `percentage` must already be capped at 100.
pub fn progress_bar(percentage: u8, width: usize) -> String {
    let filled = round_half_up(f64::from(percentage) / 100.0 * width as f64) as usize;
    let empty = width.saturating_sub(filled);

    let mut bar = String::with_capacity((filled + empty) * FILLED_BLOCK.len_utf8() + 2);
    bar.push('[');
    bar.extend(std::iter::repeat_n(FILLED_BLOCK, filled));
    bar.extend(std::iter::repeat_n(EMPTY_BLOCK, empty));
    bar.push(']');
    bar
}

pub fn eta(eta_ms: Option<f64>) -> String {
    let Some(eta_ms) = eta_ms else {
        return PLACEHOLDER.to_string();
    };

    let seconds = (eta_ms / 1000.0).floor() as i64;
    if seconds < 60 {
        return "<1m".to_string();
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m");
    }

    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;
    format!("{hours}h {remaining_minutes:02}m")
}

pub fn rate(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{}/min", round_half_up(rate) as i64),
        None => PLACEHOLDER.to_string(),
    }
}

/// Seconds are dropped once hours are shown.
pub fn elapsed(elapsed_ms: i64) -> String {
    let seconds = elapsed_ms.max(0) / 1000;
    if seconds < 60 {
        return format!("{seconds}s");
    }

    let minutes = seconds / 60;
    if minutes < 60 {
        let remaining_seconds = seconds % 60;
        return format!("{minutes}m {remaining_seconds}s");
    }

    let hours = minutes / 60;
    let remaining_minutes = minutes % 60;
    format!("{hours}h {remaining_minutes}m")
}

/// Groups thousands with `,` regardless of host locale.
pub fn number(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Cuts `text` to exactly `max_length` characters, the last one being an ellipsis.
pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    if max_length == 0 {
        return String::new();
    }

    let mut truncated: String = text.chars().take(max_length - 1).collect();
    truncated.push(ELLIPSIS);
    truncated
}

pub fn counters(counters: &Counters) -> String {
    counters
        .iter()
        .map(|(name, value)| format!("{name}: {}", number(value)))
        .collect::<Vec<_>>()
        .join(COUNTER_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bar_empty_and_full() {
        let bar = progress_bar(0, 20);
        assert_eq!(bar, "[░░░░░░░░░░░░░░░░░░░░]");
        assert_eq!(bar.chars().count(), 22);

        let bar = progress_bar(100, 20);
        assert_eq!(bar, "[████████████████████]");
        assert_eq!(bar.chars().count(), 22);
    }

    #[test]
    fn test_progress_bar_half() {
        let bar = progress_bar(50, 20);
        assert_eq!(bar, "[██████████░░░░░░░░░░]");
        assert_eq!(bar.chars().filter(|c| *c == '█').count(), 10);
        assert_eq!(bar.chars().filter(|c| *c == '░').count(), 10);
        assert_eq!(bar.chars().count(), 22);
    }

    #[test]
    fn test_progress_bar_quarters_and_widths() {
        assert_eq!(progress_bar(25, 20), "[█████░░░░░░░░░░░░░░░]");
        assert_eq!(progress_bar(75, 20), "[███████████████░░░░░]");
        assert_eq!(progress_bar(50, 10), "[█████░░░░░]");
        assert_eq!(progress_bar(50, 30).chars().count(), 32);
    }

    #[test]
    fn test_progress_bar_uncapped_percentage_does_not_panic() {
        let bar = progress_bar(150, 10);
        assert_eq!(bar.chars().filter(|c| *c == '█').count(), 15);
        assert_eq!(bar.chars().filter(|c| *c == '░').count(), 0);
    }

    #[test]
    fn test_eta_formats() {
        assert_eq!(eta(None), "—");
        assert_eq!(eta(Some(30_000.0)), "<1m");
        assert_eq!(eta(Some(59_999.0)), "<1m");
        assert_eq!(eta(Some(60_000.0)), "1m");
        assert_eq!(eta(Some(3_540_000.0)), "59m");
        assert_eq!(eta(Some(3_600_000.0)), "1h 00m");
        assert_eq!(eta(Some(3_660_000.0)), "1h 01m");
        assert_eq!(eta(Some(5_400_000.0)), "1h 30m");
        assert_eq!(eta(Some(86_400_000.0)), "24h 00m");
    }

    #[test]
    fn test_eta_floors_minutes() {
        assert_eq!(eta(Some(90_000.0)), "1m");
        assert_eq!(eta(Some(150_000.0)), "2m");
    }

    #[test]
    fn test_rate_rounding() {
        assert_eq!(rate(None), "—");
        assert_eq!(rate(Some(50.0)), "50/min");
        assert_eq!(rate(Some(50.5)), "51/min");
        assert_eq!(rate(Some(50.49)), "50/min");
        assert_eq!(rate(Some(123.7)), "124/min");
        assert_eq!(rate(Some(0.1)), "0/min");
        assert_eq!(rate(Some(0.6)), "1/min");
        assert_eq!(rate(Some(99_999.9)), "100000/min");
    }

    #[test]
    fn test_elapsed_formats() {
        assert_eq!(elapsed(0), "0s");
        assert_eq!(elapsed(59_000), "59s");
        assert_eq!(elapsed(60_000), "1m 0s");
        assert_eq!(elapsed(90_000), "1m 30s");
        assert_eq!(elapsed(119_000), "1m 59s");
        assert_eq!(elapsed(3_600_000), "1h 0m");
        assert_eq!(elapsed(3_601_000), "1h 0m");
        assert_eq!(elapsed(7_320_000), "2h 2m");
        assert_eq!(elapsed(86_400_000), "24h 0m");
    }

    #[test]
    fn test_number_grouping() {
        assert_eq!(number(0), "0");
        assert_eq!(number(999), "999");
        assert_eq!(number(1000), "1,000");
        assert_eq!(number(123_456), "123,456");
        assert_eq!(number(1_234_567), "1,234,567");
        assert_eq!(number(-1_234), "-1,234");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("this is a long string", 10), "this is a…");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("", 10), "");

        let result = truncate("this is a very long string", 15);
        assert_eq!(result.chars().count(), 15);
        assert_eq!(result, "this is a very…");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        assert_eq!(truncate("ééééé", 5), "ééééé");
        assert_eq!(truncate("éééééé", 5), "éééé…");
    }

    #[test]
    fn test_counters_summary() {
        let mut values = Counters::new();
        assert_eq!(counters(&values), "");

        values.add("errors", 1);
        values.add("warnings", 1500);
        assert_eq!(counters(&values), "errors: 1 | warnings: 1,500");
    }
}
