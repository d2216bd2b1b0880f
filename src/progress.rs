//! Progress line parsing
//!
//! The fetch tool prints human readable progress lines such as
//!
//! ```text
//! [download]  42.5% of ~10.2MiB at 1.1MiB/s ETA 00:08
//! ```
//!
//! [`parse_progress_line`] turns one such line into a [`ProgressEvent`]. Two shapes
//! are recognised, in order: the detailed form with size and speed, and a bare
//! percentage anywhere in the line. Everything else yields `None`.

use crate::types::ProgressEvent;
use regex::Regex;
use std::sync::LazyLock;

// "<pct>% of [~] <size><unit> at <speed><unit>/s"
static DETAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)%\s+of\s+~?\s*(\d+(?:\.\d+)?)([A-Za-z]+)\s+at\s+(\d+(?:\.\d+)?)([A-Za-z]+/s)")
        .unwrap_or_else(|e| panic!("detailed progress pattern is invalid: {e}"))
});

static BARE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)%")
        .unwrap_or_else(|e| panic!("bare progress pattern is invalid: {e}"))
});

/// Parse one line of tool output into a progress event
///
/// Pure and infallible: malformed or unrelated lines return `None`. Units are
/// passed through verbatim and the percentage is clamped into `[0, 100]`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let raw_text = line.trim();
    if raw_text.is_empty() {
        return None;
    }

    if let Some(caps) = DETAILED.captures(raw_text)
        && let (Some(pct), Some(size), Some(speed)) = (
            parse_number(caps.get(1)?.as_str()),
            parse_number(caps.get(2)?.as_str()),
            parse_number(caps.get(4)?.as_str()),
        )
    {
        return Some(ProgressEvent {
            percentage: clamp_percentage(pct),
            size_value: Some(size),
            size_unit: Some(caps.get(3)?.as_str().to_string()),
            speed_value: Some(speed),
            speed_unit: Some(caps.get(5)?.as_str().to_string()),
            raw_text: raw_text.to_string(),
        });
    }

    let caps = BARE.captures(raw_text)?;
    let pct = parse_number(caps.get(1)?.as_str())?;
    Some(ProgressEvent {
        percentage: clamp_percentage(pct),
        size_value: None,
        size_unit: None,
        speed_value: None,
        speed_unit: None,
        raw_text: raw_text.to_string(),
    })
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn clamp_percentage(value: f64) -> f32 {
    value.clamp(0.0, 100.0) as f32
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_line_with_approximate_size() {
        let event =
            parse_progress_line("[download]  42.5% of ~10.2MiB at 1.1MiB/s ETA 00:08").unwrap();
        assert_eq!(event.percentage, 42.5);
        assert_eq!(event.size_value, Some(10.2));
        assert_eq!(event.size_unit.as_deref(), Some("MiB"));
        assert_eq!(event.speed_value, Some(1.1));
        assert_eq!(event.speed_unit.as_deref(), Some("MiB/s"));
        assert_eq!(
            event.raw_text,
            "[download]  42.5% of ~10.2MiB at 1.1MiB/s ETA 00:08"
        );
        assert!(event.is_detailed());
    }

    #[test]
    fn detailed_line_with_exact_size_and_spacing() {
        let event = parse_progress_line("[download] 100% of   3.50GiB at  12.01KiB/s").unwrap();
        assert_eq!(event.percentage, 100.0);
        assert_eq!(event.size_value, Some(3.5));
        assert_eq!(event.size_unit.as_deref(), Some("GiB"));
        assert_eq!(event.speed_value, Some(12.01));
        assert_eq!(event.speed_unit.as_deref(), Some("KiB/s"));
    }

    #[test]
    fn unknown_speed_falls_back_to_bare_percentage() {
        let event =
            parse_progress_line("[download]   0.0% of 10.00MiB at Unknown speed ETA Unknown")
                .unwrap();
        assert_eq!(event.percentage, 0.0);
        assert!(!event.is_detailed());
        assert!(event.size_unit.is_none());
    }

    #[test]
    fn bare_percentage() {
        let event = parse_progress_line("  57%  ").unwrap();
        assert_eq!(event.percentage, 57.0);
        assert_eq!(event.raw_text, "57%");
        assert!(event.speed_value.is_none());
    }

    #[test]
    fn non_progress_lines_yield_none() {
        for line in [
            "[info] Downloading webpage",
            "",
            "   ",
            "[ExtractAudio] Destination: song.mp3",
            "% of nothing",
            "ERROR: unable to download",
        ] {
            assert!(parse_progress_line(line).is_none(), "line {line:?}");
        }
    }

    #[test]
    fn percentage_is_clamped() {
        let event = parse_progress_line("[download] 250.0% of 1.0MiB at 1.0MiB/s").unwrap();
        assert_eq!(event.percentage, 100.0);

        let event = parse_progress_line("999999%").unwrap();
        assert_eq!(event.percentage, 100.0);
    }

    #[test]
    fn parsing_is_idempotent() {
        let line = "[download]  12.3% of ~1.00GiB at 5.00MiB/s ETA 03:10";
        assert_eq!(parse_progress_line(line), parse_progress_line(line));
    }

    #[test]
    fn every_parsed_percentage_is_in_range() {
        let lines = [
            "0%",
            "0.1% of 1B at 1B/s",
            "[download]  99.9% of ~2.2KiB at 3.3KiB/s",
            "100.0%",
            "1e3%",
            "12345.678%",
        ];
        for line in lines {
            if let Some(event) = parse_progress_line(line) {
                assert!(
                    (0.0..=100.0).contains(&event.percentage),
                    "{line:?} -> {}",
                    event.percentage
                );
            }
        }
    }
}
