use std::time::Duration;

use anyhow::{bail, Result};

/// Suffix to milliseconds multiplier (order matters: longer suffixes first)
const UNITS: &[(&str, f64)] = &[
    ("ms", 1.0),
    ("s", 1_000.0),
    ("m", 60_000.0),
    ("h", 3_600_000.0),
];

/// Parse poll intervals like "30", "30s", "2m", "500ms", "1.5h".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();

    if let Ok(secs) = s.parse::<f64>() {
        return from_millis(s, secs * 1_000.0);
    }

    for (suffix, multiplier) in UNITS {
        if let Some(val_str) = s.strip_suffix(suffix) {
            let val: f64 = val_str.trim().parse()?;
            return from_millis(s, val * multiplier);
        }
    }

    bail!("Unknown duration format: {}", s)
}

fn from_millis(s: &str, millis: f64) -> Result<Duration> {
    if !millis.is_finite() || millis <= 0.0 {
        bail!("Duration must be positive: {}", s);
    }
    let rounded = millis.round() as u64;
    if rounded == 0 {
        bail!("Duration must be at least 1ms: {}", s);
    }
    Ok(Duration::from_millis(rounded))
}

/// Format a duration for display
pub fn format_duration(d: Duration) -> String {
    let millis = d.as_millis();
    if millis < 1_000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        format!("{:.0}s", d.as_secs_f64())
    } else if millis < 3_600_000 {
        format!("{}m{:02}s", d.as_secs() / 60, d.as_secs() % 60)
    } else {
        format!("{}h{:02}m", d.as_secs() / 3_600, (d.as_secs() % 3_600) / 60)
    }
}
