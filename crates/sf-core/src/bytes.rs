//! Byte counts as human-readable strings.

const UNITS: [&str; 7] = ["bytes", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Render a byte count with binary units and one decimal place.
///
/// Values below 1 KiB are rendered as a plain count (`"512 bytes"`).
pub fn bytes_to_human(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    // 1023.96 KiB would print as "1024.0 KiB"
    if (value * 10.0).round() / 10.0 >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", value, UNITS[unit])
}
