// SPDX-License-Identifier: GPL-3.0-only

//! Common formatting helpers shared across models

use num_format::{Locale, ToFormattedString};

const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut val = *bytes as f64;
    let mut step = 0;

    // u64 tops out in the EB range, so the units list is never exhausted.
    while val > 1024. && step < UNITS.len() - 1 {
        val /= 1024.;
        step += 1;
    }

    if add_bytes {
        let raw = bytes.to_formatted_string(&Locale::en);
        format!("{val:.2} {} ({raw} bytes)", UNITS[step])
    } else {
        format!("{val:.2} {}", UNITS[step])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_units() {
        assert_eq!(bytes_to_pretty(&512, false), "512.00 B");
        assert_eq!(bytes_to_pretty(&(2 * 1024 * 1024), false), "2.00 MB");
    }

    #[test]
    fn appends_raw_byte_count_when_asked() {
        let pretty = bytes_to_pretty(&2048, true);
        assert!(pretty.starts_with("2.00 KB"));
        assert!(pretty.contains("2,048 bytes"));
    }
}
