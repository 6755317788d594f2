//! Progress reporting for chunked downloads

/// A point-in-time view of one track download.
///
/// Recomputed after every chunk completion; `loaded` never decreases
/// within one download.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes written into the result buffer so far
    pub loaded: u64,
    /// Total size of the track in bytes
    pub total: u64,
    /// Cumulative bytes over elapsed wall time
    pub bytes_per_second: f64,
}

impl ProgressSnapshot {
    /// Progress as a percentage in `[0, 100]`.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.loaded as f64 / self.total as f64) * 100.0
    }

    /// Check if the download is complete.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.loaded >= self.total
    }

    /// Human-readable speed string.
    pub fn speed_string(&self) -> String {
        format!("{}/s", format_bytes(self.bytes_per_second as u64))
    }
}

/// Format bytes as a human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f64 = bytes as f64;
    let exp = (bytes_f64.ln() / THRESHOLD.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f64 / THRESHOLD.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.1} {}", value, UNITS[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let snapshot = ProgressSnapshot {
            loaded: 500,
            total: 1000,
            bytes_per_second: 0.0,
        };
        assert_eq!(snapshot.percent(), 50.0);
        assert!(!snapshot.is_complete());

        let done = ProgressSnapshot {
            loaded: 1000,
            ..snapshot
        };
        assert_eq!(done.percent(), 100.0);
        assert!(done.is_complete());
    }

    #[test]
    fn test_zero_total_percent() {
        let snapshot = ProgressSnapshot {
            loaded: 0,
            total: 0,
            bytes_per_second: 0.0,
        };
        assert_eq!(snapshot.percent(), 0.0);
        assert!(!snapshot.is_complete());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(1073741824), "1.0 GB");
    }

    #[test]
    fn test_speed_string() {
        let snapshot = ProgressSnapshot {
            loaded: 0,
            total: 0,
            bytes_per_second: 2048.0,
        };
        assert_eq!(snapshot.speed_string(), "2.0 KB/s");
    }
}
