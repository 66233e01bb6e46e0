use std::fmt;

/// Row-level counters collected while loading and filtering one input scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Non-blank lines read from the input.
    pub lines_read: u64,
    /// Lines skipped because of a wrong field count or invalid UTF-8.
    pub malformed: u64,
    /// Parsed records excluded by the quality filter.
    pub rejected: u64,
    /// Records that passed the quality filter.
    pub accepted: u64,
}

impl IngestStats {
    /// Records parsed successfully (accepted or rejected by quality).
    pub fn parsed(&self) -> u64 {
        self.lines_read - self.malformed
    }

    /// Fraction of read lines that ended up in aggregation.
    pub fn acceptance_ratio(&self) -> f64 {
        if self.lines_read == 0 {
            0.0
        } else {
            self.accepted as f64 / self.lines_read as f64
        }
    }
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lines={} malformed={} rejected={} accepted={} ({:.1}%)",
            self.lines_read,
            self.malformed,
            self.rejected,
            self.accepted,
            self.acceptance_ratio() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_handle_empty_scans() {
        let stats = IngestStats::default();
        assert_eq!(stats.parsed(), 0);
        assert_eq!(stats.acceptance_ratio(), 0.0);
    }

    #[test]
    fn display_reports_every_counter() {
        let stats = IngestStats {
            lines_read: 4,
            malformed: 1,
            rejected: 1,
            accepted: 2,
        };
        assert_eq!(stats.parsed(), 3);
        assert!((stats.acceptance_ratio() - 0.5).abs() < 1e-9);
        assert_eq!(
            stats.to_string(),
            "lines=4 malformed=1 rejected=1 accepted=2 (50.0%)"
        );
    }
}
