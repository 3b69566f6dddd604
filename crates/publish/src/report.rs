//! Summary of a publish run.

use std::fmt;

use hoist_storage::TransferError;

/// Counts and errors of one completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Artifacts written to the store.
    pub uploaded: u64,
    /// Artifacts already published with identical bytes.
    pub skipped: u64,
    /// Artifacts whose transform or upload failed.
    pub failed: u64,
    /// Artifacts that reached a terminal state, siblings included.
    pub processed: u64,
    /// Unwanted objects kept for a later run.
    pub queued_for_deletion: u64,
    /// Unwanted objects deleted.
    pub deleted: u64,
    /// Per-artifact and per-deletion failures.
    pub errors: Vec<TransferError>,
    /// Public URL of the destination.
    pub url: String,
    /// Whether the run wrote nothing.
    pub dry_run: bool,
}

impl PublishReport {
    /// Whether every artifact was published or skipped.
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} already present, {} queued for deletion, {} deleted, {} failed",
            self.uploaded, self.skipped, self.queued_for_deletion, self.deleted, self.failed
        )?;
        if self.dry_run {
            write!(f, " (dry run)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let report: PublishReport = PublishReport {
            uploaded: 3,
            skipped: 2,
            failed: 1,
            processed: 6,
            queued_for_deletion: 4,
            deleted: 0,
            ..Default::default()
        };

        assert!(!report.is_success());
        assert_eq!(
            report.to_string(),
            "3 uploaded, 2 already present, 4 queued for deletion, 0 deleted, 1 failed"
        );
    }
}
