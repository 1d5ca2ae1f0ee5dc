//! Registry metrics.
//!
//! Covers the write path (submission, journal apply) and the content dedup
//! index. These metrics complement the structured logging already in place.

use metrics::{counter, describe_counter, describe_histogram, histogram};

use tabula_core::ArtifactType;

// ============================================================================
// Submission Metrics
// ============================================================================

/// Commands submitted to the journal.
pub const COMMANDS_SUBMITTED: &str = "tabula_commands_submitted_total";

/// Submissions that timed out waiting for their applied outcome.
pub const SUBMIT_TIMEOUTS: &str = "tabula_submit_timeouts_total";

/// Wall-clock wait between journal append and resolved outcome.
pub const SUBMIT_WAIT: &str = "tabula_submit_wait_seconds";

/// Outcome resolutions, by how the pending entry was settled.
pub const RESOLUTIONS: &str = "tabula_resolutions_total";

// ============================================================================
// Applier Metrics
// ============================================================================

/// Commands applied from the journal, by kind and outcome.
pub const COMMANDS_APPLIED: &str = "tabula_commands_applied_total";

/// Duration of a single command application.
pub const APPLY_DURATION: &str = "tabula_apply_duration_seconds";

/// Journal records that failed to decode and were skipped.
pub const DECODE_FAILURES: &str = "tabula_journal_decode_failures_total";

/// Redelivered records skipped by the dedup window.
pub const DUPLICATES_SKIPPED: &str = "tabula_duplicate_records_skipped_total";

// ============================================================================
// Content Metrics
// ============================================================================

/// Content lookups, by which tier answered.
pub const CONTENT_LOOKUPS: &str = "tabula_content_lookups_total";

/// Canonicalization attempts that failed and fell back to raw-byte dedup.
pub const CANONICALIZATION_FAILURES: &str = "tabula_canonicalization_failures_total";

// ============================================================================
// Metric Registration
// ============================================================================

/// Registers all registry metric descriptions.
///
/// Call this once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(COMMANDS_SUBMITTED, "Total commands submitted to the journal");
    describe_counter!(
        SUBMIT_TIMEOUTS,
        "Total submissions that timed out with outcome unknown"
    );
    describe_histogram!(
        SUBMIT_WAIT,
        "Seconds between journal append and resolved outcome"
    );
    describe_counter!(RESOLUTIONS, "Total outcome resolutions by settlement");
    describe_counter!(COMMANDS_APPLIED, "Total commands applied from the journal");
    describe_histogram!(APPLY_DURATION, "Seconds spent applying a single command");
    describe_counter!(DECODE_FAILURES, "Total undecodable journal records skipped");
    describe_counter!(
        DUPLICATES_SKIPPED,
        "Total redelivered journal records skipped by the dedup window"
    );
    describe_counter!(CONTENT_LOOKUPS, "Total content lookups by answering tier");
    describe_counter!(
        CANONICALIZATION_FAILURES,
        "Total canonicalization failures that degraded to raw-byte dedup"
    );
}

// ============================================================================
// Submission Metric Recording
// ============================================================================

/// Records a command submission.
pub fn record_command_submitted(kind: &str) {
    counter!(COMMANDS_SUBMITTED, "kind" => kind.to_string()).increment(1);
}

/// Records a submission timeout.
pub fn record_submit_timeout(kind: &str) {
    counter!(SUBMIT_TIMEOUTS, "kind" => kind.to_string()).increment(1);
}

/// Records the wait between append and resolution for a delivered outcome.
pub fn record_submit_wait(kind: &str, wait_secs: f64) {
    histogram!(SUBMIT_WAIT, "kind" => kind.to_string()).record(wait_secs);
}

/// Records how a pending submission entry was settled.
pub fn record_resolution(resolution: &'static str) {
    counter!(RESOLUTIONS, "resolution" => resolution).increment(1);
}

// ============================================================================
// Applier Metric Recording
// ============================================================================

/// Records an applied command and its duration.
pub fn record_command_applied(kind: &str, outcome: &'static str, duration_secs: f64) {
    let labels = [("kind", kind.to_string()), ("outcome", outcome.to_string())];
    counter!(COMMANDS_APPLIED, &labels).increment(1);
    histogram!(APPLY_DURATION, "kind" => kind.to_string()).record(duration_secs);
}

/// Records a journal record that could not be decoded.
pub fn record_decode_failure(partition: u32) {
    counter!(DECODE_FAILURES, "partition" => partition.to_string()).increment(1);
}

/// Records a redelivered record skipped by the dedup window.
pub fn record_duplicate_skipped(kind: &str) {
    counter!(DUPLICATES_SKIPPED, "kind" => kind.to_string()).increment(1);
}

// ============================================================================
// Content Metric Recording
// ============================================================================

/// Records a content lookup answered by `tier` (`"raw"`, `"canonical"`, or
/// `"miss"`).
pub fn record_content_lookup(tier: &'static str) {
    counter!(CONTENT_LOOKUPS, "tier" => tier).increment(1);
}

/// Records a canonicalization failure for an artifact type.
pub fn record_canonicalization_failure(artifact_type: &ArtifactType) {
    counter!(CANONICALIZATION_FAILURES, "artifact_type" => artifact_type.to_string()).increment(1);
}
