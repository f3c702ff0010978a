use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Append-only free-text audit trail stored as newline-delimited entries.
///
/// No structured audit table exists; cancellation and no-show reasons live in
/// the appointment notes field as timestamped lines. The only mutation this
/// type offers is appending, which keeps the never-overwrite invariant at the
/// type level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditTrail(String);

impl AuditTrail {
    pub fn new(initial: impl Into<String>) -> Self {
        Self(initial.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append one timestamped entry, e.g. `[2025-06-02 10:30 UTC] NO_SHOW: ...`.
    pub fn append_entry(&mut self, at: DateTime<Utc>, tag: &str, text: &str) {
        let stamp = at.format("%Y-%m-%d %H:%M UTC");
        let entry = format!("[{stamp}] {tag}: {text}");
        if self.is_empty() {
            self.0 = entry;
        } else {
            self.0 = format!("{}\n{}", self.0.trim_end(), entry);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.0.lines().filter(|l| !l.trim().is_empty())
    }
}

impl fmt::Display for AuditTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn appends_without_discarding_prior_entries() {
        let t1 = Utc.with_ymd_and_hms(2025, 6, 2, 10, 30, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 6, 2, 11, 0, 0).unwrap();

        let mut trail = AuditTrail::new("patient asked for morning slots");
        trail.append_entry(t1, "NO_SHOW", "did not arrive");
        trail.append_entry(t2, "CANCELED", "rebooked by phone");

        let lines: Vec<_> = trail.entries().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "patient asked for morning slots");
        assert_eq!(lines[1], "[2025-06-02 10:30 UTC] NO_SHOW: did not arrive");
        assert_eq!(lines[2], "[2025-06-02 11:00 UTC] CANCELED: rebooked by phone");
    }

    #[test]
    fn first_entry_on_empty_trail_has_no_leading_newline() {
        let t = Utc.with_ymd_and_hms(2025, 6, 2, 10, 30, 0).unwrap();
        let mut trail = AuditTrail::default();
        trail.append_entry(t, "NO_SHOW", "traffic");
        assert_eq!(trail.as_str(), "[2025-06-02 10:30 UTC] NO_SHOW: traffic");
    }
}
