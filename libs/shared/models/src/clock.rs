use chrono::{DateTime, Utc};

/// Injectable wall-clock source. Every time-window rule reads the request
/// time through this trait so the rules stay deterministic under test.
/// UTC is the single timezone convention throughout.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
