//! Timestamp source for domain records.

use chrono::{DateTime, SubsecRound, Utc};

/// Current time truncated to microseconds, the precision PostgreSQL keeps,
/// so records compare equal after a storage round-trip.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
