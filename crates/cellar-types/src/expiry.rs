use chrono::{DateTime, Utc};

/// An object that can go stale.
///
/// Stores consult [`Expirable::is_expired`] on read and drop the object once
/// it reports `true`.
pub trait Expirable {
    /// Returns `true` if the object is no longer valid at `at`.
    fn is_expired(&self, at: DateTime<Utc>) -> bool;
}
