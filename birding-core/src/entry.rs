use serde_json::Value;
use std::time::Duration;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// A value stored together with the clock reading taken when it was set.
///
/// On the wire this is the three-element array `[value, secs, nanos]`: whole
/// seconds since the UNIX epoch plus the sub-second nanoseconds, so the stamp
/// reads back exactly as it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct FreshEntry {
    value: Value,
    freshness: Duration,
}

impl FreshEntry {
    /// Creates an entry stamped with the given freshness reading
    pub fn new(value: Value, freshness: Duration) -> Self {
        Self { value, freshness }
    }

    /// Returns the stored value
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the entry, returning the stored value
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Returns the freshness stamp
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Checks if this entry is still fresh at `now`
    ///
    /// The boundary is inclusive: an entry exactly `expire_after` old is
    /// fresh. A reading earlier than the stamp counts as zero elapsed.
    /// `None` means entries never go stale.
    pub fn is_fresh(&self, now: Duration, expire_after: Option<Duration>) -> bool {
        match expire_after {
            None => true,
            Some(limit) => now.saturating_sub(self.freshness) <= limit,
        }
    }

    /// Packs the entry into the shape handed to the wrapped backend
    pub fn pack(self) -> Value {
        Value::Array(vec![
            self.value,
            Value::from(self.freshness.as_secs()),
            Value::from(self.freshness.subsec_nanos()),
        ])
    }

    /// Unpacks a value read from the wrapped backend
    ///
    /// Returns `None` for anything that is not `[value, secs, nanos]` with
    /// non-negative integer seconds and nanoseconds below one second.
    pub fn unpack(packed: Value) -> Option<Self> {
        let Value::Array(mut parts) = packed else {
            return None;
        };
        if parts.len() != 3 {
            return None;
        }
        let nanos = u32::try_from(parts.pop()?.as_u64()?).ok()?;
        let secs = parts.pop()?.as_u64()?;
        let value = parts.pop()?;
        if nanos >= NANOS_PER_SEC {
            return None;
        }
        Some(Self::new(value, Duration::new(secs, nanos)))
    }
}
