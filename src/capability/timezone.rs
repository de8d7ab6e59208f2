//! Timezone capability
//!
//! Offset and name lookup for the zones the server knows about. Engines use
//! this to convert stored UTC timestamps into a session's display zone
//! without carrying their own zone tables.

use crate::error::{Result, ServiceError};
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;

pub trait TimezoneService: Send + Sync {
    /// Resolve a zone name (named zone or `+HH:MM` / `-HH:MM` literal) to
    /// its UTC offset in seconds.
    fn utc_offset_secs(&self, zone: &str) -> Result<i32>;

    /// Convert a UTC timestamp into the given zone.
    fn to_zone(&self, ts: DateTime<Utc>, zone: &str) -> Result<DateTime<FixedOffset>>;

    /// Names of the built-in zones, for administrative listing.
    fn known_zones(&self) -> Vec<&'static str>;
}

// Fixed-offset zone table. The server resolves DST-aware zones at a higher
// layer; engines only ever see resolved fixed offsets.
const ZONES: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("EST", -5 * 3600),
    ("EDT", -4 * 3600),
    ("CST", -6 * 3600),
    ("CET", 3600),
    ("CEST", 2 * 3600),
    ("IST", 5 * 3600 + 1800),
    ("JST", 9 * 3600),
];

pub struct FixedZoneTable;

impl FixedZoneTable {
    fn parse_literal(zone: &str) -> Option<i32> {
        let (sign, rest) = match zone.as_bytes().first()? {
            b'+' => (1, &zone[1..]),
            b'-' => (-1, &zone[1..]),
            _ => return None,
        };
        let (h, m) = rest.split_once(':')?;
        let hours: i32 = h.parse().ok()?;
        let minutes: i32 = m.parse().ok()?;
        if hours > 14 || minutes > 59 {
            return None;
        }
        Some(sign * (hours * 3600 + minutes * 60))
    }
}

impl TimezoneService for FixedZoneTable {
    fn utc_offset_secs(&self, zone: &str) -> Result<i32> {
        if let Some(&(_, offset)) = ZONES.iter().find(|(name, _)| *name == zone) {
            return Ok(offset);
        }
        Self::parse_literal(zone)
            .ok_or_else(|| ServiceError::CapabilityFailure(format!("unknown time zone '{}'", zone)))
    }

    fn to_zone(&self, ts: DateTime<Utc>, zone: &str) -> Result<DateTime<FixedOffset>> {
        let offset_secs = self.utc_offset_secs(zone)?;
        let offset = FixedOffset::east_opt(offset_secs).ok_or_else(|| {
            ServiceError::CapabilityFailure(format!("offset out of range for '{}'", zone))
        })?;
        Ok(ts.with_timezone(&offset))
    }

    fn known_zones(&self) -> Vec<&'static str> {
        ZONES.iter().map(|(name, _)| *name).collect()
    }
}

pub fn service() -> Arc<dyn TimezoneService> {
    Arc::new(FixedZoneTable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_named_zone_lookup() {
        let tz = FixedZoneTable;
        assert_eq!(tz.utc_offset_secs("UTC").unwrap(), 0);
        assert_eq!(tz.utc_offset_secs("IST").unwrap(), 19800);
        assert_eq!(tz.utc_offset_secs("EST").unwrap(), -18000);
    }

    #[test]
    fn test_literal_offset() {
        let tz = FixedZoneTable;
        assert_eq!(tz.utc_offset_secs("+05:30").unwrap(), 19800);
        assert_eq!(tz.utc_offset_secs("-08:00").unwrap(), -28800);
        assert!(tz.utc_offset_secs("+15:00").is_err());
        assert!(tz.utc_offset_secs("nonsense").is_err());
    }

    #[test]
    fn test_convert_timestamp() {
        let tz = FixedZoneTable;
        let utc = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let jst = tz.to_zone(utc, "JST").unwrap();
        assert_eq!(jst.offset().local_minus_utc(), 9 * 3600);
        assert_eq!(jst.timestamp(), utc.timestamp());
    }
}
