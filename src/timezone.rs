//! Conversion from canonical timezone names to UTC offsets.

use time::{OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

/// Get the current UTC offset for a canonical timezone name, e.g.
/// "Pacific/Auckland", or `None` if the name is not a known timezone.
///
/// The offset is resolved against the current instant so daylight saving
/// transitions are reflected.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

#[cfg(test)]
mod timezone_tests {
    use time::UtcOffset;

    use super::get_local_offset;

    #[test]
    fn utc_resolves_to_zero_offset() {
        assert_eq!(get_local_offset("UTC"), Some(UtcOffset::UTC));
    }

    #[test]
    fn unknown_timezone_resolves_to_none() {
        assert_eq!(get_local_offset("Atlantis/Lost_City"), None);
    }
}
