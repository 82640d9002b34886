use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Opaque reference to a picked or captured image. The tracker never looks
/// inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

/// A finalized, named recording, owned by the trip store once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub name: String,
    pub distance_km: f64,
    pub duration: String,
    pub points: Vec<GeoPoint>,
    pub image: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
}

/// List projection of a trip, without its route points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub id: Uuid,
    pub name: String,
    pub distance_km: f64,
    pub duration: String,
    pub image: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
}

impl Trip {
    pub fn summary(&self) -> TripSummary {
        TripSummary {
            id: self.id,
            name: self.name.clone(),
            distance_km: self.distance_km,
            duration: self.duration.clone(),
            image: self.image.clone(),
            created_at: self.created_at,
        }
    }

    pub fn from_parts(summary: TripSummary, points: Vec<GeoPoint>) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            distance_km: summary.distance_km,
            duration: summary.duration,
            points,
            image: summary.image,
            created_at: summary.created_at,
        }
    }
}

/// "MM:SS" under one hour, "HH:MM:SS" from one hour on, zero-padded.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours == 0 {
        format!("{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

/// Inverse of [`format_duration`], used when summing stored durations.
pub fn parse_duration(formatted: &str) -> Option<u64> {
    let mut parts = formatted.split(':').rev();
    let seconds: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let hours: u64 = match parts.next() {
        Some(part) => part.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds_under_an_hour() {
        assert_eq!(format_duration(0), "00:00");
        assert_eq!(format_duration(65), "01:05");
        assert_eq!(format_duration(3599), "59:59");
    }

    #[test]
    fn formats_hours_from_one_hour_on() {
        assert_eq!(format_duration(3600), "01:00:00");
        assert_eq!(format_duration(6100), "01:41:40");
    }

    #[test]
    fn parse_inverts_format() {
        for seconds in [0, 59, 65, 3599, 3600, 6100, 86401] {
            assert_eq!(parse_duration(&format_duration(seconds)), Some(seconds));
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("12"), None);
        assert_eq!(parse_duration("ab:cd"), None);
        assert_eq!(parse_duration("1:2:3:4"), None);
    }
}
