use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use time::OffsetDateTime;
use uuid::Uuid;

use ride_tracker_lib::{
    geo::{haversine_km, GeoPoint},
    trip::{format_duration, Trip},
};

use crate::DataManagerError;

/// Writes a saved trip as a single-track GPX file, points in order.
pub fn write_gpx(trip: &Trip, path: &Path) -> Result<(), DataManagerError> {
    let mut gpx = Gpx::default();
    gpx.version = GpxVersion::Gpx11;

    let created_at: SystemTime = trip.created_at.into();
    let created_at: OffsetDateTime = created_at.into();
    gpx.metadata = Some(gpx::Metadata {
        name: Some(trip.name.clone()),
        time: Some(Time::from(created_at)),
        ..Default::default()
    });

    let mut track = Track::new();
    let mut segment = TrackSegment::new();
    for point in &trip.points {
        segment
            .points
            .push(Waypoint::new(Point::new(point.longitude, point.latitude)));
    }
    track.name = Some(trip.name.clone());
    track.segments.push(segment);
    gpx.tracks.push(track);

    let file = File::create(path)
        .map_err(|err| DataManagerError::Gpx(format!("Failed to create {path:?}: {err}")))?;
    gpx::write(&gpx, BufWriter::new(file))
        .map_err(|err| DataManagerError::Gpx(format!("Failed to write {path:?}: {err}")))?;
    Ok(())
}

/// Reads a GPX track back as an unsaved trip: the name from the metadata
/// (track name as fallback), the distance as the haversine sum over the
/// points, the duration from the first and last point timestamps.
pub fn read_gpx(path: &Path) -> Result<Trip, DataManagerError> {
    let file = File::open(path)
        .map_err(|err| DataManagerError::Gpx(format!("Failed to open {path:?}: {err}")))?;
    let gpx = gpx::read(BufReader::new(file))
        .map_err(|err| DataManagerError::Gpx(format!("Failed to parse {path:?}: {err}")))?;

    let mut name = "Unnamed".to_string();
    let mut created_at: Option<DateTime<Utc>> = None;
    if let Some(track_name) = gpx.tracks.first().and_then(|track| track.name.clone()) {
        name = track_name;
    }
    if let Some(metadata) = gpx.metadata {
        if let Some(meta_name) = metadata.name {
            name = meta_name;
        }
        if let Some(time) = metadata.time {
            created_at = parse_time(&time);
        }
    }

    let mut points: Vec<GeoPoint> = Vec::new();
    let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
    for track in &gpx.tracks {
        for segment in &track.segments {
            for waypoint in &segment.points {
                points.push(GeoPoint::from(waypoint.point()));
                if let Some(timestamp) = waypoint.time.as_ref().and_then(parse_time) {
                    timestamps.push(timestamp);
                }
            }
        }
    }

    let distance_km = points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum();
    let seconds = match (timestamps.first(), timestamps.last()) {
        (Some(first), Some(last)) => (*last - *first).num_seconds().max(0) as u64,
        _ => 0,
    };

    Ok(Trip {
        id: Uuid::new_v4(),
        name,
        distance_km,
        duration: format_duration(seconds),
        points,
        image: None,
        created_at: created_at
            .or_else(|| timestamps.first().copied())
            .unwrap_or_else(Utc::now),
    })
}

fn parse_time(time: &Time) -> Option<DateTime<Utc>> {
    DateTime::from_str(&time.format().ok()?).ok()
}
