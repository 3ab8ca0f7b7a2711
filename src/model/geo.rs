//! Coordinates and bounding boxes.

use serde::{Deserialize, Serialize};

/// Mean earth radius used for haversine distances.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position. Serialized as a `[lat, lng]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from optional components, rejecting non-finite or out-of-range values.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        let point = Self::new(lat?, lng?);
        point.is_valid().then_some(point)
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// True if either axis differs from `other` by more than `threshold` degrees.
    pub fn moved_beyond(&self, other: &LatLng, threshold: f64) -> bool {
        (self.lat - other.lat).abs() > threshold || (self.lng - other.lng).abs() > threshold
    }

    /// Great-circle distance in meters.
    pub fn distance_m(&self, other: &LatLng) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }

    /// Position rounded to 4 decimal places, `"lat,lng"`.
    pub fn rounded_key(&self) -> String {
        format!("{:.4},{:.4}", self.lat, self.lng)
    }
}

impl From<[f64; 2]> for LatLng {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for [f64; 2] {
    fn from(point: LatLng) -> Self {
        [point.lat, point.lng]
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    /// Degenerate box around a single point.
    pub const fn around(point: LatLng) -> Self {
        Self {
            south: point.lat,
            west: point.lng,
            north: point.lat,
            east: point.lng,
        }
    }

    /// Smallest box containing every point, or `None` for an empty input.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = LatLng>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::around(first);
        for point in iter {
            bounds.extend(point);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, point: LatLng) {
        self.south = self.south.min(point.lat);
        self.north = self.north.max(point.lat);
        self.west = self.west.min(point.lng);
        self.east = self.east.max(point.lng);
    }

    pub fn merge(&mut self, other: &Bounds) {
        self.extend(LatLng::new(other.south, other.west));
        self.extend(LatLng::new(other.north, other.east));
    }

    pub fn contains(&self, point: &LatLng) -> bool {
        (self.south..=self.north).contains(&point.lat) && (self.west..=self.east).contains(&point.lng)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// Grow each side by `ratio` of the span. A zero span grows by `min_pad` degrees.
    pub fn padded(&self, ratio: f64, min_pad: f64) -> Self {
        let lat_pad = ((self.north - self.south) * ratio).max(min_pad);
        let lng_pad = ((self.east - self.west) * ratio).max(min_pad);
        Self {
            south: (self.south - lat_pad).max(-90.0),
            west: (self.west - lng_pad).max(-180.0),
            north: (self.north + lat_pad).min(90.0),
            east: (self.east + lng_pad).min(180.0),
        }
    }
}
