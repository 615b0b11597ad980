//! Geospatial Index
//!
//! Members are stored with their longitude/latitude. Distances use the
//! haversine formula on a sphere with the same earth radius the reference
//! server uses, and the textual geohash is the standard 11-character base-32
//! form (55 bits, longitude bit first).
//!
//! ```text
//!   lon ∈ [-180, 180]   lat ∈ [-90, 90]
//!   bit 0: lon half?  bit 1: lat half?  bit 2: lon half?  ...
//!   every 5 bits → one base-32 character
//! ```

use crate::error::{StoreError, StoreResult};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Earth radius in meters used for all distance computations.
pub const EARTH_RADIUS_M: f64 = 6_372_797.560856;

/// Latitude limits of the Web Mercator projection, the range accepted by GEOADD.
pub const LAT_MIN: f64 = -85.051_128_78;
pub const LAT_MAX: f64 = 85.051_128_78;
pub const LON_MIN: f64 = -180.0;
pub const LON_MAX: f64 = 180.0;

/// Length of the textual geohash returned by `geohash`.
pub const GEOHASH_CHARS: usize = 11;

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// A position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    /// Builds a point, rejecting coordinates outside the indexable range.
    pub fn new(longitude: f64, latitude: f64) -> StoreResult<Self> {
        if !(LON_MIN..=LON_MAX).contains(&longitude) || !(LAT_MIN..=LAT_MAX).contains(&latitude)
        {
            return Err(StoreError::invalid(format!(
                "invalid longitude,latitude pair {:.6},{:.6}",
                longitude, latitude
            )));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Great-circle distance to `other` in meters.
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        haversine_m(self, other)
    }
}

/// Units accepted by distance and radius queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
    Feet,
}

impl DistanceUnit {
    /// How many meters one unit is.
    pub fn meters(self) -> f64 {
        match self {
            DistanceUnit::Meters => 1.0,
            DistanceUnit::Kilometers => 1000.0,
            DistanceUnit::Miles => 1609.34,
            DistanceUnit::Feet => 0.3048,
        }
    }

    pub fn to_meters(self, value: f64) -> f64 {
        value * self.meters()
    }

    pub fn from_meters(self, meters: f64) -> f64 {
        meters / self.meters()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceUnit::Meters => "m",
            DistanceUnit::Kilometers => "km",
            DistanceUnit::Miles => "mi",
            DistanceUnit::Feet => "ft",
        }
    }
}

impl FromStr for DistanceUnit {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "m" => Ok(DistanceUnit::Meters),
            "km" => Ok(DistanceUnit::Kilometers),
            "mi" => Ok(DistanceUnit::Miles),
            "ft" => Ok(DistanceUnit::Feet),
            _ => Err(StoreError::invalid(format!(
                "unsupported unit provided. please use m, km, ft, mi (got '{}')",
                s
            ))),
        }
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Haversine great-circle distance in meters.
pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let half_dlat = ((b.latitude - a.latitude).to_radians() / 2.0).sin();
    let half_dlon = ((b.longitude - a.longitude).to_radians() / 2.0).sin();

    let h = half_dlat * half_dlat + lat1.cos() * lat2.cos() * half_dlon * half_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Encodes a point as a base-32 geohash of `chars` characters.
///
/// Each step halves the current longitude or latitude interval (longitude
/// first) and records which half the point falls in.
pub fn encode_geohash(point: &GeoPoint, chars: usize) -> String {
    let (mut lon_lo, mut lon_hi) = (LON_MIN, LON_MAX);
    let (mut lat_lo, mut lat_hi) = (-90.0_f64, 90.0_f64);

    let mut out = String::with_capacity(chars);
    let mut even = true;
    let mut bits = 0u8;
    let mut ch = 0usize;

    while out.len() < chars {
        let bit = if even {
            bisect(point.longitude, &mut lon_lo, &mut lon_hi)
        } else {
            bisect(point.latitude, &mut lat_lo, &mut lat_hi)
        };
        ch = (ch << 1) | bit;
        even = !even;
        bits += 1;

        if bits == 5 {
            out.push(BASE32[ch] as char);
            bits = 0;
            ch = 0;
        }
    }
    out
}

/// Narrows `[lo, hi]` to the half containing `value`; returns 1 for the upper half.
fn bisect(value: f64, lo: &mut f64, hi: &mut f64) -> usize {
    let mid = (*lo + *hi) / 2.0;
    if value >= mid {
        *lo = mid;
        1
    } else {
        *hi = mid;
        0
    }
}

/// Centre of a radius query.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoOrigin {
    /// An explicit position
    Point(GeoPoint),
    /// The position of an existing member
    Member(String),
}

/// Extra fields and limits for a radius query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RadiusOptions {
    pub with_coords: bool,
    pub with_dist: bool,
    pub with_hash: bool,
    /// Stop after this many matches; 0 means unbounded
    pub limit: usize,
}

/// One member found by a radius query.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoMatch {
    pub member: String,
    /// Distance from the origin, in the query's unit
    pub distance: Option<f64>,
    pub coords: Option<GeoPoint>,
    pub hash: Option<String>,
}

/// Member → position map held by one geo key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoIndex {
    members: HashMap<String, GeoPoint>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or moves a member. Returns `true` if it was new.
    pub fn add(&mut self, member: impl Into<String>, point: GeoPoint) -> bool {
        self.members.insert(member.into(), point).is_none()
    }

    pub fn remove(&mut self, member: &str) -> bool {
        self.members.remove(member).is_some()
    }

    pub fn position(&self, member: &str) -> Option<GeoPoint> {
        self.members.get(member).copied()
    }

    pub fn hash(&self, member: &str) -> Option<String> {
        self.position(member)
            .map(|p| encode_geohash(&p, GEOHASH_CHARS))
    }

    /// Distance between two members in `unit`, `None` if either is missing.
    pub fn distance(&self, a: &str, b: &str, unit: DistanceUnit) -> Option<f64> {
        let a = self.members.get(a)?;
        let b = self.members.get(b)?;
        Some(unit.from_meters(haversine_m(a, b)))
    }

    /// Linear scan for members strictly closer than `radius` to `origin`.
    pub fn within(
        &self,
        origin: &GeoPoint,
        radius: f64,
        unit: DistanceUnit,
        options: &RadiusOptions,
    ) -> Vec<GeoMatch> {
        let radius_m = unit.to_meters(radius);
        let mut matches = Vec::new();

        for (member, point) in &self.members {
            let dist_m = haversine_m(origin, point);
            if dist_m >= radius_m {
                continue;
            }
            matches.push(GeoMatch {
                member: member.clone(),
                distance: options.with_dist.then(|| unit.from_meters(dist_m)),
                coords: options.with_coords.then_some(*point),
                hash: options
                    .with_hash
                    .then(|| encode_geohash(point, GEOHASH_CHARS)),
            });
            if options.limit > 0 && matches.len() >= options.limit {
                break;
            }
        }
        matches
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &GeoPoint)> {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sicily() -> GeoIndex {
        let mut geo = GeoIndex::new();
        geo.add("Palermo", GeoPoint::new(13.361389, 38.115556).unwrap());
        geo.add("Catania", GeoPoint::new(15.087269, 37.502669).unwrap());
        geo
    }

    #[test]
    fn test_point_validation() {
        assert!(GeoPoint::new(181.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, 86.0).is_err());
        assert!(GeoPoint::new(-180.0, -85.05).is_ok());
    }

    #[test]
    fn test_unit_parsing() {
        assert_eq!("km".parse::<DistanceUnit>().unwrap(), DistanceUnit::Kilometers);
        assert_eq!("MI".parse::<DistanceUnit>().unwrap(), DistanceUnit::Miles);
        assert!(matches!(
            "yd".parse::<DistanceUnit>(),
            Err(StoreError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_palermo_catania_distance() {
        let geo = sicily();
        let km = geo
            .distance("Palermo", "Catania", DistanceUnit::Kilometers)
            .unwrap();
        assert!((km - 166.27).abs() < 0.1, "got {}", km);

        let m = geo
            .distance("Palermo", "Catania", DistanceUnit::Meters)
            .unwrap();
        assert!((m - km * 1000.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetry_and_zero() {
        let geo = sicily();
        let ab = geo.distance("Palermo", "Catania", DistanceUnit::Miles);
        let ba = geo.distance("Catania", "Palermo", DistanceUnit::Miles);
        assert_eq!(ab, ba);
        assert_eq!(
            geo.distance("Palermo", "Palermo", DistanceUnit::Meters),
            Some(0.0)
        );
        assert_eq!(geo.distance("Palermo", "Rome", DistanceUnit::Meters), None);
    }

    #[test]
    fn test_geohash() {
        let geo = sicily();
        let palermo = geo.hash("Palermo").unwrap();
        assert_eq!(palermo.len(), GEOHASH_CHARS);
        assert!(palermo.starts_with("sqc8b49r"), "got {}", palermo);
        assert!(geo.hash("Catania").unwrap().starts_with("sqdtr74h"));

        // Deterministic
        assert_eq!(geo.hash("Palermo"), geo.hash("Palermo"));
        assert_eq!(geo.hash("Nowhere"), None);
    }

    #[test]
    fn test_encode_geohash_known_value() {
        // Reference value from the geohash literature
        let point = GeoPoint::new(-5.6, 42.6).unwrap();
        assert_eq!(encode_geohash(&point, 5), "ezs42");
    }

    #[test]
    fn test_within_radius() {
        let geo = sicily();
        let origin = GeoPoint::new(15.0, 37.0).unwrap();

        let options = RadiusOptions {
            with_dist: true,
            with_coords: true,
            with_hash: true,
            ..Default::default()
        };
        let mut found = geo.within(&origin, 200.0, DistanceUnit::Kilometers, &options);
        found.sort_by(|a, b| a.member.cmp(&b.member));
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].member, "Catania");
        let dist = found[0].distance.unwrap();
        assert!((dist - 56.4413).abs() < 0.01, "got {}", dist);
        assert!(found[0].coords.is_some());
        assert!(found[0].hash.is_some());

        let near = geo.within(&origin, 100.0, DistanceUnit::Kilometers, &RadiusOptions::default());
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].member, "Catania");
        assert_eq!(near[0].distance, None);
    }

    #[test]
    fn test_within_is_strict_and_limited() {
        let geo = sicily();
        let palermo = geo.position("Palermo").unwrap();

        // Radius 0: nothing is strictly closer than zero, not even the origin itself
        assert!(geo
            .within(&palermo, 0.0, DistanceUnit::Meters, &RadiusOptions::default())
            .is_empty());

        let limited = RadiusOptions {
            limit: 1,
            ..Default::default()
        };
        assert_eq!(
            geo.within(&palermo, 500.0, DistanceUnit::Kilometers, &limited)
                .len(),
            1
        );
    }
}
