//! Geo Engine
//!
//! Key-space surface of [`GeoIndex`]. Coordinates are validated before any
//! write, so a bad point never leaves a partially updated index.

use crate::error::{StoreError, StoreResult};
use crate::storage::keyspace::Keyspace;
use crate::types::geo::{DistanceUnit, GeoIndex, GeoMatch, GeoOrigin, GeoPoint, RadiusOptions};

impl Keyspace {
    /// Adds a member at (`longitude`, `latitude`), or moves it.
    ///
    /// # Returns
    ///
    /// `true` if the member is new.
    pub fn geoadd(&self, key: &str, longitude: f64, latitude: f64, member: &str) -> StoreResult<bool> {
        Ok(self.geoadd_many(key, &[(longitude, latitude, member)])? == 1)
    }

    /// Adds several `(longitude, latitude, member)` triples; returns how
    /// many members were new.
    pub fn geoadd_many(&self, key: &str, items: &[(f64, f64, &str)]) -> StoreResult<usize> {
        if items.is_empty() {
            return Err(StoreError::invalid("at least one member is required"));
        }
        let points = items
            .iter()
            .map(|&(lon, lat, member)| GeoPoint::new(lon, lat).map(|p| (member, p)))
            .collect::<StoreResult<Vec<_>>>()?;

        self.upsert(key, || Ok(GeoIndex::new()), |geo: &mut GeoIndex| {
            Ok(points
                .into_iter()
                .filter(|(member, point)| geo.add(*member, *point))
                .count())
        })
    }

    /// Removes members; returns how many existed.
    pub fn georem(&self, key: &str, members: &[&str]) -> StoreResult<usize> {
        Ok(self
            .update(key, |geo: &mut GeoIndex| {
                Ok(members.iter().filter(|m| geo.remove(m)).count())
            })?
            .unwrap_or(0))
    }

    /// 11-character geohash of a member.
    pub fn geohash(&self, key: &str, member: &str) -> StoreResult<Option<String>> {
        Ok(self.view(key, |geo: &GeoIndex| geo.hash(member))?.flatten())
    }

    pub fn geopos(&self, key: &str, members: &[&str]) -> StoreResult<Vec<Option<GeoPoint>>> {
        Ok(self
            .view(key, |geo: &GeoIndex| {
                members.iter().map(|m| geo.position(m)).collect()
            })?
            .unwrap_or_else(|| vec![None; members.len()]))
    }

    /// Great-circle distance between two members in `unit`.
    pub fn geodist(
        &self,
        key: &str,
        a: &str,
        b: &str,
        unit: DistanceUnit,
    ) -> StoreResult<Option<f64>> {
        Ok(self
            .view(key, |geo: &GeoIndex| geo.distance(a, b, unit))?
            .flatten())
    }

    /// Members strictly closer than `radius` to `origin`.
    ///
    /// # Returns
    ///
    /// - `Ok(None)` if the key is absent, or the origin member is absent
    /// - `Ok(Some(matches))` otherwise, in no particular order
    pub fn georadius(
        &self,
        key: &str,
        origin: &GeoOrigin,
        radius: f64,
        unit: DistanceUnit,
        options: &RadiusOptions,
    ) -> StoreResult<Option<Vec<GeoMatch>>> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(StoreError::invalid("radius must be a non-negative number"));
        }
        Ok(self
            .view(key, |geo: &GeoIndex| {
                let center = match origin {
                    GeoOrigin::Point(point) => *point,
                    GeoOrigin::Member(member) => geo.position(member)?,
                };
                Some(geo.within(&center, radius, unit, options))
            })?
            .flatten())
    }
}
