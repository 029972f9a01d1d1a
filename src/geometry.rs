// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Local Cartesian scenario geometry and its geodetic realization.
//!
//! Stations and the earthquake are described in kilometres east (x) and
//! north (y) of a reference point. Each offset is turned into a compass
//! bearing and a range and walked out along a WGS84 geodesic from the
//! reference, so the geodetic positions stay faithful at apertures of tens
//! of kilometres where a flat-Earth shift would not. The result is checked
//! by comparing planar distances with inverse-geodesic distances.

use std::collections::HashSet;

use geo::{GeodesicDestination, GeodesicDistance, Point};
use tracing::{debug, info};

use crate::error::{CompError, Result};
use crate::velocity::VelocityModel;

/// Default relative tolerance between planar and ellipsoidal distances
/// (about 10 cm at 10 km).
pub const DEFAULT_RTOL: f64 = 1e-5;

/// Absolute floor for the consistency check, used when points coincide (km).
const ABS_FLOOR_KM: f64 = 1e-6;

/// Geodetic origin of the local planar frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferencePoint {
    /// Free-text label from the geometry file.
    pub label: String,
    /// Longitude (degrees).
    pub lon: f64,
    /// Latitude (degrees).
    pub lat: f64,
}

/// A station given by its local offset from the reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Station code; unique within a geometry.
    pub name: String,
    /// Offset east of the reference (km).
    pub x: f64,
    /// Offset north of the reference (km).
    pub y: f64,
    /// Elevation (km).
    pub elevation: f64,
}

impl Station {
    /// Create a station.
    pub fn new(name: &str, x: f64, y: f64, elevation: f64) -> Self {
        Station {
            name: name.to_string(),
            x,
            y,
            elevation,
        }
    }
}

/// The scenario's earthquake.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Earthquake {
    /// Offset east of the reference (km).
    pub x: f64,
    /// Offset north of the reference (km).
    pub y: f64,
    /// Signed depth (km); negative is below the surface.
    pub depth: f64,
}

impl Earthquake {
    /// Create an earthquake.
    pub fn new(x: f64, y: f64, depth: f64) -> Self {
        Earthquake { x, y, depth }
    }

    /// Depth below the surface as a positive number, the way solvers expect it.
    pub fn source_depth(&self) -> f64 {
        -self.depth
    }
}

/// Longitude/latitude on the WGS84 ellipsoid (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticPosition {
    /// Longitude (degrees).
    pub lon: f64,
    /// Latitude (degrees).
    pub lat: f64,
}

/// A station together with the quantities derived for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedStation {
    /// The station as configured.
    pub station: Station,
    /// Derived geodetic position.
    pub position: GeodeticPosition,
    /// Planar epicentral distance from the earthquake (km).
    pub planar_distance: f64,
}

/// Compass bearing (degrees clockwise from north) and range (km) of a local
/// offset. The argument order `atan2(x, y)` is the single azimuth convention
/// used for every point.
pub fn azimuth_and_range(x: f64, y: f64) -> (f64, f64) {
    (x.atan2(y).to_degrees(), x.hypot(y))
}

/// Walk out a local offset from `reference` along the WGS84 geodesic.
pub fn derive_position(reference: &ReferencePoint, x: f64, y: f64) -> GeodeticPosition {
    let (azimuth, range_km) = azimuth_and_range(x, y);
    let origin = Point::new(reference.lon, reference.lat);
    let p = origin.geodesic_destination(azimuth, range_km * 1000.0);
    GeodeticPosition {
        lon: p.x(),
        lat: p.y(),
    }
}

/// Inverse-geodesic distance between two positions (km).
pub fn ellipsoidal_distance(a: &GeodeticPosition, b: &GeodeticPosition) -> f64 {
    let pa = Point::new(a.lon, a.lat);
    let pb = Point::new(b.lon, b.lat);
    pa.geodesic_distance(&pb) / 1000.0
}

/// A fully derived, self-consistent scenario geometry.
///
/// Values are immutable: [`Geometry::reconfigure`] produces a new geometry
/// instead of editing this one, so derived fields can never go stale.
#[derive(Debug, Clone)]
pub struct Geometry {
    reference: ReferencePoint,
    stations: Vec<DerivedStation>,
    earthquake: Earthquake,
    earthquake_position: GeodeticPosition,
    velocity: VelocityModel,
    rtol: f64,
}

impl Geometry {
    /// Build a geometry with the default tolerance.
    ///
    /// # Errors
    /// Returns a configuration error if the station list is empty, a station
    /// name repeats, or any coordinate is not finite; returns a consistency
    /// error if the derived positions fail [`Geometry::verify_consistency`].
    pub fn setup(
        reference: ReferencePoint,
        stations: Vec<Station>,
        earthquake: Earthquake,
        velocity: VelocityModel,
    ) -> Result<Self> {
        Self::setup_with_tolerance(reference, stations, earthquake, velocity, DEFAULT_RTOL)
    }

    /// Build a geometry with an explicit relative tolerance.
    ///
    /// # Errors
    /// As [`Geometry::setup`], plus a configuration error for a tolerance
    /// that is not positive and finite.
    pub fn setup_with_tolerance(
        reference: ReferencePoint,
        stations: Vec<Station>,
        earthquake: Earthquake,
        velocity: VelocityModel,
        rtol: f64,
    ) -> Result<Self> {
        info!("geometry: setting up..");
        if !rtol.is_finite() || rtol <= 0.0 {
            return Err(CompError::Configuration(format!(
                "tolerance {} must be positive and finite",
                rtol
            )));
        }
        validate(&reference, &stations, &earthquake)?;
        if velocity.is_empty() {
            return Err(CompError::Configuration(
                "velocity model is empty".to_string(),
            ));
        }

        let earthquake_position = derive_position(&reference, earthquake.x, earthquake.y);

        let derived: Vec<DerivedStation> = stations
            .into_iter()
            .map(|station| {
                let (azimuth, range) = azimuth_and_range(station.x, station.y);
                let position = derive_position(&reference, station.x, station.y);
                let planar_distance = (earthquake.x - station.x).hypot(earthquake.y - station.y);
                debug!(
                    "{}: ({}, {}) km, azimuth: {:.4}, range: {:.4} km",
                    station.name, station.x, station.y, azimuth, range
                );
                DerivedStation {
                    station,
                    position,
                    planar_distance,
                }
            })
            .collect();

        let geometry = Geometry {
            reference,
            stations: derived,
            earthquake,
            earthquake_position,
            velocity,
            rtol,
        };
        geometry.log_summary();
        geometry.verify_consistency()?;
        Ok(geometry)
    }

    /// A new geometry with the same reference point, velocity model and
    /// tolerance but different stations and earthquake.
    ///
    /// # Errors
    /// As [`Geometry::setup`].
    pub fn reconfigure(&self, stations: Vec<Station>, earthquake: Earthquake) -> Result<Self> {
        Self::setup_with_tolerance(
            self.reference.clone(),
            stations,
            earthquake,
            self.velocity.clone(),
            self.rtol,
        )
    }

    /// Check planar against ellipsoidal distances for the earthquake and
    /// every station, and for the earthquake and the reference point.
    ///
    /// # Errors
    /// Returns [`CompError::Consistency`] on the first pair outside tolerance.
    pub fn verify_consistency(&self) -> Result<()> {
        for s in &self.stations {
            let ellipsoidal = ellipsoidal_distance(&self.earthquake_position, &s.position);
            self.check_pair("earthquake", &s.station.name, s.planar_distance, ellipsoidal)?;
        }

        let reference_position = GeodeticPosition {
            lon: self.reference.lon,
            lat: self.reference.lat,
        };
        let planar = self.earthquake.x.hypot(self.earthquake.y);
        let ellipsoidal = ellipsoidal_distance(&self.earthquake_position, &reference_position);
        self.check_pair("earthquake", &self.reference.label, planar, ellipsoidal)?;

        debug!("geometry: planar and ellipsoidal distances agree (rtol {})", self.rtol);
        Ok(())
    }

    fn check_pair(&self, from: &str, to: &str, planar: f64, ellipsoidal: f64) -> Result<()> {
        if (planar - ellipsoidal).abs() <= self.rtol * planar + ABS_FLOOR_KM {
            return Ok(());
        }
        Err(CompError::Consistency {
            from: from.to_string(),
            to: to.to_string(),
            planar_km: planar,
            ellipsoidal_km: ellipsoidal,
            rtol: self.rtol,
        })
    }

    /// Planar epicentral distance to every station (km), in station order.
    pub fn planar_distances(&self) -> Vec<(&str, f64)> {
        self.stations
            .iter()
            .map(|s| (s.station.name.as_str(), s.planar_distance))
            .collect()
    }

    /// Get the reference point.
    pub fn reference(&self) -> &ReferencePoint {
        &self.reference
    }

    /// Get the derived stations.
    pub fn stations(&self) -> &[DerivedStation] {
        &self.stations
    }

    /// Look up a derived station by name.
    pub fn station(&self, name: &str) -> Option<&DerivedStation> {
        self.stations.iter().find(|s| s.station.name == name)
    }

    /// Get the earthquake.
    pub fn earthquake(&self) -> &Earthquake {
        &self.earthquake
    }

    /// Get the earthquake's derived geodetic position.
    pub fn earthquake_position(&self) -> &GeodeticPosition {
        &self.earthquake_position
    }

    /// Get the velocity model.
    pub fn velocity(&self) -> &VelocityModel {
        &self.velocity
    }

    /// Get the relative tolerance of the consistency check.
    pub fn tolerance(&self) -> f64 {
        self.rtol
    }

    fn log_summary(&self) {
        info!(
            "=> reference: {} ({}, {})",
            self.reference.label, self.reference.lon, self.reference.lat
        );
        info!("=> stations (km -> deg):");
        for s in &self.stations {
            info!(
                "  {}: ({}, {}, {}) -> ({:.6}, {:.6}), distance: {:.3} km",
                s.station.name,
                s.station.x,
                s.station.y,
                s.station.elevation,
                s.position.lon,
                s.position.lat,
                s.planar_distance
            );
        }
        info!(
            "=> earthquake: ({}, {}, {}) -> ({:.6}, {:.6})",
            self.earthquake.x,
            self.earthquake.y,
            self.earthquake.depth,
            self.earthquake_position.lon,
            self.earthquake_position.lat
        );
    }
}

fn validate(reference: &ReferencePoint, stations: &[Station], earthquake: &Earthquake) -> Result<()> {
    if !reference.lon.is_finite() || !reference.lat.is_finite() || reference.lat.abs() > 90.0 {
        return Err(CompError::Configuration(format!(
            "invalid reference point ({}, {})",
            reference.lon, reference.lat
        )));
    }

    if stations.is_empty() {
        return Err(CompError::Configuration("no stations specified".to_string()));
    }

    let mut seen = HashSet::new();
    for s in stations {
        if s.name.is_empty() {
            return Err(CompError::Configuration("station with empty name".to_string()));
        }
        if !seen.insert(s.name.as_str()) {
            return Err(CompError::Configuration(format!(
                "duplicate station name '{}'",
                s.name
            )));
        }
        if !(s.x.is_finite() && s.y.is_finite() && s.elevation.is_finite()) {
            return Err(CompError::Configuration(format!(
                "station '{}' has non-finite coordinates",
                s.name
            )));
        }
    }

    if !(earthquake.x.is_finite() && earthquake.y.is_finite() && earthquake.depth.is_finite()) {
        return Err(CompError::Configuration(
            "earthquake has non-finite coordinates".to_string(),
        ));
    }
    Ok(())
}
