// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

use tracing::warn;

use crate::error::{CompError, Result};

/// Annotation attached to a velocity sample.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LayerMarker {
    /// Plain sample.
    #[default]
    None,
    /// Crust-mantle boundary.
    Moho,
    /// Conrad discontinuity (upper/lower crust).
    Conrad,
    /// Sea floor.
    Seafloor,
    /// Any other label; carried through but never interpreted.
    Other(String),
}

impl LayerMarker {
    /// Parse the free-text marker column of a velocity file.
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "" => LayerMarker::None,
            "MOHO" => LayerMarker::Moho,
            "CONR" => LayerMarker::Conrad,
            "seafloor" => LayerMarker::Seafloor,
            other => LayerMarker::Other(other.to_string()),
        }
    }

    /// True for markers that model a velocity jump at a single depth.
    pub fn is_discontinuity(&self) -> bool {
        matches!(self, LayerMarker::Moho | LayerMarker::Conrad)
    }
}

impl fmt::Display for LayerMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerMarker::None => Ok(()),
            LayerMarker::Moho => write!(f, "MOHO"),
            LayerMarker::Conrad => write!(f, "CONR"),
            LayerMarker::Seafloor => write!(f, "seafloor"),
            LayerMarker::Other(s) => write!(f, "{}", s),
        }
    }
}

/// One sample of a 1D layered velocity model.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityLayer {
    /// Depth of the sample (km).
    pub depth: f64,
    /// P-wave velocity (km/s).
    pub vp: f64,
    /// S-wave velocity (km/s).
    pub vs: f64,
    /// Boundary annotation.
    pub marker: LayerMarker,
}

impl VelocityLayer {
    /// Create a sample from its raw columns.
    pub fn new(depth: f64, vp: f64, vs: f64, marker: &str) -> Self {
        VelocityLayer {
            depth,
            vp,
            vs,
            marker: LayerMarker::from_label(marker),
        }
    }
}

/// A normalized layered velocity model: non-empty, depth-monotonic, with
/// repeated depths only where the upper sample is a MOHO or CONR boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityModel {
    layers: Vec<VelocityLayer>,
}

impl VelocityModel {
    /// Normalize raw samples into a model.
    ///
    /// A sample at the same depth as the previously kept one replaces it,
    /// unless the kept one carries a discontinuity marker, in which case
    /// both are retained. Normalizing a normalized model is a no-op.
    ///
    /// # Errors
    /// Returns a configuration error for an empty sample list, non-finite or
    /// non-positive velocities, or depths that decrease.
    pub fn normalize(samples: Vec<VelocityLayer>) -> Result<Self> {
        if samples.is_empty() {
            return Err(CompError::Configuration(
                "velocity model is empty".to_string(),
            ));
        }

        let mut layers: Vec<VelocityLayer> = Vec::with_capacity(samples.len());
        for (index, sample) in samples.into_iter().enumerate() {
            if !sample.depth.is_finite() {
                return Err(CompError::Configuration(format!(
                    "velocity sample {}: depth {} is not finite",
                    index, sample.depth
                )));
            }
            for v in [sample.vp, sample.vs] {
                if !v.is_finite() || v <= 0.0 {
                    return Err(CompError::Configuration(format!(
                        "velocity sample {}: velocity {} must be positive and finite",
                        index, v
                    )));
                }
            }

            match layers.last_mut() {
                Some(last) if sample.depth < last.depth => {
                    return Err(CompError::Configuration(format!(
                        "velocity sample {}: depth {} is shallower than previous depth {}",
                        index, sample.depth, last.depth
                    )));
                }
                Some(last) if sample.depth == last.depth && !last.marker.is_discontinuity() => {
                    *last = sample;
                }
                _ => layers.push(sample),
            }
        }

        for pair in layers.windows(2) {
            if pair[0].marker.is_discontinuity() && pair[0].depth != pair[1].depth {
                warn!(
                    "velocity: {} marker at {} km has no matching sample below it",
                    pair[0].marker, pair[0].depth
                );
            }
        }

        Ok(VelocityModel { layers })
    }

    /// The normalized layers, ordered by depth.
    pub fn layers(&self) -> &[VelocityLayer] {
        &self.layers
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Always false for a constructed model; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
