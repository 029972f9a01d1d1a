// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Compare seismic travel times from several forward-modelling engines.
//!
//! A scenario of stations and one earthquake is described in a local planar
//! frame (kilometres east and north of a geodetic reference point). The
//! library realizes it once on the WGS84 ellipsoid, checks that planar and
//! ellipsoidal distances agree, renders the scenario into the input formats
//! of external solvers (TauP, HYPOMOD, TTLAYER), runs them, and aligns the
//! travel times they report by station and phase. A distance sweep moves one
//! station away from the earthquake and repeats the comparison at each step.

#![warn(missing_docs)]

/// Geographic coordinate string codecs.
pub mod coordinates;
/// Error types for the library.
pub mod error;
/// Local planar geometry and its geodetic realization.
pub mod geometry;
/// Loading scenario files and writing result tables.
pub mod io;
/// Console and log-file output.
pub mod logging;
/// Running adapters over scenarios and sweeps, and aligning their results.
pub mod orchestrator;
/// Bounded execution of external solver processes.
pub mod process;
/// Solver adapters.
pub mod solver;
/// Layered 1D velocity models.
pub mod velocity;

pub use crate::error::{CompError, Result};
pub use crate::geometry::{Earthquake, Geometry, ReferencePoint, Station};
pub use crate::orchestrator::{
    AlignedTable, ComparisonOrchestrator, PhaseAliases, SweepProgress, SweepSpec,
};
pub use crate::solver::{SolverAdapter, SolverKind, TravelTimeRecord};
pub use crate::velocity::{VelocityLayer, VelocityModel};
