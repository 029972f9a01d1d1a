// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Adapters that drive external travel-time solvers.
//!
//! Every adapter renders the shared [`Geometry`] into its solver's input
//! files, runs the solver binary, and parses the solver's text output into
//! [`TravelTimeRecord`]s. Adapters never recompute geometry themselves.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{CompError, Result};
use crate::geometry::Geometry;
use crate::io::PhaseList;

/// HYPOMOD (HYPOSAT forward modelling) adapter.
pub mod hypomod;
/// TauP toolkit adapter.
pub mod taup;
/// TTLAYER adapter (parameter block only).
pub mod ttlayer;

pub use hypomod::HypomodAdapter;
pub use taup::TaupAdapter;
pub use ttlayer::TtlayerAdapter;

/// Unit of the epicentral distance a solver reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    /// Arc degrees.
    Degrees,
    /// Kilometres.
    Kilometres,
}

/// One travel time for one (station, phase) pair from one solver run.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeRecord {
    /// Station name.
    pub station: String,
    /// Phase label as the solver spells it.
    pub phase: String,
    /// Travel time (s).
    pub time: f64,
    /// Epicentral distance as reported by the solver.
    pub distance: f64,
    /// Unit of `distance`.
    pub unit: DistanceUnit,
}

/// Captured standard output of one solver process.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverRun {
    /// Station the process was run for, when the solver is run per station.
    pub station: Option<String>,
    /// Standard output.
    pub stdout: String,
}

/// Capability set shared by all solver adapters.
pub trait SolverAdapter: Send + Sync {
    /// Short name, used for working directories, CSV columns and logs.
    fn name(&self) -> &str;

    /// Write the solver's input artefacts into `workdir`.
    fn render(&self, workdir: &Path, geometry: &Geometry, phases: &PhaseList) -> Result<()>;

    /// Run the solver in `workdir`; every process is bounded by `timeout`.
    fn invoke(&self, workdir: &Path, geometry: &Geometry, timeout: Duration)
        -> Result<Vec<SolverRun>>;

    /// Convert one captured output into travel-time records.
    fn parse(&self, run: &SolverRun, geometry: &Geometry) -> Result<Vec<TravelTimeRecord>>;

    /// Render, invoke and parse in order.
    fn run(
        &self,
        workdir: &Path,
        geometry: &Geometry,
        phases: &PhaseList,
        timeout: Duration,
    ) -> Result<Vec<TravelTimeRecord>> {
        info!("== running {} in {}", self.name(), workdir.display());
        fs::create_dir_all(workdir).map_err(|e| CompError::render(self.name(), e))?;
        self.render(workdir, geometry, phases)?;
        let runs = self.invoke(workdir, geometry, timeout)?;

        let mut records = Vec::new();
        for run in &runs {
            records.extend(self.parse(run, geometry)?);
        }
        info!("{}: {} travel times", self.name(), records.len());
        Ok(records)
    }
}

/// Write one rendered artefact, reporting failures as render errors.
pub(crate) fn write_artifact(solver: &str, path: &Path, contents: &str) -> Result<()> {
    debug!("{}: writing {}", solver, path.display());
    fs::write(path, contents)
        .map_err(|e| CompError::render(solver, format!("{}: {}", path.display(), e)))
}

/// The solvers the orchestrator knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// TauP (`taup_create` / `taup_time`).
    Taup,
    /// HYPOMOD.
    Hypomod,
    /// TTLAYER.
    Ttlayer,
}

impl SolverKind {
    /// A default-configured adapter for this solver.
    pub fn adapter(self) -> Box<dyn SolverAdapter> {
        match self {
            SolverKind::Taup => Box::new(TaupAdapter::new()),
            SolverKind::Hypomod => Box::new(HypomodAdapter::new()),
            SolverKind::Ttlayer => Box::new(TtlayerAdapter::new()),
        }
    }
}

impl FromStr for SolverKind {
    type Err = CompError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "taup" => Ok(SolverKind::Taup),
            "hypomod" => Ok(SolverKind::Hypomod),
            "ttlayer" => Ok(SolverKind::Ttlayer),
            other => Err(CompError::InvalidArgument(format!(
                "unknown solver '{}' (expected taup, hypomod or ttlayer)",
                other
            ))),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverKind::Taup => "taup",
            SolverKind::Hypomod => "hypomod",
            SolverKind::Ttlayer => "ttlayer",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_kind_parses_case_insensitively() {
        assert_eq!("TauP".parse::<SolverKind>().unwrap(), SolverKind::Taup);
        assert_eq!("hypomod".parse::<SolverKind>().unwrap(), SolverKind::Hypomod);
        assert!(matches!(
            "hyposat".parse::<SolverKind>(),
            Err(CompError::InvalidArgument(_))
        ));
    }

    #[test]
    fn adapter_names_match_kinds() {
        for kind in [SolverKind::Taup, SolverKind::Hypomod, SolverKind::Ttlayer] {
            assert_eq!(kind.adapter().name(), kind.to_string());
        }
    }
}
