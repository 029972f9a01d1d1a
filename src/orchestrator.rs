// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::error::{CompError, Result};
use crate::geometry::{Geometry, Station};
use crate::io::{write_aligned_table, write_travel_times, PhaseList};
use crate::solver::{SolverAdapter, TravelTimeRecord};

/// Name of the aligned table a sweep writes into the output directory.
pub const SWEEP_TABLE_FILE: &str = "sweep_aligned.csv";

/// Largest number of steps a sweep may have.
pub const MAX_SWEEP_STEPS: usize = 100_000;

/// Per-adapter mapping from solver phase labels to canonical labels.
///
/// Labels without an entry map to themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhaseAliases {
    map: HashMap<(String, String), String>,
}

impl PhaseAliases {
    /// An empty (identity) mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `label` as reported by `adapter` to `canonical`.
    pub fn insert(&mut self, adapter: &str, label: &str, canonical: &str) {
        self.map.insert(
            (adapter.to_string(), label.to_string()),
            canonical.to_string(),
        );
    }

    /// Add a mapping written as `adapter:label=canonical`.
    ///
    /// # Errors
    /// Returns [`CompError::InvalidArgument`] if the text is not of that form.
    pub fn insert_spec(&mut self, spec: &str) -> Result<()> {
        let invalid = || {
            CompError::InvalidArgument(format!(
                "phase alias '{}' is not of the form adapter:label=canonical",
                spec
            ))
        };
        let (adapter, rest) = spec.split_once(':').ok_or_else(invalid)?;
        let (label, canonical) = rest.split_once('=').ok_or_else(invalid)?;
        let (adapter, label, canonical) = (adapter.trim(), label.trim(), canonical.trim());
        if adapter.is_empty() || label.is_empty() || canonical.is_empty() {
            return Err(invalid());
        }
        self.insert(adapter, label, canonical);
        Ok(())
    }

    /// The canonical name of `label` as reported by `adapter`.
    pub fn canonical<'a>(&'a self, adapter: &str, label: &'a str) -> &'a str {
        self.map
            .get(&(adapter.to_string(), label.to_string()))
            .map(String::as_str)
            .unwrap_or(label)
    }
}

/// What one adapter produced for one scenario.
#[derive(Debug)]
pub struct AdapterOutcome {
    /// Adapter name.
    pub adapter: String,
    /// The records, or the error that stopped the adapter.
    pub result: Result<Vec<TravelTimeRecord>>,
}

/// Outcomes of every configured adapter for one geometry.
#[derive(Debug)]
pub struct ScenarioResult {
    /// The geometry the adapters were run against.
    pub geometry: Geometry,
    /// One outcome per adapter, in configuration order.
    pub outcomes: Vec<AdapterOutcome>,
}

impl ScenarioResult {
    /// Records of a successful adapter.
    pub fn records(&self, adapter: &str) -> Option<&[TravelTimeRecord]> {
        self.outcomes
            .iter()
            .find(|o| o.adapter == adapter)
            .and_then(|o| o.result.as_ref().ok())
            .map(Vec::as_slice)
    }

    /// Names of the adapters that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.adapter.as_str())
            .collect()
    }
}

/// Arrival times of one (station, canonical phase) pair across adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    /// Station name.
    pub station: String,
    /// Canonical phase label.
    pub phase: String,
    /// Planar epicentral distance (km).
    pub distance: f64,
    /// Earliest travel time per adapter, in [`AlignedTable::adapters`] order.
    pub times: Vec<Option<f64>>,
}

/// A phase some successful adapters reported and others did not.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedPhase {
    /// Station name.
    pub station: String,
    /// Canonical phase label.
    pub phase: String,
    /// Planar epicentral distance (km).
    pub distance: f64,
    /// Successful adapters with no arrival for this pair.
    pub missing: Vec<String>,
}

/// Travel times of several adapters keyed by station and canonical phase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedTable {
    /// Column order of [`AlignedRow::times`].
    pub adapters: Vec<String>,
    /// Rows in station order, phases in order of first appearance.
    pub rows: Vec<AlignedRow>,
    /// Pairs not reported by every successful adapter.
    pub unmatched: Vec<UnmatchedPhase>,
}

impl AlignedTable {
    /// Column index of an adapter.
    pub fn column(&self, adapter: &str) -> Option<usize> {
        self.adapters.iter().position(|a| a == adapter)
    }

    /// Times of one adapter for one canonical phase, as (distance, time)
    /// pairs in row order; rows without a time are skipped.
    pub fn series(&self, adapter: &str, phase: &str) -> Vec<(f64, f64)> {
        let Some(col) = self.column(adapter) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter(|r| r.phase == phase)
            .filter_map(|r| r.times[col].map(|t| (r.distance, t)))
            .collect()
    }
}

/// The accumulated rows of a distance sweep.
pub type SweepTable = AlignedTable;

/// Distances and direction of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSpec {
    start: f64,
    stop: f64,
    step: f64,
    direction: (f64, f64),
    station: Option<String>,
}

impl SweepSpec {
    /// Sweep from `start` to `stop` km (inclusive) in increments of `step`
    /// km, due north of the earthquake.
    ///
    /// # Errors
    /// Returns [`CompError::InvalidArgument`] for non-finite values, a
    /// negative start, a step that is not positive, `stop < start`, or more
    /// than [`MAX_SWEEP_STEPS`] steps.
    pub fn new(start: f64, stop: f64, step: f64) -> Result<Self> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) {
            return Err(CompError::InvalidArgument(
                "sweep distances must be finite".to_string(),
            ));
        }
        if start < 0.0 || step <= 0.0 || stop < start {
            return Err(CompError::InvalidArgument(format!(
                "invalid sweep {}..{} by {} km",
                start, stop, step
            )));
        }
        let steps = Self::step_count(start, stop, step);
        if steps >= MAX_SWEEP_STEPS as f64 {
            return Err(CompError::InvalidArgument(format!(
                "sweep {}..{} by {} km has more than {} steps",
                start, stop, step, MAX_SWEEP_STEPS
            )));
        }
        Ok(SweepSpec {
            start,
            stop,
            step,
            direction: (0.0, 1.0),
            station: None,
        })
    }

    /// Sweep along the local vector `(x, y)` (builder method).
    ///
    /// # Errors
    /// Returns [`CompError::InvalidArgument`] for a zero or non-finite vector.
    pub fn with_direction(mut self, x: f64, y: f64) -> Result<Self> {
        let norm = x.hypot(y);
        if !norm.is_finite() || norm == 0.0 {
            return Err(CompError::InvalidArgument(format!(
                "sweep direction ({}, {}) has no length",
                x, y
            )));
        }
        self.direction = (x / norm, y / norm);
        Ok(self)
    }

    /// Name of the swept station (builder method). Defaults to the first
    /// station of the base geometry.
    pub fn with_station(mut self, name: &str) -> Self {
        self.station = Some(name.to_string());
        self
    }

    /// Unit direction vector.
    pub fn direction(&self) -> (f64, f64) {
        self.direction
    }

    /// Whole steps between `start` and `stop`, within 1e-9 of a step.
    fn step_count(start: f64, stop: f64, step: f64) -> f64 {
        ((stop - start) / step + 1e-9).floor()
    }

    /// Every distance of the sweep, `stop` included when it lies on the grid.
    pub fn distances(&self) -> Vec<f64> {
        // bounded by MAX_SWEEP_STEPS in new()
        let count = Self::step_count(self.start, self.stop, self.step) as usize + 1;
        (0..count).map(|i| self.start + i as f64 * self.step).collect()
    }
}

/// Progress information passed to the optional sweep callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepProgress {
    /// Steps completed so far.
    pub step: usize,
    /// Steps in the sweep.
    pub total_steps: usize,
    /// Distance of the step just completed (km).
    pub distance_km: f64,
    /// Elapsed time since the sweep started.
    pub elapsed: Duration,
}

/// Runs solver adapters over a scenario or a distance sweep and aligns their
/// results.
pub struct ComparisonOrchestrator {
    outdir: PathBuf,
    timeout: Duration,
    adapters: Vec<Box<dyn SolverAdapter>>,
    num_threads: Option<usize>,
    aliases: PhaseAliases,
    isolate_steps: bool,
    progress_callback: Option<Box<dyn Fn(SweepProgress) + Send + Sync>>,
}

impl ComparisonOrchestrator {
    /// Create an orchestrator writing below `outdir`, with every solver
    /// process bounded by `timeout`. No adapters are configured yet.
    pub fn new(outdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        ComparisonOrchestrator {
            outdir: outdir.into(),
            timeout,
            adapters: Vec::new(),
            num_threads: None,
            aliases: PhaseAliases::new(),
            isolate_steps: false,
            progress_callback: None,
        }
    }

    /// Add a solver adapter (builder method).
    pub fn with_adapter(mut self, adapter: Box<dyn SolverAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Set the number of worker threads (builder method).
    /// If not specified, defaults to the number of available CPU cores.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = Some(threads);
        self
    }

    /// Set the phase aliases used for alignment (builder method).
    pub fn with_phase_aliases(mut self, aliases: PhaseAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// Give every sweep step its own `step_NNN` subdirectory (builder method).
    pub fn isolate_steps(mut self, isolate: bool) -> Self {
        self.isolate_steps = isolate;
        self
    }

    /// Set a callback invoked after every sweep step (builder method).
    pub fn with_progress(mut self, callback: Box<dyn Fn(SweepProgress) + Send + Sync>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Names of the configured adapters, in column order.
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Get the output directory.
    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    fn get_num_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    fn check_adapters(&self) -> Result<()> {
        if self.adapters.is_empty() {
            return Err(CompError::Configuration("no solvers configured".to_string()));
        }
        let mut seen = HashSet::new();
        for a in &self.adapters {
            if !seen.insert(a.name()) {
                return Err(CompError::Configuration(format!(
                    "solver '{}' configured twice",
                    a.name()
                )));
            }
        }
        Ok(())
    }

    /// Run every adapter against `geometry`, each in `<outdir>/<adapter>/`.
    ///
    /// Adapters run in parallel. A failing adapter is logged and recorded in
    /// its outcome; the other adapters are unaffected. Successful adapters
    /// also get `<outdir>/<adapter>_ttimes.csv`.
    ///
    /// # Errors
    /// Returns an error only for orchestration problems: no or duplicate
    /// adapters, an output directory that cannot be created or written, or a
    /// thread pool that cannot be built.
    pub fn run_scenario(&self, geometry: &Geometry, phases: &PhaseList) -> Result<ScenarioResult> {
        self.run_in(&self.outdir, geometry, phases)
    }

    fn run_in(&self, dir: &Path, geometry: &Geometry, phases: &PhaseList) -> Result<ScenarioResult> {
        self.check_adapters()?;
        fs::create_dir_all(dir)?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.get_num_threads().min(self.adapters.len()))
            .build()
            .map_err(|e| CompError::Configuration(e.to_string()))?;

        let outcomes: Vec<AdapterOutcome> = pool.install(|| {
            self.adapters
                .par_iter()
                .map(|adapter| {
                    let workdir = dir.join(adapter.name());
                    let result = adapter.run(&workdir, geometry, phases, self.timeout);
                    if let Err(e) = &result {
                        error!("{} failed: {}", adapter.name(), e);
                    }
                    AdapterOutcome {
                        adapter: adapter.name().to_string(),
                        result,
                    }
                })
                .collect()
        });

        for outcome in &outcomes {
            let path = dir.join(format!("{}_ttimes.csv", outcome.adapter));
            match &outcome.result {
                Ok(records) => {
                    info!("{}: writing travel times to {}", outcome.adapter, path.display());
                    write_travel_times(&path, records)?;
                }
                // a table from an earlier step must not pass for this one
                Err(_) if path.exists() => {
                    warn!("{}: removing stale {}", outcome.adapter, path.display());
                    fs::remove_file(&path)?;
                }
                Err(_) => {}
            }
        }

        Ok(ScenarioResult {
            geometry: geometry.clone(),
            outcomes,
        })
    }

    /// Align the outcomes of one scenario by station and canonical phase.
    ///
    /// Each adapter gets a column, failed adapters included (all empty). For
    /// every (station, phase) pair the earliest arrival per adapter is kept.
    /// Pairs missing from some successful adapters are logged and listed in
    /// [`AlignedTable::unmatched`].
    pub fn align_by_station_and_phase(&self, result: &ScenarioResult) -> AlignedTable {
        let adapters: Vec<String> = result.outcomes.iter().map(|o| o.adapter.clone()).collect();
        let station_order: HashMap<&str, usize> = result
            .geometry
            .stations()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.station.name.as_str(), i))
            .collect();

        let mut rows: Vec<AlignedRow> = Vec::new();
        let mut index: HashMap<(String, String), usize> = HashMap::new();

        for (col, outcome) in result.outcomes.iter().enumerate() {
            let Ok(records) = &outcome.result else {
                continue;
            };
            for r in records {
                let Some(station) = result.geometry.station(&r.station) else {
                    warn!("{}: ignoring record for unknown station {}", outcome.adapter, r.station);
                    continue;
                };
                let phase = self.aliases.canonical(&outcome.adapter, &r.phase).to_string();
                let key = (r.station.clone(), phase.clone());
                let row = *index.entry(key).or_insert_with(|| {
                    rows.push(AlignedRow {
                        station: r.station.clone(),
                        phase,
                        distance: station.planar_distance,
                        times: vec![None; adapters.len()],
                    });
                    rows.len() - 1
                });
                let cell = &mut rows[row].times[col];
                *cell = Some(cell.map_or(r.time, |t| t.min(r.time)));
            }
        }

        rows.sort_by_key(|r| station_order.get(r.station.as_str()).copied().unwrap_or(usize::MAX));

        let succeeded: Vec<usize> = result
            .outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.result.is_ok())
            .map(|(i, _)| i)
            .collect();
        let mut unmatched = Vec::new();
        for row in &rows {
            let missing: Vec<String> = succeeded
                .iter()
                .filter(|&&i| row.times[i].is_none())
                .map(|&i| adapters[i].clone())
                .collect();
            if !missing.is_empty() {
                warn!(
                    "{} at {:.3} km: phase {} not reported by {}",
                    row.station,
                    row.distance,
                    row.phase,
                    missing.join(", ")
                );
                unmatched.push(UnmatchedPhase {
                    station: row.station.clone(),
                    phase: row.phase.clone(),
                    distance: row.distance,
                    missing,
                });
            }
        }

        AlignedTable {
            adapters,
            rows,
            unmatched,
        }
    }

    /// Move one station away from the earthquake and compare the adapters at
    /// every distance of `spec`.
    ///
    /// Each step reconfigures `base` with the single swept station at
    /// earthquake + d * direction, runs the scenario and aligns it. An
    /// adapter that fails at a step only leaves empty cells for that step.
    /// The accumulated table is written to `<outdir>/sweep_aligned.csv`.
    ///
    /// # Errors
    /// Returns [`CompError::Configuration`] if the swept station is not a
    /// station of `base`, and an error if a reconfigured geometry fails its
    /// checks or the scenario cannot be orchestrated (see
    /// [`Self::run_scenario`]).
    pub fn sweep(&self, base: &Geometry, phases: &PhaseList, spec: &SweepSpec) -> Result<SweepTable> {
        let name = match &spec.station {
            Some(n) => n.clone(),
            None => base
                .stations()
                .first()
                .map(|s| s.station.name.clone())
                .ok_or_else(|| CompError::Configuration("no stations specified".to_string()))?,
        };
        let elevation = base
            .station(&name)
            .map(|s| s.station.elevation)
            .ok_or_else(|| {
                CompError::Configuration(format!(
                    "sweep station '{}' is not in the geometry",
                    name
                ))
            })?;
        let earthquake = *base.earthquake();
        let (ux, uy) = spec.direction();
        let distances = spec.distances();

        info!(
            "sweep: {} steps of {} from {} to {} km along ({:.3}, {:.3})",
            distances.len(),
            name,
            spec.start,
            spec.stop,
            ux,
            uy
        );

        let start_time = Instant::now();
        let mut table = SweepTable {
            adapters: self.adapter_names().iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };

        for (step, &d) in distances.iter().enumerate() {
            info!("sweep: step {}, distance: {} km", step, d);
            let station = Station::new(&name, earthquake.x + d * ux, earthquake.y + d * uy, elevation);
            let geometry = base.reconfigure(vec![station], earthquake)?;

            let dir = if self.isolate_steps {
                self.outdir.join(format!("step_{:03}", step))
            } else {
                self.outdir.clone()
            };
            let result = self.run_in(&dir, &geometry, phases)?;
            let aligned = self.align_by_station_and_phase(&result);
            table.rows.extend(aligned.rows);
            table.unmatched.extend(aligned.unmatched);

            if let Some(cb) = &self.progress_callback {
                cb(SweepProgress {
                    step: step + 1,
                    total_steps: distances.len(),
                    distance_km: d,
                    elapsed: start_time.elapsed(),
                });
            }
        }

        let path = self.outdir.join(SWEEP_TABLE_FILE);
        info!("sweep: writing {}", path.display());
        write_aligned_table(&path, &table)?;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Earthquake, ReferencePoint};
    use crate::solver::{DistanceUnit, SolverRun};
    use crate::velocity::{VelocityLayer, VelocityModel};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Adapter producing fixed arrivals without any external process.
    struct FixedAdapter {
        name: &'static str,
        arrivals: Vec<(&'static str, f64)>,
        fail: bool,
    }

    impl SolverAdapter for FixedAdapter {
        fn name(&self) -> &str {
            self.name
        }

        fn render(&self, _workdir: &Path, _geometry: &Geometry, _phases: &PhaseList) -> Result<()> {
            Ok(())
        }

        fn invoke(
            &self,
            _workdir: &Path,
            _geometry: &Geometry,
            timeout: Duration,
        ) -> Result<Vec<SolverRun>> {
            if self.fail {
                return Err(CompError::Timeout {
                    solver: self.name.to_string(),
                    timeout,
                });
            }
            Ok(vec![SolverRun {
                station: None,
                stdout: String::new(),
            }])
        }

        fn parse(&self, _run: &SolverRun, geometry: &Geometry) -> Result<Vec<TravelTimeRecord>> {
            let mut records = Vec::new();
            for s in geometry.stations() {
                for (phase, velocity) in &self.arrivals {
                    records.push(TravelTimeRecord {
                        station: s.station.name.clone(),
                        phase: phase.to_string(),
                        time: s.planar_distance / velocity,
                        distance: s.planar_distance,
                        unit: DistanceUnit::Kilometres,
                    });
                }
            }
            Ok(records)
        }
    }

    fn fixed(name: &'static str, arrivals: Vec<(&'static str, f64)>) -> Box<dyn SolverAdapter> {
        Box::new(FixedAdapter {
            name,
            arrivals,
            fail: false,
        })
    }

    fn geometry() -> Geometry {
        Geometry::setup(
            ReferencePoint {
                label: "REF".to_string(),
                lon: 0.0,
                lat: 0.0,
            },
            vec![
                Station::new("STA", 0.0, 10.0, 0.0),
                Station::new("STB", 0.0, 20.0, 0.0),
            ],
            Earthquake::new(0.0, 0.0, -10.0),
            VelocityModel::normalize(vec![VelocityLayer::new(0.0, 5.8, 3.2, "")]).unwrap(),
        )
        .unwrap()
    }

    fn phases() -> PhaseList {
        PhaseList::new(vec!["P".to_string(), "S".to_string()]).unwrap()
    }

    #[test]
    fn phase_alias_parsing() {
        let mut aliases = PhaseAliases::new();
        aliases.insert_spec("taup:p=Pg").unwrap();
        assert_eq!(aliases.canonical("taup", "p"), "Pg");
        assert_eq!(aliases.canonical("hypomod", "p"), "p");
        assert_eq!(aliases.canonical("taup", "s"), "s");
        for bad in ["taup", "taup:p", ":p=Pg", "taup:=Pg", "taup:p="] {
            assert!(matches!(
                aliases.insert_spec(bad),
                Err(CompError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn sweep_distances_include_stop() {
        let spec = SweepSpec::new(0.0, 100.0, 50.0).unwrap();
        assert_eq!(spec.distances(), vec![0.0, 50.0, 100.0]);
        let spec = SweepSpec::new(0.0, 1.0, 0.1).unwrap();
        assert_eq!(spec.distances().len(), 11);
        let spec = SweepSpec::new(5.0, 12.0, 5.0).unwrap();
        assert_eq!(spec.distances(), vec![5.0, 10.0]);
    }

    #[test]
    fn sweep_spec_validation() {
        assert!(SweepSpec::new(0.0, 10.0, 0.0).is_err());
        assert!(SweepSpec::new(10.0, 0.0, 1.0).is_err());
        assert!(SweepSpec::new(-1.0, 10.0, 1.0).is_err());
        assert!(SweepSpec::new(0.0, f64::NAN, 1.0).is_err());
        assert!(matches!(
            SweepSpec::new(0.0, 100.0, 1e-15),
            Err(CompError::InvalidArgument(_))
        ));
        assert!(matches!(
            SweepSpec::new(0.0, 1e300, 1e-300),
            Err(CompError::InvalidArgument(_))
        ));
        let widest = SweepSpec::new(0.0, (MAX_SWEEP_STEPS - 1) as f64, 1.0).unwrap();
        assert_eq!(widest.distances().len(), MAX_SWEEP_STEPS);
        let spec = SweepSpec::new(0.0, 10.0, 1.0).unwrap();
        assert!(spec.clone().with_direction(0.0, 0.0).is_err());
        let spec = spec.with_direction(3.0, 4.0).unwrap();
        assert_eq!(spec.direction(), (0.6, 0.8));
    }

    #[test]
    fn scenario_runs_all_adapters_and_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_secs(5))
            .with_adapter(fixed("fast", vec![("P", 6.0)]))
            .with_adapter(fixed("slow", vec![("P", 5.0)]))
            .with_threads(2);

        let result = orch.run_scenario(&geometry(), &phases()).unwrap();
        assert_eq!(result.outcomes.len(), 2);
        assert_eq!(result.outcomes[0].adapter, "fast");
        assert_eq!(result.records("slow").unwrap().len(), 2);
        assert!(result.failed().is_empty());
        assert!(dir.path().join("fast").is_dir());
        let csv = fs::read_to_string(dir.path().join("slow_ttimes.csv")).unwrap();
        assert!(csv.starts_with("station,phase,time,distance\nSTA,P,2,10\n"));
    }

    #[test]
    fn failing_adapter_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_millis(100))
            .with_adapter(fixed("good", vec![("P", 5.0)]))
            .with_adapter(Box::new(FixedAdapter {
                name: "bad",
                arrivals: Vec::new(),
                fail: true,
            }));

        let result = orch.run_scenario(&geometry(), &phases()).unwrap();
        assert_eq!(result.failed(), vec!["bad"]);
        assert!(result.records("good").is_some());
        assert!(!dir.path().join("bad_ttimes.csv").exists());

        let table = orch.align_by_station_and_phase(&result);
        assert_eq!(table.adapters, vec!["good", "bad"]);
        assert!(table.rows.iter().all(|r| r.times[1].is_none()));
        assert!(table.unmatched.is_empty());
    }

    #[test]
    fn duplicate_adapters_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_secs(1))
            .with_adapter(fixed("same", vec![("P", 5.0)]))
            .with_adapter(fixed("same", vec![("P", 6.0)]));
        assert!(matches!(
            orch.run_scenario(&geometry(), &phases()),
            Err(CompError::Configuration(_))
        ));

        let empty = ComparisonOrchestrator::new(dir.path(), Duration::from_secs(1));
        assert!(matches!(
            empty.run_scenario(&geometry(), &phases()),
            Err(CompError::Configuration(_))
        ));
    }

    #[test]
    fn alignment_uses_aliases_and_earliest_arrival() {
        let dir = tempfile::tempdir().unwrap();
        let mut aliases = PhaseAliases::new();
        aliases.insert("a", "p", "P");
        aliases.insert("a", "Pn", "P");
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_secs(5))
            .with_adapter(fixed("a", vec![("p", 5.0), ("Pn", 8.0), ("S", 3.0)]))
            .with_adapter(fixed("b", vec![("P", 6.0)]))
            .with_phase_aliases(aliases);

        let result = orch.run_scenario(&geometry(), &phases()).unwrap();
        let table = orch.align_by_station_and_phase(&result);

        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[0].station, "STA");
        assert_eq!(table.rows[0].phase, "P");
        assert_eq!(table.rows[0].distance, 10.0);
        // Pn at 8 km/s arrives before p at 5 km/s
        assert_eq!(table.rows[0].times, vec![Some(1.25), Some(10.0 / 6.0)]);
        assert_eq!(table.rows[1].phase, "S");
        assert_eq!(table.rows[2].station, "STB");

        assert_eq!(table.unmatched.len(), 2);
        assert_eq!(table.unmatched[0].phase, "S");
        assert_eq!(table.unmatched[0].missing, vec!["b"]);
        assert_eq!(table.series("b", "P"), vec![(10.0, 10.0 / 6.0), (20.0, 20.0 / 6.0)]);
    }

    #[test]
    fn sweep_accumulates_steps_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_secs(5))
            .with_adapter(fixed("a", vec![("P", 6.0)]))
            .with_adapter(fixed("b", vec![("P", 5.0)]))
            .isolate_steps(true)
            .with_progress(Box::new(move |p: SweepProgress| {
                assert_eq!(p.total_steps, 3);
                seen.fetch_add(1, Ordering::SeqCst);
            }));

        let spec = SweepSpec::new(0.0, 20.0, 10.0)
            .unwrap()
            .with_direction(1.0, 0.0)
            .unwrap()
            .with_station("STB");
        let table = orch.sweep(&geometry(), &phases(), &spec).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(table.rows.len(), 3);
        assert!(table.rows.iter().all(|r| r.station == "STB"));
        let distances: Vec<f64> = table.rows.iter().map(|r| r.distance).collect();
        assert_eq!(distances, vec![0.0, 10.0, 20.0]);
        let series = table.series("a", "P");
        assert!(series.windows(2).all(|w| w[0].1 <= w[1].1));

        assert!(dir.path().join("step_000").join("a").is_dir());
        assert!(dir.path().join("step_002").join("b_ttimes.csv").is_file());
        let csv = fs::read_to_string(dir.path().join(SWEEP_TABLE_FILE)).unwrap();
        assert!(csv.starts_with("distance,station,phase,a,b\n0,STB,P,0,0\n"));
    }

    #[test]
    fn sweep_rejects_unknown_station() {
        let dir = tempfile::tempdir().unwrap();
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_secs(5))
            .with_adapter(fixed("a", vec![("P", 6.0)]));
        let spec = SweepSpec::new(0.0, 10.0, 10.0).unwrap().with_station("NOPE");
        assert!(matches!(
            orch.sweep(&geometry(), &phases(), &spec),
            Err(CompError::Configuration(_))
        ));
        assert!(!dir.path().join(SWEEP_TABLE_FILE).exists());
    }

    #[test]
    fn failed_adapter_removes_previous_table() {
        let dir = tempfile::tempdir().unwrap();
        let stale = dir.path().join("bad_ttimes.csv");
        fs::write(&stale, "station,phase,time,distance\nSTA,P,1,10\n").unwrap();
        let orch = ComparisonOrchestrator::new(dir.path(), Duration::from_millis(100))
            .with_adapter(fixed("good", vec![("P", 5.0)]))
            .with_adapter(Box::new(FixedAdapter {
                name: "bad",
                arrivals: Vec::new(),
                fail: true,
            }));

        let result = orch.run_scenario(&geometry(), &phases()).unwrap();
        assert_eq!(result.failed(), vec!["bad"]);
        assert!(!stale.exists());
        assert!(dir.path().join("good_ttimes.csv").is_file());
    }
}
