// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{CompError, Result};
use crate::geometry::Geometry;
use crate::io::PhaseList;
use crate::process::run_process;
use crate::solver::{write_artifact, DistanceUnit, SolverAdapter, SolverRun, TravelTimeRecord};
use crate::velocity::{LayerMarker, VelocityModel};

/// Lines of `taup_time` output before the first arrival row.
const HEADER_LINES: usize = 5;

/// Name of the rendered phase list inside the working directory.
pub const PHASE_FILE: &str = "phases.dat";

/// Drives the TauP toolkit: compiles a `.nd` model with `taup_create` and
/// runs `taup_time` once per station.
#[derive(Debug, Clone)]
pub struct TaupAdapter {
    create_binary: String,
    time_binary: String,
    model_name: String,
}

impl Default for TaupAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TaupAdapter {
    /// Adapter using `taup_create` and `taup_time` from the search path.
    pub fn new() -> Self {
        TaupAdapter {
            create_binary: "taup_create".to_string(),
            time_binary: "taup_time".to_string(),
            model_name: "taup_regional".to_string(),
        }
    }

    /// Use other executables for the model compiler and the travel-time tool
    /// (builder method).
    pub fn with_binaries(mut self, create: &str, time: &str) -> Self {
        self.create_binary = create.to_string();
        self.time_binary = time.to_string();
        self
    }

    /// File name of the rendered velocity model.
    pub fn model_file(&self) -> String {
        format!("{}.nd", self.model_name)
    }
}

/// Render a velocity model in TauP's named-discontinuity (`.nd`) format.
///
/// A seafloor marker is followed by a `seafloor` line and a MOHO marker by a
/// `mantle` line; other markers are not represented.
pub fn render_velocity_model(model: &VelocityModel) -> String {
    let mut out = String::new();
    for l in model.layers() {
        out.push_str(&format!("{:.1} {:.1} {:.1}\n", l.depth, l.vp, l.vs));
        match l.marker {
            LayerMarker::Seafloor => out.push_str("seafloor\n"),
            LayerMarker::Moho => out.push_str("mantle\n"),
            _ => {}
        }
    }
    out
}

/// Parse `taup_time` output for one station.
///
/// The first five lines are header. Each non-blank row has the distance in
/// degrees in column 0, the phase name in column 2 and the travel time in
/// column 3.
pub fn parse_taup_output(solver: &str, station: &str, text: &str) -> Result<Vec<TravelTimeRecord>> {
    let mut records = Vec::new();
    for line in text.lines().skip(HEADER_LINES) {
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 {
            return Err(CompError::parse(solver, line, "expected at least 4 columns"));
        }
        let distance: f64 = cols[0]
            .parse()
            .map_err(|_| CompError::parse(solver, line, "invalid distance in column 0"))?;
        let time: f64 = cols[3]
            .parse()
            .map_err(|_| CompError::parse(solver, line, "invalid travel time in column 3"))?;
        records.push(TravelTimeRecord {
            station: station.to_string(),
            phase: cols[2].to_string(),
            time,
            distance,
            unit: DistanceUnit::Degrees,
        });
    }
    Ok(records)
}

impl SolverAdapter for TaupAdapter {
    fn name(&self) -> &str {
        "taup"
    }

    fn render(&self, workdir: &Path, geometry: &Geometry, phases: &PhaseList) -> Result<()> {
        info!("=> generate velocity model for TauP..: {}", self.model_file());
        write_artifact(
            self.name(),
            &workdir.join(self.model_file()),
            &render_velocity_model(geometry.velocity()),
        )?;

        let mut list = phases.names().join("\n");
        list.push('\n');
        write_artifact(self.name(), &workdir.join(PHASE_FILE), &list)
    }

    fn invoke(
        &self,
        workdir: &Path,
        geometry: &Geometry,
        timeout: Duration,
    ) -> Result<Vec<SolverRun>> {
        run_process(
            self.name(),
            &self.create_binary,
            &["-nd".to_string(), self.model_file()],
            workdir,
            timeout,
        )?;

        let depth = geometry.earthquake().source_depth();
        let mut runs = Vec::with_capacity(geometry.stations().len());
        for (station, distance) in geometry.planar_distances() {
            info!("taup: calculating travel times for: {}", station);
            let args = vec![
                "-mod".to_string(),
                self.model_name.clone(),
                "-h".to_string(),
                format!("{:.3}", depth),
                "-km".to_string(),
                format!("{:.3}", distance),
                "-pf".to_string(),
                PHASE_FILE.to_string(),
            ];
            let stdout = run_process(self.name(), &self.time_binary, &args, workdir, timeout)?;
            debug!("taup: {} output lines for {}", stdout.lines().count(), station);
            runs.push(SolverRun {
                station: Some(station.to_string()),
                stdout,
            });
        }
        Ok(runs)
    }

    fn parse(&self, run: &SolverRun, _geometry: &Geometry) -> Result<Vec<TravelTimeRecord>> {
        let station = run
            .station
            .as_deref()
            .ok_or_else(|| CompError::parse(self.name(), "", "taup output is not tagged with a station"))?;
        parse_taup_output(self.name(), station, &run.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::velocity::VelocityLayer;

    const OUTPUT: &str = "
Model: taup_regional
Distance   Depth   Phase   Travel    Ray Param  Takeoff  Incident  Purist    Purist
  (deg)     (km)   Name    Time (s)  p (s/deg)   (deg)    (deg)   Distance   Name
-----------------------------------------------------------------------------------
    0.09    20.0   p          3.72    2.691      153.99    27.76     0.09   = p
    0.09    20.0   s          6.43    4.658      153.95    27.70     0.09   = s

";

    #[test]
    fn velocity_model_rendering() {
        let model = VelocityModel::normalize(vec![
            VelocityLayer::new(0.0, 1.5, 1.5, "seafloor"),
            VelocityLayer::new(3.0, 5.8, 3.2, ""),
            VelocityLayer::new(20.0, 5.8, 3.2, "CONR"),
            VelocityLayer::new(20.0, 6.5, 3.6, ""),
            VelocityLayer::new(30.0, 6.5, 3.6, "MOHO"),
            VelocityLayer::new(30.0, 8.0, 4.5, ""),
        ])
        .unwrap();
        assert_eq!(
            render_velocity_model(&model),
            "0.0 1.5 1.5\nseafloor\n3.0 5.8 3.2\n20.0 5.8 3.2\n20.0 6.5 3.6\n\
             30.0 6.5 3.6\nmantle\n30.0 8.0 4.5\n"
        );
    }

    #[test]
    fn output_parsing() {
        let records = parse_taup_output("taup", "STA", OUTPUT).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].station, "STA");
        assert_eq!(records[0].phase, "p");
        assert_eq!(records[0].time, 3.72);
        assert_eq!(records[0].distance, 0.09);
        assert_eq!(records[0].unit, DistanceUnit::Degrees);
        assert_eq!(records[1].phase, "s");
        assert_eq!(records[1].time, 6.43);
    }

    #[test]
    fn header_only_output_has_no_arrivals() {
        let header: String = OUTPUT.lines().take(HEADER_LINES).collect::<Vec<_>>().join("\n");
        assert!(parse_taup_output("taup", "STA", &header).unwrap().is_empty());
    }

    #[test]
    fn short_row_is_parse_error() {
        let text = format!("{}\n  0.09  20.0  p\n", "\n".repeat(HEADER_LINES - 1));
        let result = parse_taup_output("taup", "STA", &text);
        assert!(matches!(result, Err(CompError::Parse { .. })));
    }

    #[test]
    fn bad_time_is_parse_error() {
        let text = format!("{}\n  0.09  20.0  p  fast\n", "\n".repeat(HEADER_LINES - 1));
        let result = parse_taup_output("taup", "STA", &text);
        assert!(matches!(result, Err(CompError::Parse { .. })));
    }
}
