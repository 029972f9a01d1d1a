// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::coordinates::ddmmss_from_decimal_degrees;
use crate::error::{CompError, Result};
use crate::geometry::Geometry;
use crate::io::PhaseList;
use crate::process::run_process;
use crate::solver::{write_artifact, DistanceUnit, SolverAdapter, SolverRun, TravelTimeRecord};
use crate::velocity::{LayerMarker, VelocityModel};

const PARAMETER_FILE: &str = "hyposat-parameter";
const MODEL_FILE: &str = "loc.dat";
const STATION_FILE: &str = "stations.dat";
const INPUT_FILE: &str = "hyposat-in";
const OUTPUT_FILE: &str = "hyposat-out";

/// Marks the header row of the arrival table.
const TABLE_START: &str = "Stat";
/// Marks the end of the arrival table.
const TABLE_END: &str = "Travel-time differences:";

/// Minimum tokens in an arrival row (station .. residual).
const MIN_ROW_TOKENS: usize = 8;

/// Drives HYPOMOD, the forward-modelling companion of HYPOSAT.
///
/// All artefacts are written into one working directory and `hypomod` is run
/// there without arguments. Synthetic picks sit at epoch zero, so the
/// residuals HYPOMOD reports are the negated travel times.
#[derive(Debug, Clone)]
pub struct HypomodAdapter {
    binary: String,
}

impl Default for HypomodAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl HypomodAdapter {
    /// Adapter using `hypomod` from the search path.
    pub fn new() -> Self {
        HypomodAdapter {
            binary: "hypomod".to_string(),
        }
    }

    /// Use another executable (builder method).
    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }
}

/// Blank the leading zero digits of a `DDMMSS.S` string, up to but not
/// including the units-of-seconds digit.
fn blank_leading_zeros(dms: &str) -> String {
    let units = dms.find('.').map(|i| i.saturating_sub(1)).unwrap_or(0);
    let mut leading = true;
    dms.char_indices()
        .map(|(i, c)| {
            if leading && i < units && c == '0' {
                ' '
            } else {
                leading = false;
                c
            }
        })
        .collect()
}

/// Render the fixed parameter template with the starting source position.
pub fn render_parameters(geometry: &Geometry) -> String {
    let p = geometry.earthquake_position();
    let depth = geometry.earthquake().source_depth();
    let mut out = String::from("hyposat-parameter (hypcomp)\n");
    let entries = [
        ("GLOBAL MODEL", "_".to_string()),
        ("LOCAL OR REGIONAL MODEL", MODEL_FILE.to_string()),
        ("STATION FILE", STATION_FILE.to_string()),
        ("INPUT FILE NAME", INPUT_FILE.to_string()),
        ("OUTPUT FILE NAME", OUTPUT_FILE.to_string()),
        ("STARTING SOURCE LATITUDE", format!("{:.6}", p.lat)),
        ("STARTING SOURCE LONGITUDE", format!("{:.6}", p.lon)),
        ("STARTING SOURCE DEPTH [km]", format!("{:.3}", depth)),
        ("STARTING SOURCE TIME (EPOCHAL TIME)", "0.".to_string()),
        ("DEPTH FLAG (f,b,d,F,B,D)", "f".to_string()),
        ("OUTPUT LEVEL", "4".to_string()),
    ];
    for (key, value) in entries {
        out.push_str(&format!("{:<36}: {}\n", key, value));
    }
    out.push_str("END OF PARAMETER FILE\n");
    out
}

/// Render the local model file: a title line, then one fixed-width line per
/// layer with a MOHO or CONR keyword on discontinuities.
pub fn render_local_model(model: &VelocityModel) -> String {
    let mut out = String::from("hypcomp local model\n");
    for l in model.layers() {
        out.push_str(&format!("{:10.3}{:10.4}{:10.4}", l.depth, l.vp, l.vs));
        match l.marker {
            LayerMarker::Moho | LayerMarker::Conrad => out.push_str(&l.marker.to_string()),
            _ => {}
        }
        out.push('\n');
    }
    out
}

/// Render the station file.
///
/// # Errors
/// Returns a render error if a station position cannot be encoded.
pub fn render_stations(geometry: &Geometry) -> Result<String> {
    let mut out = String::new();
    for s in geometry.stations() {
        let encode = |deg: f64, hint: char| {
            ddmmss_from_decimal_degrees(deg, Some(hint))
                .map(|d| blank_leading_zeros(&d))
                .map_err(|e| CompError::render("hypomod", e))
        };
        let lat = encode(s.position.lat, 'N')?;
        let lon = encode(s.position.lon, 'E')?;
        out.push_str(&format!(
            "{:<6}{:>9} {:>10}{:7.1}\n",
            s.station.name,
            lat,
            lon,
            s.station.elevation * 1000.0
        ));
    }
    Ok(out)
}

/// Render the input file: one pick per station and phase at epoch zero.
pub fn render_picks(geometry: &Geometry, phases: &PhaseList) -> String {
    let mut out = String::from("hypcomp synthetic picks\n");
    for s in geometry.stations() {
        for phase in phases.names() {
            out.push_str(&format!(
                "{:<5} {:<8} 1970  1  1  0  0  0.000   0.100\n",
                s.station.name, phase
            ));
        }
    }
    out.push_str("STOP\n");
    out
}

/// Parse the arrival table of a HYPOMOD run.
///
/// Rows between the `Stat` header and the `Travel-time differences:` line
/// whose first token is a station of `geometry` yield a record with delta
/// (token 1, degrees), phase (token 3) and travel time `-residual`
/// (token 7).
pub fn parse_hypomod_output(
    solver: &str,
    text: &str,
    geometry: &Geometry,
) -> Result<Vec<TravelTimeRecord>> {
    let mut lines = text.lines().skip_while(|l| !l.contains(TABLE_START));
    if lines.next().is_none() {
        return Err(CompError::parse(solver, "", "no arrival table header ('Stat') found"));
    }

    let mut records = Vec::new();
    let mut terminated = false;
    for line in lines {
        if line.contains(TABLE_END) {
            terminated = true;
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&station) = tokens.first() else {
            continue;
        };
        if geometry.station(station).is_none() {
            continue;
        }
        if tokens.len() < MIN_ROW_TOKENS {
            return Err(CompError::parse(solver, line, "arrival row has too few columns"));
        }
        let delta: f64 = tokens[1]
            .parse()
            .map_err(|_| CompError::parse(solver, line, "invalid delta in column 1"))?;
        let residual: f64 = tokens[7]
            .parse()
            .map_err(|_| CompError::parse(solver, line, "invalid residual in column 7"))?;
        records.push(TravelTimeRecord {
            station: station.to_string(),
            phase: tokens[3].to_string(),
            time: -residual,
            distance: delta,
            unit: DistanceUnit::Degrees,
        });
    }

    if !terminated {
        return Err(CompError::parse(
            solver,
            "",
            "arrival table is not terminated by 'Travel-time differences:'",
        ));
    }
    Ok(records)
}

impl SolverAdapter for HypomodAdapter {
    fn name(&self) -> &str {
        "hypomod"
    }

    fn render(&self, workdir: &Path, geometry: &Geometry, phases: &PhaseList) -> Result<()> {
        info!("=> generate input files for HYPOMOD..");
        write_artifact(self.name(), &workdir.join(PARAMETER_FILE), &render_parameters(geometry))?;
        write_artifact(
            self.name(),
            &workdir.join(MODEL_FILE),
            &render_local_model(geometry.velocity()),
        )?;
        write_artifact(self.name(), &workdir.join(STATION_FILE), &render_stations(geometry)?)?;
        write_artifact(self.name(), &workdir.join(INPUT_FILE), &render_picks(geometry, phases))
    }

    fn invoke(
        &self,
        workdir: &Path,
        _geometry: &Geometry,
        timeout: Duration,
    ) -> Result<Vec<SolverRun>> {
        info!("hypomod: calculating travel times..");
        let stdout = run_process(self.name(), &self.binary, &[], workdir, timeout)?;
        debug!("hypomod: {} output lines", stdout.lines().count());
        Ok(vec![SolverRun {
            station: None,
            stdout,
        }])
    }

    fn parse(&self, run: &SolverRun, geometry: &Geometry) -> Result<Vec<TravelTimeRecord>> {
        parse_hypomod_output(self.name(), &run.stdout, geometry)
    }
}
