// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::info;

use crate::error::{CompError, Result};
use crate::geometry::{Earthquake, ReferencePoint, Station};
use crate::orchestrator::AlignedTable;
use crate::solver::TravelTimeRecord;
use crate::velocity::{VelocityLayer, VelocityModel};

/// The raw contents of a geometry description file.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDescription {
    /// The `R` record.
    pub reference: ReferencePoint,
    /// The `S` records, in file order.
    pub stations: Vec<Station>,
    /// The `E` record.
    pub earthquake: Earthquake,
}

/// Ordered list of phase names requested from the solvers.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseList {
    names: Vec<String>,
}

impl PhaseList {
    /// Create a phase list.
    ///
    /// # Errors
    /// Returns a configuration error if `names` is empty.
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(CompError::Configuration("phase list is empty".to_string()));
        }
        Ok(PhaseList { names })
    }

    /// The phase names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Lines of a text file that carry data: trimmed, without blanks and `#` comments,
/// paired with their 1-based line number.
fn data_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

fn parse_number(field: &str, lineno: usize, what: &str) -> Result<f64> {
    let value: f64 = field.trim().parse().map_err(|_| {
        CompError::Configuration(format!("line {}: invalid {} '{}'", lineno, what, field))
    })?;
    if !value.is_finite() {
        return Err(CompError::Configuration(format!(
            "line {}: {} '{}' is not finite",
            lineno, what, field
        )));
    }
    Ok(value)
}

fn expect_fields(fields: &[&str], n: usize, lineno: usize, layout: &str) -> Result<()> {
    if fields.len() != n {
        return Err(CompError::Configuration(format!(
            "line {}: expected '{}', got {} fields",
            lineno,
            layout,
            fields.len()
        )));
    }
    Ok(())
}

/// Parse a geometry description.
///
/// Records are `R,<label>,<lon>,<lat>`, `S,<name>,<x_km>,<y_km>,<elev_km>` and
/// `E,<x_km>,<y_km>,<depth_km>`. Exactly one `R` and one `E` and at least one
/// `S` are required.
pub fn parse_geometry(text: &str) -> Result<GeometryDescription> {
    let mut reference: Option<ReferencePoint> = None;
    let mut stations = Vec::new();
    let mut earthquake: Option<Earthquake> = None;

    for (lineno, line) in data_lines(text) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        match fields[0] {
            "R" => {
                expect_fields(&fields, 4, lineno, "R,<label>,<lon>,<lat>")?;
                if reference.is_some() {
                    return Err(CompError::Configuration(format!(
                        "line {}: reference already set",
                        lineno
                    )));
                }
                reference = Some(ReferencePoint {
                    label: fields[1].to_string(),
                    lon: parse_number(fields[2], lineno, "longitude")?,
                    lat: parse_number(fields[3], lineno, "latitude")?,
                });
            }
            "S" => {
                expect_fields(&fields, 5, lineno, "S,<name>,<x_km>,<y_km>,<elev_km>")?;
                stations.push(Station::new(
                    fields[1],
                    parse_number(fields[2], lineno, "x")?,
                    parse_number(fields[3], lineno, "y")?,
                    parse_number(fields[4], lineno, "elevation")?,
                ));
            }
            "E" => {
                expect_fields(&fields, 4, lineno, "E,<x_km>,<y_km>,<depth_km>")?;
                if earthquake.is_some() {
                    return Err(CompError::Configuration(format!(
                        "line {}: earthquake already set",
                        lineno
                    )));
                }
                earthquake = Some(Earthquake::new(
                    parse_number(fields[1], lineno, "x")?,
                    parse_number(fields[2], lineno, "y")?,
                    parse_number(fields[3], lineno, "depth")?,
                ));
            }
            tag => {
                return Err(CompError::Configuration(format!(
                    "line {}: unknown record tag '{}'",
                    lineno, tag
                )))
            }
        }
    }

    let reference =
        reference.ok_or_else(|| CompError::Configuration("no reference specified".to_string()))?;
    if stations.is_empty() {
        return Err(CompError::Configuration("no stations specified".to_string()));
    }
    let earthquake = earthquake
        .ok_or_else(|| CompError::Configuration("no earthquake specified".to_string()))?;

    Ok(GeometryDescription {
        reference,
        stations,
        earthquake,
    })
}

/// Load a geometry description file.
pub fn load_geometry_file(path: &Path) -> Result<GeometryDescription> {
    info!("loading geometry: {}..", path.display());
    parse_geometry(&fs::read_to_string(path)?)
}

/// Parse velocity samples: `<depth>,<vp>,<vs>[,<marker>]` per line.
pub fn parse_velocity(text: &str) -> Result<Vec<VelocityLayer>> {
    let mut samples = Vec::new();
    for (lineno, line) in data_lines(text) {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 && fields.len() != 4 {
            return Err(CompError::Configuration(format!(
                "line {}: expected '<depth>,<vp>,<vs>[,<marker>]', got {} fields",
                lineno,
                fields.len()
            )));
        }
        samples.push(VelocityLayer::new(
            parse_number(fields[0], lineno, "depth")?,
            parse_number(fields[1], lineno, "vp")?,
            parse_number(fields[2], lineno, "vs")?,
            fields.get(3).copied().unwrap_or(""),
        ));
    }
    Ok(samples)
}

/// Load and normalize a velocity model file.
pub fn load_velocity_file(path: &Path) -> Result<VelocityModel> {
    info!("loading velocity model: {}.. (km and km/s)", path.display());
    let model = VelocityModel::normalize(parse_velocity(&fs::read_to_string(path)?)?)?;
    for l in model.layers() {
        info!(
            "  depth: {:>6}, velp: {:>5}, vels: {:>5} ({})",
            l.depth, l.vp, l.vs, l.marker
        );
    }
    Ok(model)
}

/// Parse a phase list: names separated by whitespace or commas.
pub fn parse_phase_list(text: &str) -> Result<PhaseList> {
    let names = data_lines(text)
        .flat_map(|(_, line)| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    PhaseList::new(names)
}

/// Load a phase list file.
pub fn load_phase_list(path: &Path) -> Result<PhaseList> {
    info!("loading phase list: {}..", path.display());
    parse_phase_list(&fs::read_to_string(path)?)
}

/// Render travel-time records as CSV with columns `station,phase,time,distance`.
pub fn format_travel_times(records: &[TravelTimeRecord]) -> String {
    let mut out = String::from("station,phase,time,distance\n");
    for r in records {
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{},{},{},{}", r.station, r.phase, r.time, r.distance);
    }
    out
}

/// Write travel-time records to a CSV file.
pub fn write_travel_times(path: &Path, records: &[TravelTimeRecord]) -> Result<()> {
    let mut w = std::io::BufWriter::new(fs::File::create(path)?);
    w.write_all(format_travel_times(records).as_bytes())?;
    w.flush()?;
    Ok(())
}

/// Render an aligned table as CSV with columns
/// `distance,station,phase,<one time column per adapter>`; missing times are empty.
pub fn format_aligned_table(table: &AlignedTable) -> String {
    let mut out = String::from("distance,station,phase");
    for name in &table.adapters {
        out.push(',');
        out.push_str(name);
    }
    out.push('\n');

    for row in &table.rows {
        let _ = write!(out, "{},{},{}", row.distance, row.station, row.phase);
        for t in &row.times {
            match t {
                Some(t) => {
                    let _ = write!(out, ",{}", t);
                }
                None => out.push(','),
            }
        }
        out.push('\n');
    }
    out
}

/// Write an aligned table to a CSV file.
pub fn write_aligned_table(path: &Path, table: &AlignedTable) -> Result<()> {
    let mut w = std::io::BufWriter::new(fs::File::create(path)?);
    w.write_all(format_aligned_table(table).as_bytes())?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::AlignedRow;
    use crate::solver::DistanceUnit;

    const GEOMETRY: &str = "\
# test geometry
R,origin,15.0,78.0

S,STA1,10.0,10.0,0.1
S, STA2 , -5.0, 20.0, 0.0
E,10.0,2.0,-20.0
";

    #[test]
    fn geometry_file_parses() {
        let g = parse_geometry(GEOMETRY).unwrap();
        assert_eq!(g.reference.label, "origin");
        assert_eq!(g.reference.lon, 15.0);
        assert_eq!(g.stations.len(), 2);
        assert_eq!(g.stations[1].name, "STA2");
        assert_eq!(g.stations[1].x, -5.0);
        assert_eq!(g.earthquake, Earthquake::new(10.0, 2.0, -20.0));
    }

    #[test]
    fn geometry_requires_all_records() {
        let no_ref = "S,A,1,1,0\nE,0,0,-5\n";
        let no_sta = "R,x,0,0\nE,0,0,-5\n";
        let no_eq = "R,x,0,0\nS,A,1,1,0\n";
        for text in [no_ref, no_sta, no_eq] {
            assert!(matches!(
                parse_geometry(text),
                Err(CompError::Configuration(_))
            ));
        }
    }

    #[test]
    fn geometry_rejects_duplicates_and_garbage() {
        let two_refs = "R,x,0,0\nR,y,1,1\nS,A,1,1,0\nE,0,0,-5\n";
        let two_eqs = "R,x,0,0\nS,A,1,1,0\nE,0,0,-5\nE,1,1,-5\n";
        let bad_num = "R,x,0,zero\nS,A,1,1,0\nE,0,0,-5\n";
        let bad_tag = "R,x,0,0\nQ,1\nS,A,1,1,0\nE,0,0,-5\n";
        let short = "R,x,0,0\nS,A,1,1\nE,0,0,-5\n";
        for text in [two_refs, two_eqs, bad_num, bad_tag, short] {
            assert!(matches!(
                parse_geometry(text),
                Err(CompError::Configuration(_))
            ));
        }
    }

    #[test]
    fn velocity_file_parses_markers() {
        let text = "# depth,vp,vs,marker\n0,1.5,1.5,seafloor\n3,5.8,3.2,\n20,5.8,3.2,CONR\n20,6.5,3.6\n";
        let samples = parse_velocity(text).unwrap();
        assert_eq!(samples.len(), 4);
        let model = VelocityModel::normalize(samples).unwrap();
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn velocity_file_rejects_short_rows() {
        assert!(matches!(
            parse_velocity("0,1.5\n"),
            Err(CompError::Configuration(_))
        ));
    }

    #[test]
    fn phase_list_splits_on_commas_and_whitespace() {
        let list = parse_phase_list("# phases\np, s\nPn Sn\n\n").unwrap();
        assert_eq!(list.names(), &["p", "s", "Pn", "Sn"]);
        assert!(matches!(
            parse_phase_list("# nothing\n"),
            Err(CompError::Configuration(_))
        ));
    }

    #[test]
    fn travel_time_csv_layout() {
        let records = vec![TravelTimeRecord {
            station: "STA".to_string(),
            phase: "p".to_string(),
            time: 4.25,
            distance: 0.09,
            unit: DistanceUnit::Degrees,
        }];
        assert_eq!(
            format_travel_times(&records),
            "station,phase,time,distance\nSTA,p,4.25,0.09\n"
        );
    }

    #[test]
    fn aligned_csv_leaves_gaps_empty() {
        let table = AlignedTable {
            adapters: vec!["taup".to_string(), "hypomod".to_string()],
            rows: vec![AlignedRow {
                station: "STA".to_string(),
                phase: "P".to_string(),
                distance: 10.0,
                times: vec![Some(2.5), None],
            }],
            unmatched: Vec::new(),
        };
        assert_eq!(
            format_aligned_table(&table),
            "distance,station,phase,taup,hypomod\n10,STA,P,2.5,\n"
        );
    }

    #[test]
    fn write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ttimes.csv");
        write_travel_times(&path, &[]).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "station,phase,time,distance\n"
        );
    }
}
