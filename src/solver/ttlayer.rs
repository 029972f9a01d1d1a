// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{CompError, Result};
use crate::geometry::Geometry;
use crate::io::PhaseList;
use crate::process::run_process;
use crate::solver::{write_artifact, SolverAdapter, SolverRun, TravelTimeRecord};

const PARAMETER_FILE: &str = "mp.hyp";

/// HYPOCENTER test parameters tuned for local events recorded on a small
/// array.
const RESET_TESTS: &[(u8, &str)] = &[
    (2, "500.0"),
    (7, "-3.0"),
    (8, "2.6"),
    (9, "0.001"),
    (11, "99.0"),
    (13, "5.0"),
    (34, "1.5"),
    (35, "2.5"),
    (36, "0.0"),
    (41, "20000.0"),
    (43, "5.0"),
    (51, "3.6"),
    (50, "1.0"),
    (56, " 1.0"),
    (58, " 99990.0"),
    (40, "0.0"),
    (60, "0.0"),
    (71, "1.0"),
    (75, "1.0"),
    (76, "0.910"),
    (77, "0.00087"),
    (78, "-1.67"),
    (79, "1.0"),
    (80, "3.0"),
    (81, "1.0"),
    (82, "1.0"),
    (83, "1.0"),
    (88, "1.0"),
    (85, "0.1"),
    (91, "0.1"),
];

/// Drives TTLAYER, the forward-modelling companion of HYPOCENTER.
///
/// Only the parameter block of `mp.hyp` is produced; the station and velocity
/// sections are not written yet and no output is parsed.
#[derive(Debug, Clone)]
pub struct TtlayerAdapter {
    binary: String,
}

impl Default for TtlayerAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlayerAdapter {
    /// Adapter using `ttlayer` from the search path.
    pub fn new() -> Self {
        TtlayerAdapter {
            binary: "ttlayer".to_string(),
        }
    }

    /// Use another executable (builder method).
    pub fn with_binary(mut self, binary: &str) -> Self {
        self.binary = binary.to_string();
        self
    }
}

/// Render the `RESET TEST` block followed by two blank lines.
pub fn render_parameter_block() -> String {
    let mut out = String::new();
    for (test, value) in RESET_TESTS {
        out.push_str(&format!("RESET TEST({:02})={}\n", test, value));
    }
    out.push_str("\n\n");
    out
}

impl SolverAdapter for TtlayerAdapter {
    fn name(&self) -> &str {
        "ttlayer"
    }

    fn render(&self, workdir: &Path, _geometry: &Geometry, _phases: &PhaseList) -> Result<()> {
        debug!("ttlayer: ..set up standard parameters");
        // TODO: write the velocity model and station lines once the mp.hyp
        // section layout for TTLAYER is confirmed against a reference run.
        warn!("ttlayer: velocity model section not written");
        warn!("ttlayer: station section not written");
        write_artifact(self.name(), &workdir.join(PARAMETER_FILE), &render_parameter_block())
    }

    fn invoke(
        &self,
        workdir: &Path,
        _geometry: &Geometry,
        timeout: Duration,
    ) -> Result<Vec<SolverRun>> {
        info!("ttlayer: running {}", self.binary);
        let stdout = run_process(self.name(), &self.binary, &[], workdir, timeout)?;
        Ok(vec![SolverRun {
            station: None,
            stdout,
        }])
    }

    fn parse(&self, run: &SolverRun, _geometry: &Geometry) -> Result<Vec<TravelTimeRecord>> {
        let first = run.stdout.lines().next().unwrap_or("");
        Err(CompError::parse(
            self.name(),
            first,
            "reading ttlayer output is not supported",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Earthquake, ReferencePoint, Station};
    use crate::velocity::{VelocityLayer, VelocityModel};

    #[test]
    fn parameter_block_layout() {
        let block = render_parameter_block();
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), RESET_TESTS.len() + 2);
        assert_eq!(lines[0], "RESET TEST(02)=500.0");
        assert_eq!(lines[13], "RESET TEST(56)= 1.0");
        assert_eq!(lines[14], "RESET TEST(58)= 99990.0");
        assert_eq!(lines[29], "RESET TEST(91)=0.1");
        assert!(block.ends_with("RESET TEST(91)=0.1\n\n\n"));
    }

    #[test]
    fn output_is_never_turned_into_records() {
        let geometry = Geometry::setup(
            ReferencePoint {
                label: "REF".to_string(),
                lon: 0.0,
                lat: 0.0,
            },
            vec![Station::new("STA", 0.0, 10.0, 0.0)],
            Earthquake::new(0.0, 0.0, -5.0),
            VelocityModel::normalize(vec![VelocityLayer::new(0.0, 5.8, 3.2, "")]).unwrap(),
        )
        .unwrap();
        let run = SolverRun {
            station: None,
            stdout: "STA P 3.1\n".to_string(),
        };
        let result = TtlayerAdapter::new().parse(&run, &geometry);
        assert!(matches!(result, Err(CompError::Parse { .. })));
    }
}
