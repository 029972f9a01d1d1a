// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while building a geometry, rendering solver input,
/// running a solver, or reading its output.
#[derive(Debug, Error)]
pub enum CompError {
    /// Geometry, velocity or phase input is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Planar and ellipsoidal distances disagree beyond the tolerance.
    #[error(
        "consistency error: {from} -> {to}: planar {planar_km} km, ellipsoidal {ellipsoidal_km} km (rtol {rtol})"
    )]
    Consistency {
        /// Name of the first point.
        from: String,
        /// Name of the second point.
        to: String,
        /// Euclidean distance between the local offsets.
        planar_km: f64,
        /// Inverse-geodesic distance between the derived positions.
        ellipsoidal_km: f64,
        /// The relative tolerance that was exceeded.
        rtol: f64,
    },

    /// A coordinate string could not be decoded.
    #[error("format error in '{input}': {reason}")]
    Format {
        /// The offending input.
        input: String,
        /// Explanation of what was wrong.
        reason: String,
    },

    /// An argument outside the accepted set was passed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Solver input files could not be produced.
    #[error("{solver}: render failed: {reason}")]
    Render {
        /// The adapter name.
        solver: String,
        /// Explanation of the failure.
        reason: String,
    },

    /// The solver process could not be launched or exited unsuccessfully.
    #[error("{solver}: invocation failed: {detail}")]
    Invocation {
        /// The adapter or program name.
        solver: String,
        /// Exit status and captured stderr, or the launch error.
        detail: String,
    },

    /// The solver process did not finish within the caller's timeout.
    #[error("{solver}: timed out after {:.1} s", .timeout.as_secs_f64())]
    Timeout {
        /// The adapter or program name.
        solver: String,
        /// The timeout that expired.
        timeout: Duration,
    },

    /// Solver output did not have the expected layout.
    #[error("{solver}: parse error: {reason} (line: '{line}')")]
    Parse {
        /// The adapter name.
        solver: String,
        /// The offending line, or empty when a marker was missing.
        line: String,
        /// Explanation of what was expected.
        reason: String,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompError {
    pub(crate) fn format(input: &str, reason: impl Into<String>) -> Self {
        CompError::Format {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(solver: &str, line: &str, reason: impl Into<String>) -> Self {
        CompError::Parse {
            solver: solver.to_string(),
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn render(solver: &str, reason: impl std::fmt::Display) -> Self {
        CompError::Render {
            solver: solver.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures of a single solver run (the sweep carries on).
    pub fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            CompError::Render { .. }
                | CompError::Invocation { .. }
                | CompError::Timeout { .. }
                | CompError::Parse { .. }
        )
    }
}

/// Convenience type alias for Results with CompError.
pub type Result<T> = std::result::Result<T, CompError>;
