// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for graph construction and simulation.

use nefsim_dynamics::DynamicsError;

/// Structural configuration errors: dimension mismatches, unknown port names,
/// duplicate projections, missing graph entries. Raised synchronously at
/// setup/partitioning time, never mid-step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructuralError {
    #[error("node '{node}' has no origin named '{name}'")]
    UnknownOrigin { node: String, name: String },

    #[error("node '{node}' has no termination named '{name}'")]
    UnknownTermination { node: String, name: String },

    #[error("no node named '{0}'")]
    UnknownNode(String),

    #[error("a node named '{0}' already exists")]
    DuplicateNode(String),

    #[error("node '{node}' already has a port named '{name}'")]
    DuplicatePort { node: String, name: String },

    #[error("exposed port '{0}' does not resolve to a concrete port")]
    UnresolvedAlias(String),

    #[error("an exposed port named '{0}' already exists")]
    DuplicateAlias(String),

    #[error("node '{0}' is not part of the partitioned node set")]
    NodeNotInSet(String),

    #[error("node '{0}' is flagged for the device but carries no device profile")]
    MissingDeviceProfile(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("transform must be {rows}x{cols}, got {got_rows}x{got_cols}")]
    BadTransform {
        rows: usize,
        cols: usize,
        got_rows: usize,
        got_cols: usize,
    },

    #[error("duplicate projection onto '{termination}' from '{origin}'")]
    DuplicateProjection { origin: String, termination: String },

    #[error("step size must be positive, got {0}")]
    InvalidTimeStep(f32),
}

/// Simulation-level failures. Structural errors fold in; numerical errors
/// carry the failing node; device errors are fatal mid-run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("numerical failure in node '{node}': {source}")]
    Numerical {
        node: String,
        #[source]
        source: DynamicsError,
    },

    #[error("device failure: {0}")]
    Device(String),
}
