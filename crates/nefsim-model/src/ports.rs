// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Ports
//!
//! Origins (outputs) and terminations (inputs). Each port is owned by exactly
//! one node; projections reference ports by node/port name and never own them.

use ndarray::Array2;

use crate::error::StructuralError;
use crate::output::{InstantaneousOutput, OutputKind};

/// A named output port of fixed dimension and declared output kind. Holds the
/// most recent value produced by its node; readers see the previous step's
/// value until the owning node refreshes it.
#[derive(Debug, Clone)]
pub struct Origin {
    name: String,
    dimension: usize,
    kind: OutputKind,
    value: InstantaneousOutput,
}

impl Origin {
    pub fn new(name: impl Into<String>, dimension: usize, kind: OutputKind) -> Self {
        Self {
            name: name.into(),
            dimension,
            kind,
            value: InstantaneousOutput::zero(kind, dimension),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn value(&self) -> &InstantaneousOutput {
        &self.value
    }

    /// Replace the held value. The new value's dimension must match the
    /// port's; the kind is not checked here so that writers can decide
    /// whether a kind mismatch is fatal or skippable.
    pub fn set_value(&mut self, value: InstantaneousOutput) -> Result<(), StructuralError> {
        if value.dimension() != self.dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: self.dimension,
                actual: value.dimension(),
            });
        }
        self.value = value;
        Ok(())
    }
}

/// A named input port with first-order synaptic dynamics (time constant
/// `tau`) and an optional linear transform applied to incoming values.
///
/// The transform maps the termination's dimension onto the owning node's
/// input dimension: `rows = node dimension`, `cols = termination dimension`.
/// Shape is validated by the owning node when the termination is attached.
#[derive(Debug, Clone)]
pub struct Termination {
    name: String,
    dimension: usize,
    tau: f32,
    transform: Option<Array2<f32>>,
    input: Option<InstantaneousOutput>,
}

impl Termination {
    pub fn new(name: impl Into<String>, dimension: usize, tau: f32) -> Self {
        Self {
            name: name.into(),
            dimension,
            tau,
            transform: None,
            input: None,
        }
    }

    /// Termination whose dimension is the transform's column count.
    pub fn with_transform(name: impl Into<String>, tau: f32, transform: Array2<f32>) -> Self {
        Self {
            name: name.into(),
            dimension: transform.ncols(),
            tau,
            transform: Some(transform),
            input: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn tau(&self) -> f32 {
        self.tau
    }

    pub fn transform(&self) -> Option<&Array2<f32>> {
        self.transform.as_ref()
    }

    /// Most recent value delivered by a projection, if any.
    pub fn input(&self) -> Option<&InstantaneousOutput> {
        self.input.as_ref()
    }

    pub fn set_input(&mut self, value: InstantaneousOutput) -> Result<(), StructuralError> {
        if value.dimension() != self.dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: self.dimension,
                actual: value.dimension(),
            });
        }
        self.input = Some(value);
        Ok(())
    }
}
