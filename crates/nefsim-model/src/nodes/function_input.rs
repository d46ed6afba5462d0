// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Real-valued input node driven by functions of simulation time.

use crate::error::{SimulationError, StructuralError};
use crate::node::{Node, SimulationMode};
use crate::output::{InstantaneousOutput, OutputKind, Units};
use crate::ports::{Origin, Termination};

/// The single origin every [`FunctionInput`] exposes.
pub const FUNCTION_INPUT_ORIGIN: &str = "origin";

/// One scalar function of simulation time.
pub type TimeFunction = Box<dyn Fn(f32) -> f32 + Send>;

/// A node whose output is a vector of time functions evaluated at the end of
/// each step. Has no terminations and one origin named
/// [`FUNCTION_INPUT_ORIGIN`], one dimension per function.
pub struct FunctionInput {
    name: String,
    functions: Vec<TimeFunction>,
    units: Units,
    origin: Origin,
    mode: SimulationMode,
    time: f32,
}

impl FunctionInput {
    pub fn new(name: impl Into<String>, functions: Vec<TimeFunction>, units: Units) -> Self {
        let dimension = functions.len();
        let mut origin = Origin::new(FUNCTION_INPUT_ORIGIN, dimension, OutputKind::Real);
        let initial: Vec<f32> = functions.iter().map(|f| f(0.0)).collect();
        // Dimension matches by construction.
        let _ = origin.set_value(InstantaneousOutput::Real {
            values: initial,
            units,
            time: 0.0,
        });
        Self {
            name: name.into(),
            functions,
            units,
            origin,
            mode: SimulationMode::Default,
            time: 0.0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.functions.len()
    }
}

impl Node for FunctionInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, _start: f32, end: f32) -> Result<(), SimulationError> {
        let values: Vec<f32> = self.functions.iter().map(|f| f(end)).collect();
        self.origin.set_value(InstantaneousOutput::Real {
            values,
            units: self.units,
            time: end,
        })?;
        self.time = end;
        Ok(())
    }

    fn origin(&self, name: &str) -> Result<&Origin, StructuralError> {
        if name == FUNCTION_INPUT_ORIGIN {
            Ok(&self.origin)
        } else {
            Err(StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn origin_mut(&mut self, name: &str) -> Result<&mut Origin, StructuralError> {
        if name == FUNCTION_INPUT_ORIGIN {
            Ok(&mut self.origin)
        } else {
            Err(StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn origins(&self) -> Vec<&Origin> {
        vec![&self.origin]
    }

    fn termination(&self, name: &str) -> Result<&Termination, StructuralError> {
        Err(StructuralError::UnknownTermination {
            node: self.name.clone(),
            name: name.to_string(),
        })
    }

    fn termination_mut(&mut self, name: &str) -> Result<&mut Termination, StructuralError> {
        Err(StructuralError::UnknownTermination {
            node: self.name.clone(),
            name: name.to_string(),
        })
    }

    fn terminations(&self) -> Vec<&Termination> {
        Vec::new()
    }

    fn mode(&self) -> SimulationMode {
        self.mode
    }

    fn set_mode(&mut self, mode: SimulationMode) {
        self.mode = mode;
    }

    fn set_time(&mut self, time: f32) {
        self.time = time;
    }
}
