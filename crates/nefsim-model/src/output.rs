// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Instantaneous Output
//!
//! The tagged value carried from an origin to a termination at a point in
//! simulation time. The variant set is closed: every consumer matches
//! exhaustively, and a consumer that cannot handle a variant skips it with a
//! warning rather than failing the step.

/// Physical units attached to real-valued output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// Unknown or dimensionless
    Unk,
    /// Current units
    Acu,
    /// Voltage units
    Avu,
    Spikes,
    SpikesPerSecond,
}

/// The output variant an origin declares at construction. The declared kind
/// is fixed for the origin's lifetime; writers that produce a different
/// variant are rejected at the write site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Real,
    Spikes,
    PreciseSpikes,
}

/// One port value at one instant.
#[derive(Debug, Clone, PartialEq)]
pub enum InstantaneousOutput {
    /// Real-valued vector, e.g. a decoded variable or an input function.
    Real {
        values: Vec<f32>,
        units: Units,
        time: f32,
    },
    /// Boolean spike raster for one instant, one flag per neuron.
    Spikes { values: Vec<bool>, time: f32 },
    /// Exact spike times within the step, one entry per neuron; a negative
    /// entry means the neuron did not fire.
    PreciseSpikes { spike_times: Vec<f32>, time: f32 },
}

impl InstantaneousOutput {
    /// Zero-valued output of the given kind, used to initialize ports.
    pub fn zero(kind: OutputKind, dimension: usize) -> Self {
        match kind {
            OutputKind::Real => Self::Real {
                values: vec![0.0; dimension],
                units: Units::Unk,
                time: 0.0,
            },
            OutputKind::Spikes => Self::Spikes {
                values: vec![false; dimension],
                time: 0.0,
            },
            OutputKind::PreciseSpikes => Self::PreciseSpikes {
                spike_times: vec![-1.0; dimension],
                time: 0.0,
            },
        }
    }

    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Real { .. } => OutputKind::Real,
            Self::Spikes { .. } => OutputKind::Spikes,
            Self::PreciseSpikes { .. } => OutputKind::PreciseSpikes,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Real { values, .. } => values.len(),
            Self::Spikes { values, .. } => values.len(),
            Self::PreciseSpikes { spike_times, .. } => spike_times.len(),
        }
    }

    pub fn time(&self) -> f32 {
        match self {
            Self::Real { time, .. }
            | Self::Spikes { time, .. }
            | Self::PreciseSpikes { time, .. } => *time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_matches_declared_kind_and_dimension() {
        for kind in [OutputKind::Real, OutputKind::Spikes, OutputKind::PreciseSpikes] {
            let value = InstantaneousOutput::zero(kind, 3);
            assert_eq!(value.kind(), kind);
            assert_eq!(value.dimension(), 3);
            assert_eq!(value.time(), 0.0);
        }
    }
}
