// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Ensemble
//!
//! The leaf simulation unit: decoded terminations feed first-order synaptic
//! filters whose summed output drives optional body dynamics, and pluggable
//! decode functions refresh the real-valued origins at each sync point. The
//! population-coding math itself (tuning curves, decoder solving) lives
//! outside this crate; ensembles only carry the resulting matrices, which is
//! also exactly what the accelerator needs from them.

use ndarray::{Array2, ArrayView1};
use tracing::warn;

use nefsim_dynamics::{
    DynamicalSystem, EulerIntegrator, Integrator, LtiSystem, Rk45Integrator, TimeSeries,
};

use crate::error::{SimulationError, StructuralError};
use crate::node::{
    DeviceOriginProfile, DeviceProfile, DeviceTerminationProfile, Node, SimulationMode,
};
use crate::output::{InstantaneousOutput, OutputKind, Units};
use crate::ports::{Origin, Termination};

/// Maps a sync-point time and the represented state to one origin's values.
pub type DecodeFn = Box<dyn Fn(f32, &[f32]) -> Vec<f32> + Send>;

struct FilteredTermination {
    termination: Termination,
    filter: LtiSystem,
}

struct DecodedOrigin {
    origin: Origin,
    decode: Option<DecodeFn>,
    /// `neuron_count x dimension`, present when this origin can be computed
    /// on a device.
    decoders: Option<Array2<f32>>,
}

struct NeuronData {
    encoders: Array2<f32>,
    gain: Vec<f32>,
    bias: Vec<f32>,
}

struct Body {
    system: Box<dyn DynamicalSystem>,
    integrator: Rk45Integrator,
}

pub struct Ensemble {
    name: String,
    dimension: usize,
    radius: f32,
    neurons: Option<NeuronData>,
    device_enabled: bool,
    mode: SimulationMode,
    time: f32,
    max_time_step: f32,
    filter_step: f32,
    terminations: Vec<FilteredTermination>,
    origins: Vec<DecodedOrigin>,
    body: Option<Body>,
}

impl Ensemble {
    /// An ensemble without neuron data. Never device-eligible; steps entirely
    /// through its filters, body dynamics, and decode functions.
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            radius: 1.0,
            neurons: None,
            device_enabled: true,
            mode: SimulationMode::Default,
            time: 0.0,
            max_time_step: 1e-3,
            filter_step: 1e-4,
            terminations: Vec::new(),
            origins: Vec::new(),
            body: None,
        }
    }

    /// An ensemble carrying flattened neuron data, eligible for device
    /// offload. `encoders` is `neuron_count x dimension`; `gain` and `bias`
    /// hold one entry per neuron.
    pub fn with_neurons(
        name: impl Into<String>,
        dimension: usize,
        radius: f32,
        encoders: Array2<f32>,
        gain: Vec<f32>,
        bias: Vec<f32>,
    ) -> Result<Self, StructuralError> {
        if encoders.ncols() != dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: dimension,
                actual: encoders.ncols(),
            });
        }
        let neuron_count = encoders.nrows();
        if gain.len() != neuron_count || bias.len() != neuron_count {
            return Err(StructuralError::DimensionMismatch {
                expected: neuron_count,
                actual: gain.len().min(bias.len()),
            });
        }
        let mut ensemble = Self::new(name, dimension);
        ensemble.radius = radius;
        ensemble.neurons = Some(NeuronData {
            encoders,
            gain,
            bias,
        });
        Ok(ensemble)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn neuron_count(&self) -> usize {
        self.neurons.as_ref().map_or(0, |n| n.encoders.nrows())
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Opt this ensemble out of (or back into) device offload.
    pub fn set_device_enabled(&mut self, enabled: bool) {
        self.device_enabled = enabled;
    }

    pub fn set_max_time_step(&mut self, max_time_step: f32) {
        self.max_time_step = max_time_step;
    }

    fn check_new_port(&self, name: &str) -> Result<(), StructuralError> {
        let taken = self
            .terminations
            .iter()
            .any(|t| t.termination.name() == name)
            || self.origins.iter().any(|o| o.origin.name() == name);
        if taken {
            return Err(StructuralError::DuplicatePort {
                node: self.name.clone(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Add an untransformed termination; its dimension must match the
    /// ensemble's.
    pub fn add_termination(
        &mut self,
        name: &str,
        dimension: usize,
        tau: f32,
    ) -> Result<(), StructuralError> {
        self.check_new_port(name)?;
        if dimension != self.dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: self.dimension,
                actual: dimension,
            });
        }
        self.terminations.push(FilteredTermination {
            termination: Termination::new(name, dimension, tau),
            filter: LtiSystem::synaptic_filter(tau, self.dimension),
        });
        Ok(())
    }

    /// Add a termination whose incoming values pass through `transform`
    /// (`ensemble_dimension x termination_dimension`) before filtering.
    pub fn add_transformed_termination(
        &mut self,
        name: &str,
        transform: Array2<f32>,
        tau: f32,
    ) -> Result<(), StructuralError> {
        self.check_new_port(name)?;
        if transform.nrows() != self.dimension {
            return Err(StructuralError::BadTransform {
                rows: self.dimension,
                cols: transform.ncols(),
                got_rows: transform.nrows(),
                got_cols: transform.ncols(),
            });
        }
        self.terminations.push(FilteredTermination {
            filter: LtiSystem::synaptic_filter(tau, self.dimension),
            termination: Termination::with_transform(name, tau, transform),
        });
        Ok(())
    }

    /// Add a real-valued origin computed by `decode` at each sync point.
    /// Without decoders it cannot be moved to a device.
    pub fn add_decoded_origin(
        &mut self,
        name: &str,
        dimension: usize,
        decode: DecodeFn,
    ) -> Result<(), StructuralError> {
        self.check_new_port(name)?;
        self.origins.push(DecodedOrigin {
            origin: Origin::new(name, dimension, OutputKind::Real),
            decode: Some(decode),
            decoders: None,
        });
        Ok(())
    }

    /// Add a real-valued origin that also carries linear decoders
    /// (`neuron_count x dimension`) for device offload.
    pub fn add_decoded_origin_with_decoders(
        &mut self,
        name: &str,
        decoders: Array2<f32>,
        decode: DecodeFn,
    ) -> Result<(), StructuralError> {
        self.check_new_port(name)?;
        if decoders.nrows() != self.neuron_count() {
            return Err(StructuralError::DimensionMismatch {
                expected: self.neuron_count(),
                actual: decoders.nrows(),
            });
        }
        self.origins.push(DecodedOrigin {
            origin: Origin::new(name, decoders.ncols(), OutputKind::Real),
            decode: Some(decode),
            decoders: Some(decoders),
        });
        Ok(())
    }

    /// Add a raw spike-raster origin, one dimension per neuron. The CPU path
    /// never writes it; only a device session produces spike output.
    pub fn add_axon_origin(&mut self, name: &str) -> Result<(), StructuralError> {
        self.check_new_port(name)?;
        self.origins.push(DecodedOrigin {
            origin: Origin::new(name, self.neuron_count(), OutputKind::Spikes),
            decode: None,
            decoders: None,
        });
        Ok(())
    }

    /// Attach body dynamics advanced with the adaptive integrator between
    /// sync points. Input and output dimensions must both match the
    /// ensemble's.
    pub fn set_body_dynamics(
        &mut self,
        system: Box<dyn DynamicalSystem>,
    ) -> Result<(), StructuralError> {
        if system.input_dimension() != self.dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: self.dimension,
                actual: system.input_dimension(),
            });
        }
        if system.output_dimension() != self.dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: self.dimension,
                actual: system.output_dimension(),
            });
        }
        self.body = Some(Body {
            system,
            integrator: Rk45Integrator::default(),
        });
        Ok(())
    }
}

/// Incoming port values as a real vector: spike rasters count as 0/1,
/// precise spike times are not representable here and read as silence.
fn real_vector(value: &InstantaneousOutput, node: &str, port: &str) -> Vec<f32> {
    match value {
        InstantaneousOutput::Real { values, .. } => values.clone(),
        InstantaneousOutput::Spikes { values, .. } => {
            values.iter().map(|&s| if s { 1.0 } else { 0.0 }).collect()
        }
        InstantaneousOutput::PreciseSpikes { spike_times, .. } => {
            warn!(node, port, "precise spike input unsupported, reading as silence");
            vec![0.0; spike_times.len()]
        }
    }
}

impl Node for Ensemble {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, start: f32, end: f32) -> Result<(), SimulationError> {
        if end <= start {
            self.time = end;
            return Ok(());
        }
        let name = self.name.clone();
        let euler = EulerIntegrator::new(self.filter_step);

        // Advance each termination filter over the window; the summed filter
        // states form the input drive at the sync point.
        let mut drive = vec![0.0f32; self.dimension];
        for ft in &mut self.terminations {
            let raw = match ft.termination.input() {
                Some(value) => real_vector(value, &name, ft.termination.name()),
                None => vec![0.0; ft.termination.dimension()],
            };
            let driven = match ft.termination.transform() {
                Some(transform) => transform.dot(&ArrayView1::from(&raw[..])).to_vec(),
                None => raw,
            };
            let series = TimeSeries::constant(start, end, driven);
            euler
                .integrate(&mut ft.filter, &series)
                .map_err(|source| SimulationError::Numerical {
                    node: name.clone(),
                    source,
                })?;
            for (d, x) in drive.iter_mut().zip(ft.filter.state()) {
                *d += x;
            }
        }

        let represented = match &mut self.body {
            Some(body) => {
                let series = TimeSeries::constant(start, end, drive);
                body.integrator
                    .integrate(body.system.as_mut(), &series)
                    .map_err(|source| SimulationError::Numerical {
                        node: name.clone(),
                        source,
                    })?;
                body.system.g(end, body.system.state())
            }
            None => drive,
        };

        for decoded in &mut self.origins {
            if let Some(decode) = &decoded.decode {
                let values = decode(end, &represented);
                decoded.origin.set_value(InstantaneousOutput::Real {
                    values,
                    units: Units::Unk,
                    time: end,
                })?;
            }
        }

        self.time = end;
        Ok(())
    }

    fn origin(&self, name: &str) -> Result<&Origin, StructuralError> {
        self.origins
            .iter()
            .map(|o| &o.origin)
            .find(|o| o.name() == name)
            .ok_or_else(|| StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })
    }

    fn origin_mut(&mut self, name: &str) -> Result<&mut Origin, StructuralError> {
        let node = self.name.clone();
        self.origins
            .iter_mut()
            .map(|o| &mut o.origin)
            .find(|o| o.name() == name)
            .ok_or(StructuralError::UnknownOrigin {
                node,
                name: name.to_string(),
            })
    }

    fn origins(&self) -> Vec<&Origin> {
        self.origins.iter().map(|o| &o.origin).collect()
    }

    fn termination(&self, name: &str) -> Result<&Termination, StructuralError> {
        self.terminations
            .iter()
            .map(|t| &t.termination)
            .find(|t| t.name() == name)
            .ok_or_else(|| StructuralError::UnknownTermination {
                node: self.name.clone(),
                name: name.to_string(),
            })
    }

    fn termination_mut(&mut self, name: &str) -> Result<&mut Termination, StructuralError> {
        let node = self.name.clone();
        self.terminations
            .iter_mut()
            .map(|t| &mut t.termination)
            .find(|t| t.name() == name)
            .ok_or(StructuralError::UnknownTermination {
                node,
                name: name.to_string(),
            })
    }

    fn terminations(&self) -> Vec<&Termination> {
        self.terminations.iter().map(|t| &t.termination).collect()
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

    fn eligible_for_device(&self) -> bool {
        self.device_enabled && self.neurons.is_some()
    }

    fn device_profile(&self) -> Option<DeviceProfile> {
        let neurons = self.neurons.as_ref()?;

        let mut origins = Vec::new();
        for decoded in &self.origins {
            if decoded.origin.kind() != OutputKind::Real {
                continue;
            }
            // Every real origin must carry decoders or the whole node stays
            // off the device.
            let decoders = decoded.decoders.clone()?;
            origins.push(DeviceOriginProfile {
                name: decoded.origin.name().to_string(),
                dimension: decoded.origin.dimension(),
                decoders,
            });
        }

        let mut encoders = neurons.encoders.clone();
        for (mut row, &gain) in encoders.rows_mut().into_iter().zip(&neurons.gain) {
            row *= gain / self.radius;
        }

        let terminations = self
            .terminations
            .iter()
            .map(|ft| DeviceTerminationProfile {
                name: ft.termination.name().to_string(),
                dimension: ft.termination.dimension(),
                tau: ft.termination.tau(),
                transform: ft.termination.transform().cloned(),
            })
            .collect();

        Some(DeviceProfile {
            dimension: self.dimension,
            neuron_count: neurons.encoders.nrows(),
            encoders,
            gain: neurons.gain.clone(),
            bias: neurons.bias.clone(),
            origins,
            terminations,
            max_time_step: self.max_time_step,
        })
    }
}
