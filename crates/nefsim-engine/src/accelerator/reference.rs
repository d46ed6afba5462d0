// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Reference Accelerator
//!
//! An in-process implementation of the session contract: rate-mode
//! encode/filter/decode over the flattened group data, with device-side
//! projections routed internally from the previous step's outputs. It is the
//! stand-in backend when no GPU build is present, and what the test suite
//! runs the coordinator against.

use ndarray::ArrayView1;
use tracing::{debug, info};

use nefsim_model::SimulationError;

use super::{
    probe_devices, Accelerator, AcceleratorSession, DeviceBuffers, FlattenedTopology,
};

pub struct ReferenceAccelerator {
    devices: usize,
}

impl ReferenceAccelerator {
    /// Probe the host for devices.
    pub fn detect() -> Self {
        let devices = probe_devices();
        debug!(devices, "accelerator probe");
        Self { devices }
    }

    /// Fixed device count, mainly for tests and forced configurations.
    pub fn with_devices(devices: usize) -> Self {
        Self { devices }
    }
}

impl Accelerator for ReferenceAccelerator {
    fn available_devices(&self) -> usize {
        self.devices
    }

    fn open_session(
        &self,
        topology: FlattenedTopology,
        max_time_step: f32,
        device_count: usize,
    ) -> Result<Box<dyn AcceleratorSession>, SimulationError> {
        if device_count == 0 || device_count > self.devices {
            return Err(SimulationError::Device(format!(
                "cannot open session on {device_count} of {} devices",
                self.devices
            )));
        }
        if topology.groups.is_empty() {
            return Err(SimulationError::Device("empty topology".to_string()));
        }
        if !(max_time_step > 0.0) {
            return Err(SimulationError::Device(format!(
                "non-positive max time step {max_time_step}"
            )));
        }
        info!(
            groups = topology.groups.len(),
            projections = topology.projections.len(),
            device_count,
            "reference session opened"
        );

        let filter_states = topology
            .groups
            .iter()
            .map(|g| vec![vec![0.0f32; g.profile.dimension]; g.profile.terminations.len()])
            .collect();
        let previous_outputs = topology
            .groups
            .iter()
            .map(|g| {
                g.profile
                    .origins
                    .iter()
                    .map(|o| vec![0.0f32; o.dimension])
                    .collect()
            })
            .collect();
        Ok(Box::new(ReferenceSession {
            topology,
            max_time_step,
            filter_states,
            previous_outputs,
            closed: false,
        }))
    }
}

struct ReferenceSession {
    topology: FlattenedTopology,
    max_time_step: f32,
    /// `[group][termination]`, group-dimension filter states.
    filter_states: Vec<Vec<Vec<f32>>>,
    /// Origin outputs from the previous step, the source for device-routed
    /// projections.
    previous_outputs: Vec<Vec<Vec<f32>>>,
    closed: bool,
}

impl ReferenceSession {
    /// The value feeding termination `t` of group `g`: a device-routed
    /// projection's previous output if one targets it, otherwise the host's
    /// input slot, otherwise silence.
    fn termination_input(&self, buffers: &DeviceBuffers, g: usize, t: usize) -> Vec<f32> {
        let routed = self
            .topology
            .projections
            .iter()
            .find(|p| p.to_group == g && p.to_termination == t);
        if let Some(p) = routed {
            return self.previous_outputs[p.from_group][p.from_origin].clone();
        }
        match &buffers.inputs[g][t] {
            Some(slot) => slot.clone(),
            None => vec![0.0; self.topology.groups[g].profile.terminations[t].dimension],
        }
    }
}

impl AcceleratorSession for ReferenceSession {
    fn step(
        &mut self,
        buffers: &mut DeviceBuffers,
        start: f32,
        end: f32,
    ) -> Result<(), SimulationError> {
        if self.closed {
            return Err(SimulationError::Device("session is closed".to_string()));
        }
        let span = end - start;
        if span <= 0.0 {
            return Ok(());
        }
        let substeps = (span / self.max_time_step).ceil().max(1.0) as usize;
        let h = span / substeps as f32;

        for g in 0..self.topology.groups.len() {
            let profile = self.topology.groups[g].profile.clone();

            // Filter each termination toward its (transformed) input, then
            // sum the filter states into the represented drive.
            let mut drive = vec![0.0f32; profile.dimension];
            for (t, termination) in profile.terminations.iter().enumerate() {
                let raw = self.termination_input(buffers, g, t);
                let target = match &termination.transform {
                    Some(transform) => transform.dot(&ArrayView1::from(&raw[..])).to_vec(),
                    None => raw,
                };
                let state = &mut self.filter_states[g][t];
                for _ in 0..substeps {
                    for (x, u) in state.iter_mut().zip(&target) {
                        *x += h * (u - *x) / termination.tau;
                    }
                }
                for (d, x) in drive.iter_mut().zip(state.iter()) {
                    *d += x;
                }
            }

            // Rectified-linear rate response over the scaled encoders.
            let mut rates = vec![0.0f32; profile.neuron_count];
            for (i, rate) in rates.iter_mut().enumerate() {
                let activation = profile
                    .encoders
                    .row(i)
                    .dot(&ArrayView1::from(&drive[..]))
                    + profile.bias[i];
                *rate = activation.max(0.0);
            }
            buffers.spikes[g].copy_from_slice(&rates);

            for (o, origin) in profile.origins.iter().enumerate() {
                let out = &mut buffers.outputs[g][o];
                out.fill(0.0);
                for (i, &rate) in rates.iter().enumerate() {
                    for (d, value) in out.iter_mut().enumerate() {
                        *value += rate * origin.decoders[[i, d]];
                    }
                }
            }
        }

        // Device-routed projections read the step N-1 outputs; snapshot only
        // after every group has stepped.
        for (g, group) in buffers.outputs.iter().enumerate() {
            for (o, slot) in group.iter().enumerate() {
                self.previous_outputs[g][o].copy_from_slice(slot);
            }
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SimulationError> {
        if self.closed {
            return Err(SimulationError::Device(
                "session is already closed".to_string(),
            ));
        }
        self.closed = true;
        debug!("reference session closed");
        Ok(())
    }
}
