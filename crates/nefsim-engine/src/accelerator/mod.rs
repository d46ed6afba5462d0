// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Accelerator Boundary
//!
//! The contract a device backend implements. A backend receives the full
//! flattened topology once at session start, then exchanges fixed-shape
//! buffers with the coordinator on every step. Buffers are sized once and
//! reused; their shapes never change for the lifetime of a session.

mod reference;

pub use reference::ReferenceAccelerator;

use ndarray::Array2;

use nefsim_model::{DeviceProfile, SimulationError};

/// One node flattened for device execution.
#[derive(Debug, Clone)]
pub struct FlattenedGroup {
    pub name: String,
    pub profile: DeviceProfile,
}

/// A device-side projection in group-index terms: both endpoints live on the
/// device, so its values never cross the host boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProjection {
    pub from_group: usize,
    pub from_origin: usize,
    pub to_group: usize,
    pub to_termination: usize,
}

/// Everything a backend needs to set up a run: per-group static data, the
/// device-internal projection list, the weighted adjacency matrix for load
/// balancing, and the step-size bound.
#[derive(Debug, Clone)]
pub struct FlattenedTopology {
    pub groups: Vec<FlattenedGroup>,
    pub projections: Vec<DeviceProjection>,
    /// Symmetric, zero-diagonal communication weights between groups.
    pub adjacency: Array2<u32>,
    pub max_time_step: f32,
}

/// Fixed-shape marshaling buffers shared between the coordinator and a
/// session. Input slots that a device-side projection feeds are `None`: the
/// host never writes them and the device routes them internally.
#[derive(Debug, Clone)]
pub struct DeviceBuffers {
    /// `inputs[group][termination]`, termination-dimension vectors.
    pub inputs: Vec<Vec<Option<Vec<f32>>>>,
    /// `outputs[group][origin]`, origin-dimension vectors.
    pub outputs: Vec<Vec<Vec<f32>>>,
    /// `spikes[group]`, one entry per neuron.
    pub spikes: Vec<Vec<f32>>,
}

impl DeviceBuffers {
    /// Buffers shaped for `topology`, all slots present and zeroed. The
    /// coordinator blanks out device-fed input slots afterwards.
    pub fn for_topology(topology: &FlattenedTopology) -> Self {
        let inputs = topology
            .groups
            .iter()
            .map(|g| {
                g.profile
                    .terminations
                    .iter()
                    .map(|t| Some(vec![0.0; t.dimension]))
                    .collect()
            })
            .collect();
        let outputs = topology
            .groups
            .iter()
            .map(|g| {
                g.profile
                    .origins
                    .iter()
                    .map(|o| vec![0.0; o.dimension])
                    .collect()
            })
            .collect();
        let spikes = topology
            .groups
            .iter()
            .map(|g| vec![0.0; g.profile.neuron_count])
            .collect();
        Self {
            inputs,
            outputs,
            spikes,
        }
    }

    /// Zero every output and spike slot, keeping shapes. Used to discard
    /// partial writes after a failed device step.
    pub fn clear_outputs(&mut self) {
        for group in &mut self.outputs {
            for slot in group {
                slot.fill(0.0);
            }
        }
        for group in &mut self.spikes {
            group.fill(0.0);
        }
    }
}

/// A device backend. `open_session` uploads the topology and pins buffers;
/// the returned session is exclusively owned by one coordinator.
pub trait Accelerator {
    /// Number of devices this backend can currently drive.
    fn available_devices(&self) -> usize;

    fn open_session(
        &self,
        topology: FlattenedTopology,
        max_time_step: f32,
        device_count: usize,
    ) -> Result<Box<dyn AcceleratorSession>, SimulationError>;
}

/// An open device run. `step` blocks until the device has advanced every
/// group over `[start, end]` and written the output buffers.
pub trait AcceleratorSession: Send {
    fn step(
        &mut self,
        buffers: &mut DeviceBuffers,
        start: f32,
        end: f32,
    ) -> Result<(), SimulationError>;

    /// Tear down device state. Stepping a closed session is a device error.
    fn close(&mut self) -> Result<(), SimulationError>;
}

impl std::fmt::Debug for dyn AcceleratorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AcceleratorSession")
    }
}

/// How many accelerator devices the host exposes.
#[cfg(feature = "gpu")]
pub(crate) fn probe_devices() -> usize {
    use wgpu::Backends;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: Backends::all(),
        ..Default::default()
    });
    pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: None,
        force_fallback_adapter: false,
    }))
    .map_or(0, |_| 1)
}

/// Without a GPU build the reference implementation runs in-process and
/// counts as a single device.
#[cfg(not(feature = "gpu"))]
pub(crate) fn probe_devices() -> usize {
    1
}
