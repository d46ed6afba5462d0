// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Step Coordinator
//!
//! Drives one network over one accelerator session, step by step. Setup
//! resolves every projection endpoint and group port through the network's
//! alias tables, builds the flattened topology, and sizes the marshaling
//! buffers once. Each step then delivers local projections, gathers
//! host-fed device inputs, makes a single blocking device call, writes the
//! outputs back into the resolved origins, and steps the local nodes.
//! Projection reads always see the previous step's origin values, on both
//! sides of the boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::{info, warn};

use nefsim_model::{
    InstantaneousOutput, Network, OriginRef, OutputKind, Projection, SimulationError,
    StructuralError, TerminationRef, Units,
};

use crate::accelerator::{
    Accelerator, AcceleratorSession, DeviceBuffers, DeviceProjection, FlattenedGroup,
    FlattenedTopology,
};
use crate::config::EngineConfig;
use crate::partition::{adjacency_matrix, partition, Partition};

/// Accumulated wall-clock time on either side of the device boundary.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepTiming {
    pub device: Duration,
    pub local: Duration,
    pub steps: u64,
}

struct OriginSlot {
    target: OriginRef,
    group: usize,
    index: usize,
}

struct TerminationSlot {
    target: TerminationRef,
    group: usize,
    index: usize,
    /// Fed by a device-side projection; the host never writes this slot.
    device_fed: bool,
}

pub struct StepCoordinator {
    partition: Partition,
    local_projections: Vec<Projection>,
    origin_slots: Vec<OriginSlot>,
    termination_slots: Vec<TerminationSlot>,
    session: Option<Box<dyn AcceleratorSession>>,
    buffers: DeviceBuffers,
    device_count: usize,
    timing: Arc<Mutex<StepTiming>>,
    show_timing: bool,
}

impl std::fmt::Debug for StepCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepCoordinator")
            .field("device_count", &self.device_count)
            .finish_non_exhaustive()
    }
}

impl StepCoordinator {
    /// Partition `network`, open a session for its device side, and build the
    /// marshal plan. When no devices are usable, or nothing in the network is
    /// device-eligible, the whole network runs locally; an unavailable
    /// accelerator is a warning at setup, never a failure.
    pub fn new(
        network: &Network,
        accelerator: &dyn Accelerator,
        config: &EngineConfig,
    ) -> Result<Self, SimulationError> {
        let mut split = partition(network)?;
        let available = accelerator.available_devices();
        let device_count = config.requested_devices.min(available);
        if config.requested_devices > available {
            warn!(
                requested = config.requested_devices,
                available, "device request clamped"
            );
        }

        if device_count == 0 || split.device_nodes.is_empty() {
            if config.requested_devices > 0 && available == 0 && !split.device_nodes.is_empty() {
                warn!("accelerator unavailable, running the whole network locally");
            }
            split.local_nodes = network
                .node_names()
                .into_iter()
                .map(str::to_string)
                .collect();
            split.local_projections = (0..network.projections().len()).collect();
            split.device_nodes.clear();
            split.device_projections.clear();

            let local_projections = Self::clone_projections(network, &split.local_projections);
            return Ok(Self {
                partition: split,
                local_projections,
                origin_slots: Vec::new(),
                termination_slots: Vec::new(),
                session: None,
                buffers: DeviceBuffers {
                    inputs: Vec::new(),
                    outputs: Vec::new(),
                    spikes: Vec::new(),
                },
                device_count: 0,
                timing: Arc::new(Mutex::new(StepTiming::default())),
                show_timing: config.show_timing,
            });
        }

        // Flatten the device side. Every port is recorded under its resolved
        // identity so aliased and direct selectors land on the same slot.
        let mut groups = Vec::new();
        let mut origin_slots = Vec::new();
        let mut termination_slots = Vec::new();
        let mut origin_index: AHashMap<(String, String), (usize, usize)> = AHashMap::new();
        let mut termination_index: AHashMap<(String, String), (usize, usize)> = AHashMap::new();

        for (g, name) in split.device_nodes.iter().enumerate() {
            let node = network.node(name)?;
            let profile = node
                .device_profile()
                .ok_or_else(|| StructuralError::MissingDeviceProfile(name.clone()))?;
            // The marshal buffers are sized from the profile, so a profile
            // that disagrees with its concrete port must fail here, not
            // mid-step.
            for (oi, origin) in profile.origins.iter().enumerate() {
                let port = node.origin(&origin.name)?;
                if port.dimension() != origin.dimension {
                    return Err(StructuralError::DimensionMismatch {
                        expected: port.dimension(),
                        actual: origin.dimension,
                    }
                    .into());
                }
                origin_index.insert((name.clone(), origin.name.clone()), (g, oi));
                origin_slots.push(OriginSlot {
                    target: OriginRef {
                        node: name.clone(),
                        origin: origin.name.clone(),
                    },
                    group: g,
                    index: oi,
                });
            }
            for (ti, termination) in profile.terminations.iter().enumerate() {
                let port = node.termination(&termination.name)?;
                if port.dimension() != termination.dimension {
                    return Err(StructuralError::DimensionMismatch {
                        expected: port.dimension(),
                        actual: termination.dimension,
                    }
                    .into());
                }
                termination_index.insert((name.clone(), termination.name.clone()), (g, ti));
                termination_slots.push(TerminationSlot {
                    target: TerminationRef {
                        node: name.clone(),
                        termination: termination.name.clone(),
                    },
                    group: g,
                    index: ti,
                    device_fed: false,
                });
            }
            groups.push(FlattenedGroup {
                name: name.clone(),
                profile,
            });
        }

        let mut device_projections = Vec::new();
        for &p in &split.device_projections {
            let projection = &network.projections()[p];
            let origin = network.resolve_origin(&projection.origin)?;
            let termination = network.resolve_termination(&projection.termination)?;
            let &(from_group, from_origin) = origin_index
                .get(&(origin.node.clone(), origin.origin.clone()))
                .ok_or_else(|| StructuralError::UnknownOrigin {
                    node: origin.node.clone(),
                    name: origin.origin.clone(),
                })?;
            let &(to_group, to_termination) = termination_index
                .get(&(termination.node.clone(), termination.termination.clone()))
                .ok_or_else(|| StructuralError::UnknownTermination {
                    node: termination.node.clone(),
                    name: termination.termination.clone(),
                })?;
            device_projections.push(DeviceProjection {
                from_group,
                from_origin,
                to_group,
                to_termination,
            });
            for slot in &mut termination_slots {
                if slot.group == to_group && slot.index == to_termination {
                    slot.device_fed = true;
                }
            }
        }

        let adjacency = adjacency_matrix(network, &split.device_nodes, &split.device_projections)?;
        let max_time_step = groups
            .iter()
            .map(|g| g.profile.max_time_step)
            .fold(config.max_time_step, f32::min);

        let topology = FlattenedTopology {
            groups,
            projections: device_projections,
            adjacency,
            max_time_step,
        };
        let mut buffers = DeviceBuffers::for_topology(&topology);
        for slot in &termination_slots {
            if slot.device_fed {
                buffers.inputs[slot.group][slot.index] = None;
            }
        }

        info!(
            device_nodes = split.device_nodes.len(),
            local_nodes = split.local_nodes.len(),
            device_count,
            max_time_step,
            "opening accelerator session"
        );
        let session = accelerator.open_session(topology, max_time_step, device_count)?;

        let local_projections = Self::clone_projections(network, &split.local_projections);
        Ok(Self {
            partition: split,
            local_projections,
            origin_slots,
            termination_slots,
            session: Some(session),
            buffers,
            device_count,
            timing: Arc::new(Mutex::new(StepTiming::default())),
            show_timing: config.show_timing,
        })
    }

    fn clone_projections(network: &Network, indices: &[usize]) -> Vec<Projection> {
        indices
            .iter()
            .map(|&i| network.projections()[i].clone())
            .collect()
    }

    pub fn is_accelerated(&self) -> bool {
        self.session.is_some()
    }

    pub fn device_count(&self) -> usize {
        self.device_count
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Shared handle onto the accumulated timing counters.
    pub fn timing(&self) -> Arc<Mutex<StepTiming>> {
        Arc::clone(&self.timing)
    }

    /// Advance the whole network over `[start, end]`.
    pub fn step(
        &mut self,
        network: &mut Network,
        start: f32,
        end: f32,
    ) -> Result<(), SimulationError> {
        // Local delivery first: every read sees the previous step's values,
        // including reads from device-node origins.
        for projection in &self.local_projections {
            network.deliver(projection)?;
        }

        let device_start = Instant::now();
        if let Some(session) = &mut self.session {
            for slot in &self.termination_slots {
                if slot.device_fed {
                    continue;
                }
                let termination = network.resolved_termination(&slot.target)?;
                if let Some(value) = termination.input() {
                    let values = real_input(value, &slot.target);
                    if let Some(buffer) = &mut self.buffers.inputs[slot.group][slot.index] {
                        buffer.copy_from_slice(&values);
                    }
                }
            }

            if let Err(error) = session.step(&mut self.buffers, start, end) {
                // A failed device step must not leak partial output.
                self.buffers.clear_outputs();
                return Err(error);
            }

            for slot in &self.origin_slots {
                let origin = network.resolved_origin_mut(&slot.target)?;
                if origin.kind() != OutputKind::Real {
                    warn!(origin = %slot.target, kind = ?origin.kind(),
                        "device produced an unsupported output kind, keeping prior value");
                    continue;
                }
                origin.set_value(InstantaneousOutput::Real {
                    values: self.buffers.outputs[slot.group][slot.index].clone(),
                    units: Units::Unk,
                    time: end,
                })?;
            }

            for name in &self.partition.device_nodes {
                network.node_mut(name)?.set_time(end);
            }
        }
        let device_elapsed = device_start.elapsed();

        let local_start = Instant::now();
        network.step_subset(&self.partition.local_nodes, start, end)?;
        let local_elapsed = local_start.elapsed();

        let mut timing = self.timing.lock();
        timing.device += device_elapsed;
        timing.local += local_elapsed;
        timing.steps += 1;
        Ok(())
    }

    /// Tear down the session. Idempotent on the coordinator side; the
    /// session itself is closed exactly once.
    pub fn close(&mut self) -> Result<(), SimulationError> {
        if let Some(mut session) = self.session.take() {
            session.close()?;
        }
        if self.show_timing {
            let timing = *self.timing.lock();
            info!(
                steps = timing.steps,
                device_ms = timing.device.as_millis() as u64,
                local_ms = timing.local.as_millis() as u64,
                "coordinator closed"
            );
        }
        Ok(())
    }
}

/// Incoming port values as the real vector sent across the device boundary:
/// spike rasters count as 0/1, precise spike times are not marshalable and
/// read as silence.
fn real_input(value: &InstantaneousOutput, target: &TerminationRef) -> Vec<f32> {
    match value {
        InstantaneousOutput::Real { values, .. } => values.clone(),
        InstantaneousOutput::Spikes { values, .. } => {
            values.iter().map(|&s| if s { 1.0 } else { 0.0 }).collect()
        }
        InstantaneousOutput::PreciseSpikes { spike_times, .. } => {
            warn!(termination = %target,
                "precise spike input unsupported at the device boundary, sending silence");
            vec![0.0; spike_times.len()]
        }
    }
}
