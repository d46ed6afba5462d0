// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Coordinator Tests
//!
//! Marshaling order across the device boundary, fallback behavior, and
//! failure handling, driven against the reference backend and a scripted
//! session that records what crosses the boundary.

use std::sync::Arc;

use ndarray::arr2;
use parking_lot::Mutex;

use nefsim_engine::{
    Accelerator, AcceleratorSession, DeviceBuffers, EngineConfig, FlattenedTopology,
    ReferenceAccelerator, StepCoordinator,
};
use nefsim_model::{
    DeviceOriginProfile, DeviceProfile, DeviceTerminationProfile, Ensemble, InstantaneousOutput,
    Network, Node, Origin, OutputKind, PortSelector, Projection, SimulationError, SimulationMode,
    StructuralError, Termination, Units,
};

fn device_ensemble(name: &str) -> Ensemble {
    let mut ensemble = Ensemble::with_neurons(
        name,
        1,
        1.0,
        arr2(&[[1.0]]),
        vec![1.0],
        vec![0.0],
    )
    .unwrap();
    ensemble.add_termination("in", 1, 0.005).unwrap();
    ensemble
        .add_decoded_origin_with_decoders("out", arr2(&[[1.0]]), Box::new(|_, x| x.to_vec()))
        .unwrap();
    ensemble
}

fn local_ensemble(name: &str) -> Ensemble {
    let mut ensemble = Ensemble::new(name, 1);
    ensemble.add_termination("in", 1, 0.005).unwrap();
    ensemble
        .add_decoded_origin("out", 1, Box::new(|_, x| x.to_vec()))
        .unwrap();
    ensemble
}

fn real_value(output: &InstantaneousOutput) -> Vec<f32> {
    match output {
        InstantaneousOutput::Real { values, .. } => values.clone(),
        other => panic!("expected real output, got {other:?}"),
    }
}

/// Scripted backend: the session records every host-fed input slot it sees
/// and writes a constant into every output slot, optionally failing after
/// the write to exercise the discard path.
struct ScriptedAccelerator {
    inputs_seen: Arc<Mutex<Vec<Vec<f32>>>>,
    output: f32,
    fail: bool,
}

impl ScriptedAccelerator {
    fn new(output: f32) -> Self {
        Self {
            inputs_seen: Arc::new(Mutex::new(Vec::new())),
            output,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            inputs_seen: Arc::new(Mutex::new(Vec::new())),
            output: 99.0,
            fail: true,
        }
    }
}

impl Accelerator for ScriptedAccelerator {
    fn available_devices(&self) -> usize {
        1
    }

    fn open_session(
        &self,
        _topology: FlattenedTopology,
        _max_time_step: f32,
        _device_count: usize,
    ) -> Result<Box<dyn AcceleratorSession>, SimulationError> {
        Ok(Box::new(ScriptedSession {
            inputs_seen: Arc::clone(&self.inputs_seen),
            output: self.output,
            fail: self.fail,
        }))
    }
}

struct ScriptedSession {
    inputs_seen: Arc<Mutex<Vec<Vec<f32>>>>,
    output: f32,
    fail: bool,
}

impl AcceleratorSession for ScriptedSession {
    fn step(
        &mut self,
        buffers: &mut DeviceBuffers,
        _start: f32,
        _end: f32,
    ) -> Result<(), SimulationError> {
        let mut gathered = Vec::new();
        for group in &buffers.inputs {
            for slot in group.iter().flatten() {
                gathered.extend_from_slice(slot);
            }
        }
        self.inputs_seen.lock().push(gathered);

        for group in &mut buffers.outputs {
            for slot in group {
                slot.fill(self.output);
            }
        }
        if self.fail {
            return Err(SimulationError::Device("injected failure".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), SimulationError> {
        Ok(())
    }
}

#[test]
fn device_sees_pre_step_values_and_its_output_lands_next_step() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();
    network.add_node(Box::new(local_ensemble("b"))).unwrap();
    network
        .add_projection(Projection::new(
            PortSelector::node("b", "out"),
            PortSelector::node("a", "in"),
        ))
        .unwrap();
    network
        .add_projection(Projection::new(
            PortSelector::node("a", "out"),
            PortSelector::node("b", "in"),
        ))
        .unwrap();

    let accelerator = ScriptedAccelerator::new(42.0);
    let inputs_seen = Arc::clone(&accelerator.inputs_seen);
    let mut coordinator =
        StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap();
    assert!(coordinator.is_accelerated());

    coordinator.step(&mut network, 0.0, 0.01).unwrap();

    // The device saw b's pre-step output (zero), and b stepped before a's
    // new output was delivered anywhere.
    assert_eq!(inputs_seen.lock()[0], vec![0.0]);
    let a_out = real_value(network.node("a").unwrap().origin("out").unwrap().value());
    assert_eq!(a_out, vec![42.0]);
    let b_out = real_value(network.node("b").unwrap().origin("out").unwrap().value());
    assert!(b_out[0].abs() < 0.01, "b saw the device output early: {b_out:?}");

    coordinator.step(&mut network, 0.01, 0.02).unwrap();

    // Second step: b's termination received 42 and the filter pulled toward
    // it; the device saw b's small step-one output.
    let b_out = real_value(network.node("b").unwrap().origin("out").unwrap().value());
    assert!(b_out[0] > 30.0, "device output never reached b: {b_out:?}");
    let seen = inputs_seen.lock();
    assert!(seen[1][0].abs() < 0.01, "device saw a post-step value: {seen:?}");

    coordinator.close().unwrap();
}

#[test]
fn zero_length_step_round_trips_origin_values() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();

    let accelerator = ReferenceAccelerator::with_devices(1);
    let mut coordinator =
        StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap();

    network
        .node_mut("a")
        .unwrap()
        .termination_mut("in")
        .unwrap()
        .set_input(InstantaneousOutput::Real {
            values: vec![1.0],
            units: Units::Unk,
            time: 0.0,
        })
        .unwrap();
    coordinator.step(&mut network, 0.0, 0.1).unwrap();
    let before = real_value(network.node("a").unwrap().origin("out").unwrap().value());
    assert!(before[0] > 0.9, "filter should have settled: {before:?}");

    coordinator.step(&mut network, 0.1, 0.1).unwrap();
    let after = real_value(network.node("a").unwrap().origin("out").unwrap().value());
    assert_eq!(before, after);

    assert_eq!(coordinator.timing().lock().steps, 2);
    coordinator.close().unwrap();
}

#[test]
fn requested_devices_are_clamped_to_available() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();

    let accelerator = ReferenceAccelerator::with_devices(1);
    let config = EngineConfig {
        requested_devices: 4,
        ..EngineConfig::default()
    };
    let coordinator = StepCoordinator::new(&network, &accelerator, &config).unwrap();
    assert!(coordinator.is_accelerated());
    assert_eq!(coordinator.device_count(), 1);
}

#[test]
fn zero_requested_devices_disables_acceleration() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();

    let accelerator = ReferenceAccelerator::with_devices(1);
    let config = EngineConfig {
        requested_devices: 0,
        ..EngineConfig::default()
    };
    let mut coordinator = StepCoordinator::new(&network, &accelerator, &config).unwrap();
    assert!(!coordinator.is_accelerated());
    assert_eq!(
        coordinator.partition().local_nodes,
        vec!["a".to_string()]
    );

    // The device-eligible node still simulates, on the host.
    network
        .node_mut("a")
        .unwrap()
        .termination_mut("in")
        .unwrap()
        .set_input(InstantaneousOutput::Real {
            values: vec![1.0],
            units: Units::Unk,
            time: 0.0,
        })
        .unwrap();
    coordinator.step(&mut network, 0.0, 0.1).unwrap();
    let out = real_value(network.node("a").unwrap().origin("out").unwrap().value());
    assert!(out[0] > 0.9, "local fallback did not simulate: {out:?}");
}

#[test]
fn unavailable_accelerator_falls_back_to_local() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();

    let accelerator = ReferenceAccelerator::with_devices(0);
    let mut coordinator =
        StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap();
    assert!(!coordinator.is_accelerated());
    coordinator.step(&mut network, 0.0, 0.001).unwrap();
    coordinator.close().unwrap();
}

#[test]
fn failed_device_step_discards_partial_writes() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();
    network
        .node_mut("a")
        .unwrap()
        .origin_mut("out")
        .unwrap()
        .set_value(InstantaneousOutput::Real {
            values: vec![7.0],
            units: Units::Unk,
            time: 0.0,
        })
        .unwrap();

    let accelerator = ScriptedAccelerator::failing();
    let mut coordinator =
        StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap();

    let err = coordinator.step(&mut network, 0.0, 0.01).unwrap_err();
    assert!(matches!(err, SimulationError::Device(_)));

    // The session wrote 99 into its buffers before failing; none of it may
    // reach the origin.
    let out = real_value(network.node("a").unwrap().origin("out").unwrap().value());
    assert_eq!(out, vec![7.0]);
}

#[test]
fn device_side_edges_through_aliases_are_routed_on_the_device() {
    let mut network = Network::new("net");
    network.add_node(Box::new(device_ensemble("a"))).unwrap();
    network.add_node(Box::new(device_ensemble("c"))).unwrap();
    network.expose_origin("a", "out", "a_out").unwrap();
    network
        .add_projection(Projection::new(
            PortSelector::exposed("a_out"),
            PortSelector::node("c", "in"),
        ))
        .unwrap();

    let accelerator = ReferenceAccelerator::with_devices(1);
    let mut coordinator =
        StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap();
    assert_eq!(coordinator.partition().device_projections, vec![0]);
    coordinator.step(&mut network, 0.0, 0.001).unwrap();
    coordinator.close().unwrap();
}

/// A device-eligible node whose profile advertises a decoded origin while
/// the node-side port is a spike raster. The coordinator cannot write real
/// device output into it and must keep the prior value.
struct SpikePortNode {
    name: String,
    origin: Origin,
    mode: SimulationMode,
}

impl SpikePortNode {
    fn new(name: &str) -> Self {
        let mut origin = Origin::new("out", 1, OutputKind::Spikes);
        origin
            .set_value(InstantaneousOutput::Spikes {
                values: vec![true],
                time: 0.0,
            })
            .unwrap();
        Self {
            name: name.to_string(),
            origin,
            mode: SimulationMode::Default,
        }
    }
}

impl Node for SpikePortNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, _start: f32, _end: f32) -> Result<(), SimulationError> {
        Ok(())
    }

    fn origin(&self, name: &str) -> Result<&Origin, StructuralError> {
        if name == "out" {
            Ok(&self.origin)
        } else {
            Err(StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn origin_mut(&mut self, name: &str) -> Result<&mut Origin, StructuralError> {
        if name == "out" {
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

    fn set_time(&mut self, _time: f32) {}

    fn eligible_for_device(&self) -> bool {
        true
    }

    fn device_profile(&self) -> Option<DeviceProfile> {
        Some(DeviceProfile {
            dimension: 1,
            neuron_count: 1,
            encoders: arr2(&[[1.0]]),
            gain: vec![1.0],
            bias: vec![0.0],
            origins: vec![DeviceOriginProfile {
                name: "out".to_string(),
                dimension: 1,
                decoders: arr2(&[[1.0]]),
            }],
            terminations: Vec::new(),
            max_time_step: 1e-3,
        })
    }
}

/// A device-eligible node whose profile claims wider ports than the node
/// actually carries. Its dimension-1 ports back a profile advertising the
/// given origin and termination dimensions.
struct InflatedProfileNode {
    name: String,
    origin: Origin,
    termination: Termination,
    origin_profile_dimension: usize,
    termination_profile_dimension: usize,
    mode: SimulationMode,
}

impl InflatedProfileNode {
    fn new(name: &str, origin_dimension: usize, termination_dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            origin: Origin::new("out", 1, OutputKind::Real),
            termination: Termination::new("in", 1, 0.005),
            origin_profile_dimension: origin_dimension,
            termination_profile_dimension: termination_dimension,
            mode: SimulationMode::Default,
        }
    }
}

impl Node for InflatedProfileNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, _start: f32, _end: f32) -> Result<(), SimulationError> {
        Ok(())
    }

    fn origin(&self, name: &str) -> Result<&Origin, StructuralError> {
        if name == "out" {
            Ok(&self.origin)
        } else {
            Err(StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn origin_mut(&mut self, name: &str) -> Result<&mut Origin, StructuralError> {
        if name == "out" {
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
        if name == "in" {
            Ok(&self.termination)
        } else {
            Err(StructuralError::UnknownTermination {
                node: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn termination_mut(&mut self, name: &str) -> Result<&mut Termination, StructuralError> {
        if name == "in" {
            Ok(&mut self.termination)
        } else {
            Err(StructuralError::UnknownTermination {
                node: self.name.clone(),
                name: name.to_string(),
            })
        }
    }

    fn terminations(&self) -> Vec<&Termination> {
        vec![&self.termination]
    }

    fn mode(&self) -> SimulationMode {
        self.mode
    }

    fn set_mode(&mut self, mode: SimulationMode) {
        self.mode = mode;
    }

    fn set_time(&mut self, _time: f32) {}

    fn eligible_for_device(&self) -> bool {
        true
    }

    fn device_profile(&self) -> Option<DeviceProfile> {
        Some(DeviceProfile {
            dimension: 1,
            neuron_count: 1,
            encoders: arr2(&[[1.0]]),
            gain: vec![1.0],
            bias: vec![0.0],
            origins: vec![DeviceOriginProfile {
                name: "out".to_string(),
                dimension: self.origin_profile_dimension,
                decoders: arr2(&[[1.0]]),
            }],
            terminations: vec![DeviceTerminationProfile {
                name: "in".to_string(),
                dimension: self.termination_profile_dimension,
                tau: 0.005,
                transform: None,
            }],
            max_time_step: 1e-3,
        })
    }
}

#[test]
fn origin_profile_wider_than_its_port_fails_at_setup() {
    let mut network = Network::new("net");
    network
        .add_node(Box::new(InflatedProfileNode::new("a", 2, 1)))
        .unwrap();

    let accelerator = ScriptedAccelerator::new(42.0);
    let err = StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap_err();
    assert_eq!(
        err,
        SimulationError::Structural(StructuralError::DimensionMismatch {
            expected: 1,
            actual: 2,
        })
    );
}

#[test]
fn termination_profile_wider_than_its_port_fails_at_setup() {
    let mut network = Network::new("net");
    network
        .add_node(Box::new(InflatedProfileNode::new("a", 1, 2)))
        .unwrap();

    let accelerator = ScriptedAccelerator::new(42.0);
    let err = StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap_err();
    assert_eq!(
        err,
        SimulationError::Structural(StructuralError::DimensionMismatch {
            expected: 1,
            actual: 2,
        })
    );
}

#[test]
fn unsupported_origin_kind_keeps_the_prior_value() {
    let mut network = Network::new("net");
    network.add_node(Box::new(SpikePortNode::new("a"))).unwrap();

    let accelerator = ScriptedAccelerator::new(42.0);
    let mut coordinator =
        StepCoordinator::new(&network, &accelerator, &EngineConfig::default()).unwrap();
    coordinator.step(&mut network, 0.0, 0.01).unwrap();

    match network.node("a").unwrap().origin("out").unwrap().value() {
        InstantaneousOutput::Spikes { values, time } => {
            assert_eq!(values, &vec![true]);
            assert_eq!(*time, 0.0);
        }
        other => panic!("prior spike value was overwritten: {other:?}"),
    }
}
