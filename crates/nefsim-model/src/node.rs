// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Node Contract
//!
//! The polymorphic step contract shared by leaf nodes and composite networks,
//! plus the flattened profile a device-eligible node exports for accelerator
//! offload.

use ndarray::Array2;

use crate::error::{SimulationError, StructuralError};
use crate::ports::{Origin, Termination};

/// How a node runs its internals. `Default` lets each node pick its natural
/// mode; `Rate` forces rate approximations, `Direct` bypasses neurons
/// entirely, and `Precise` requests exact spike timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationMode {
    Default,
    Rate,
    Direct,
    Precise,
}

/// A simulatable unit. Nodes own their ports; `step` advances internal state
/// from `start` to `end` reading termination inputs delivered before the call
/// and refreshing origin values at the end.
pub trait Node: Send {
    fn name(&self) -> &str;

    fn step(&mut self, start: f32, end: f32) -> Result<(), SimulationError>;

    fn origin(&self, name: &str) -> Result<&Origin, StructuralError>;

    fn origin_mut(&mut self, name: &str) -> Result<&mut Origin, StructuralError>;

    fn origins(&self) -> Vec<&Origin>;

    fn termination(&self, name: &str) -> Result<&Termination, StructuralError>;

    fn termination_mut(&mut self, name: &str) -> Result<&mut Termination, StructuralError>;

    fn terminations(&self) -> Vec<&Termination>;

    fn mode(&self) -> SimulationMode;

    fn set_mode(&mut self, mode: SimulationMode);

    /// Advance the node's bookkeeping clock without stepping its internals.
    /// Used when another component has simulated the node on its behalf.
    fn set_time(&mut self, time: f32);

    /// Whether this node may be moved onto an accelerator device.
    fn eligible_for_device(&self) -> bool {
        false
    }

    /// Flattened data the accelerator needs to simulate this node. Eligible
    /// nodes must return `Some`; a `None` from an eligible node is a
    /// structural error at partitioning time.
    fn device_profile(&self) -> Option<DeviceProfile> {
        None
    }
}

/// Per-origin flattening data: the linear decoders that map neuron activity
/// back to the origin's represented value.
#[derive(Debug, Clone)]
pub struct DeviceOriginProfile {
    pub name: String,
    pub dimension: usize,
    /// `neuron_count x dimension`
    pub decoders: Array2<f32>,
}

/// Per-termination flattening data.
#[derive(Debug, Clone)]
pub struct DeviceTerminationProfile {
    pub name: String,
    pub dimension: usize,
    pub tau: f32,
    /// `node_dimension x dimension` when present.
    pub transform: Option<Array2<f32>>,
}

/// Everything the accelerator needs to simulate one node group: static
/// encoding/decoding matrices and neuron parameters, flattened out of the
/// node's object graph.
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub dimension: usize,
    pub neuron_count: usize,
    /// Radius-scaled encoders, `neuron_count x dimension`.
    pub encoders: Array2<f32>,
    pub gain: Vec<f32>,
    pub bias: Vec<f32>,
    pub origins: Vec<DeviceOriginProfile>,
    pub terminations: Vec<DeviceTerminationProfile>,
    /// Largest internal step the node tolerates; the device clamps its own
    /// step to the minimum over a group.
    pub max_time_step: f32,
}

/// Run `f` with the node temporarily in `mode`, restoring the prior mode on
/// every exit path including panics.
pub fn with_mode<R>(
    node: &mut dyn Node,
    mode: SimulationMode,
    f: impl FnOnce(&mut dyn Node) -> R,
) -> R {
    struct Restore<'a> {
        node: &'a mut dyn Node,
        prior: SimulationMode,
    }

    impl Drop for Restore<'_> {
        fn drop(&mut self) {
            self.node.set_mode(self.prior);
        }
    }

    let prior = node.mode();
    node.set_mode(mode);
    let guard = Restore { node, prior };
    // Reborrow: the guard keeps ownership of the reference for its Drop.
    f(&mut *guard.node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::FunctionInput;
    use crate::output::Units;

    fn clock_input() -> FunctionInput {
        FunctionInput::new("clock", vec![Box::new(|t| t)], Units::Unk)
    }

    #[test]
    fn with_mode_restores_on_normal_return() {
        let mut node = clock_input();
        node.set_mode(SimulationMode::Rate);
        let seen = with_mode(&mut node, SimulationMode::Direct, |n| n.mode());
        assert_eq!(seen, SimulationMode::Direct);
        assert_eq!(node.mode(), SimulationMode::Rate);
    }

    #[test]
    fn with_mode_restores_on_error_return() {
        let mut node = clock_input();
        let result: Result<(), &str> =
            with_mode(&mut node, SimulationMode::Precise, |_| Err("boom"));
        assert!(result.is_err());
        assert_eq!(node.mode(), SimulationMode::Default);
    }

    #[test]
    fn with_mode_restores_on_panic() {
        let mut node = clock_input();
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_mode(&mut node, SimulationMode::Direct, |_| panic!("mid-run"))
        }));
        assert!(caught.is_err());
        assert_eq!(node.mode(), SimulationMode::Default);
    }
}
