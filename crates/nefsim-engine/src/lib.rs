// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Simulation Engine
//!
//! Splits a network between accelerator devices and the local host, drives
//! both sides in lock step, and wraps the whole thing in a fixed-step
//! simulator loop with progress events.
//!
//! - **partition**: device/local node split and the weighted adjacency matrix
//!   handed to the device for load balancing
//! - **accelerator**: the session boundary a device backend implements, plus
//!   an in-process reference implementation
//! - **coordinator**: per-step marshaling between host port values and the
//!   device's fixed buffers
//! - **simulator**: run loop, listener events, cooperative interrupt

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod accelerator;
mod config;
mod coordinator;
mod partition;
mod simulator;

pub use accelerator::{
    Accelerator, AcceleratorSession, DeviceBuffers, DeviceProjection, FlattenedGroup,
    FlattenedTopology, ReferenceAccelerator,
};
pub use config::EngineConfig;
pub use coordinator::{StepCoordinator, StepTiming};
pub use partition::{adjacency_matrix, partition, Partition};
pub use simulator::{Simulator, SimulatorEvent, SimulatorEventKind, SimulatorListener};
