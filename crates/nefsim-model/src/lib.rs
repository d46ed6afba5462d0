// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Node Graph Model
//!
//! Typed data ports, projections, and node contracts for the nefsim
//! simulation engine.
//!
//! - **InstantaneousOutput**: the closed tagged value carried between an
//!   origin and a termination at a given time (real vector, boolean spike
//!   vector, or precise spike-time vector)
//! - **Origin / Termination**: named output/input ports owned by exactly one
//!   node
//! - **Projection**: a directed origin-to-termination edge whose endpoints may
//!   name exposed aliases and must be resolved before identity comparison
//! - **Node**: the polymorphic step contract, with [`Ensemble`],
//!   [`FunctionInput`], and the composite [`Network`] as implementations

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
mod network;
mod node;
mod nodes;
mod output;
mod ports;
mod projection;

pub use error::{SimulationError, StructuralError};
pub use network::Network;
pub use node::{
    with_mode, DeviceOriginProfile, DeviceProfile, DeviceTerminationProfile, Node, SimulationMode,
};
pub use nodes::{DecodeFn, Ensemble, FunctionInput, TimeFunction, FUNCTION_INPUT_ORIGIN};
pub use output::{InstantaneousOutput, OutputKind, Units};
pub use ports::{Origin, Termination};
pub use projection::{NodeId, OriginRef, PortSelector, Projection, TerminationRef};
