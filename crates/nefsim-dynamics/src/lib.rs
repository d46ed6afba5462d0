// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Continuous-Time Dynamics
//!
//! Leaf crate of the nefsim workspace: pure state-transition contracts with no
//! knowledge of the node graph.
//!
//! - **TimeSeries**: ordered (time, vector) samples with clamping linear
//!   interpolation
//! - **DynamicalSystem**: state-space contract `f(t, state, input)` /
//!   `g(t, state)` with LTI and spiking implementations
//! - **Integrators**: fixed-step Euler and adaptive embedded
//!   Runge-Kutta-Fehlberg 4(5) with error-controlled step selection

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod error;
mod integrator;
pub mod models;
mod system;
mod time_series;

pub use error::{DynamicsError, Result};
pub use integrator::{EulerIntegrator, Integrator, Rk45Integrator};
pub use system::{DynamicalSystem, LtiSystem};
pub use time_series::TimeSeries;
