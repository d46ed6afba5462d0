//! # nefsim - Heterogeneous simulation engine for population-model neural networks
//!
//! nefsim executes networks of interconnected computational units ("nodes") whose
//! outputs evolve according to continuous-time dynamics. A shared simulation clock
//! advances in discrete steps, and the bulk of the numeric work can optionally be
//! offloaded to a parallel accelerator behind a narrow session boundary.
//!
//! ## Components
//!
//! - [`dynamics`]: state-space systems, time series, and fixed/adaptive-step
//!   integrators (Euler and embedded Runge-Kutta 4/5)
//! - [`model`]: typed data ports (origins/terminations), projections, node
//!   contracts, and composite networks with exposed-port aliasing
//! - [`engine`]: device partitioning over a weighted adjacency model, accelerator
//!   session management, and the per-step marshaling coordinator
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nefsim::engine::{EngineConfig, ReferenceAccelerator, Simulator, StepCoordinator};
//! use nefsim::model::Network;
//!
//! let mut network = Network::new("top");
//! // ... add nodes and projections ...
//!
//! let accelerator = ReferenceAccelerator::detect();
//! let config = EngineConfig::default();
//! let coordinator = StepCoordinator::new(&network, &accelerator, &config)?;
//! let mut simulator = Simulator::new(coordinator);
//! simulator.run(&mut network, 0.0, 1.0, 0.001)?;
//! # Ok::<(), nefsim::model::SimulationError>(())
//! ```
//!
//! ## Feature Flags
//!
//! - **`gpu`**: probe for WGPU-visible compute devices when deciding how many
//!   accelerator devices are available (Metal/Vulkan/DirectX 12)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use nefsim_dynamics as dynamics;
pub use nefsim_engine as engine;
pub use nefsim_model as model;
