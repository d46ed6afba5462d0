// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Explicit engine settings, passed into the coordinator at construction.
/// There is no process-wide state: two coordinators with different configs
/// coexist without interfering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many accelerator devices to use. Clamped to the number actually
    /// available; zero disables acceleration entirely.
    pub requested_devices: usize,
    /// Upper bound on the device's internal time step, in seconds. The
    /// effective bound is the minimum of this and every offloaded node's own
    /// limit.
    pub max_time_step: f32,
    /// Log accumulated device/local timing when the coordinator closes.
    pub show_timing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            requested_devices: 1,
            max_time_step: 1e-3,
            show_timing: false,
        }
    }
}
