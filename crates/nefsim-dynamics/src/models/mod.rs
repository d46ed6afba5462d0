// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Nonlinear neuron dynamics models.

mod izhikevich;

pub use izhikevich::{Izhikevich, IzhikevichPreset};
