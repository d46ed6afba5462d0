// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Izhikevich Neuron Model
//!
//! Two-state spiking model with a quadratic voltage nonlinearity:
//!
//! ```text
//! dv/dt = 0.04 v^2 + 5 v + 140 - u + I
//! du/dt = a (b v - u)
//!
//! if v >= 30 mV:  v <- c,  u <- u + d
//! ```
//!
//! Time is in milliseconds and voltage in millivolts, matching the published
//! parameterization. The continuous part is exposed through
//! [`DynamicalSystem`]; the discontinuous spike-and-reset update is applied by
//! [`Izhikevich::advance`].

use crate::error::{DynamicsError, Result};
use crate::system::DynamicalSystem;

/// Spike threshold in mV.
const SPIKE_THRESHOLD: f32 = 30.0;

/// Named parameter presets from the original publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IzhikevichPreset {
    /// a=0.02, b=0.2, c=-65, d=2
    Default,
    /// a=0.02, b=0.2, c=-65, d=8
    RegularSpiking,
    /// a=0.02, b=0.2, c=-55, d=4
    IntrinsicallyBursting,
    /// a=0.02, b=0.2, c=-50, d=2
    Chattering,
    /// a=0.1, b=0.2, c=-65, d=2
    FastSpiking,
    /// a=0.1, b=0.26, c=-65, d=2
    Resonator,
    /// Parameters set individually.
    Custom,
}

impl IzhikevichPreset {
    fn parameters(self) -> Option<(f32, f32, f32, f32)> {
        match self {
            IzhikevichPreset::Default => Some((0.02, 0.2, -65.0, 2.0)),
            IzhikevichPreset::RegularSpiking => Some((0.02, 0.2, -65.0, 8.0)),
            IzhikevichPreset::IntrinsicallyBursting => Some((0.02, 0.2, -55.0, 4.0)),
            IzhikevichPreset::Chattering => Some((0.02, 0.2, -50.0, 2.0)),
            IzhikevichPreset::FastSpiking => Some((0.1, 0.2, -65.0, 2.0)),
            IzhikevichPreset::Resonator => Some((0.1, 0.26, -65.0, 2.0)),
            IzhikevichPreset::Custom => None,
        }
    }
}

/// Izhikevich spiking neuron. State is `[v, u]`; the single input is the
/// injected current `I`; the single output is the membrane voltage `v`.
#[derive(Debug, Clone)]
pub struct Izhikevich {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    preset: IzhikevichPreset,
    state: Vec<f32>,
}

impl Izhikevich {
    /// Neuron with the named preset's parameters, resting at `[c, b*c]`.
    /// `Custom` starts from the `Default` parameters; use
    /// [`Self::with_parameters`] or the setters to pick the values.
    pub fn new(preset: IzhikevichPreset) -> Self {
        let (a, b, c, d) = preset
            .parameters()
            .unwrap_or((0.02, 0.2, -65.0, 2.0));
        Self {
            a,
            b,
            c,
            d,
            preset,
            state: vec![c, b * c],
        }
    }

    /// Neuron with explicit parameters, tagged `Custom`.
    pub fn with_parameters(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self {
            a,
            b,
            c,
            d,
            preset: IzhikevichPreset::Custom,
            state: vec![c, b * c],
        }
    }

    pub fn preset(&self) -> IzhikevichPreset {
        self.preset
    }

    pub fn set_preset(&mut self, preset: IzhikevichPreset) {
        if let Some((a, b, c, d)) = preset.parameters() {
            self.a = a;
            self.b = b;
            self.c = c;
            self.d = d;
        }
        self.preset = preset;
    }

    pub fn a(&self) -> f32 {
        self.a
    }

    pub fn b(&self) -> f32 {
        self.b
    }

    pub fn c(&self) -> f32 {
        self.c
    }

    pub fn d(&self) -> f32 {
        self.d
    }

    pub fn set_a(&mut self, a: f32) {
        self.a = a;
        self.preset = IzhikevichPreset::Custom;
    }

    pub fn set_b(&mut self, b: f32) {
        self.b = b;
        self.preset = IzhikevichPreset::Custom;
    }

    pub fn set_c(&mut self, c: f32) {
        self.c = c;
        self.preset = IzhikevichPreset::Custom;
    }

    pub fn set_d(&mut self, d: f32) {
        self.d = d;
        self.preset = IzhikevichPreset::Custom;
    }

    /// One forward-Euler update of `dt` milliseconds under injected current
    /// `current`, applying the spike-and-reset rule. Returns whether the
    /// neuron fired during this update.
    pub fn advance(&mut self, dt: f32, current: f32) -> bool {
        let derivative = self.f(0.0, &[self.state[0], self.state[1]], &[current]);
        self.state[0] += dt * derivative[0];
        self.state[1] += dt * derivative[1];
        if self.state[0] >= SPIKE_THRESHOLD {
            self.state[0] = self.c;
            self.state[1] += self.d;
            true
        } else {
            false
        }
    }
}

impl DynamicalSystem for Izhikevich {
    fn input_dimension(&self) -> usize {
        1
    }

    fn output_dimension(&self) -> usize {
        1
    }

    fn state(&self) -> &[f32] {
        &self.state
    }

    fn set_state(&mut self, state: &[f32]) -> Result<()> {
        if state.len() != 2 {
            return Err(DynamicsError::DimensionMismatch {
                expected: 2,
                actual: state.len(),
            });
        }
        self.state.copy_from_slice(state);
        Ok(())
    }

    fn f(&self, _t: f32, state: &[f32], input: &[f32]) -> Vec<f32> {
        let (v, u) = (state[0], state[1]);
        let current = input.first().copied().unwrap_or(0.0);
        vec![
            0.04 * v * v + 5.0 * v + 140.0 - u + current,
            self.a * (self.b * v - u),
        ]
    }

    fn g(&self, _t: f32, state: &[f32]) -> Vec<f32> {
        vec![state[0]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_carry_published_parameters() {
        let tolerance = 1e-10;
        let mut neuron = Izhikevich::new(IzhikevichPreset::Default);
        assert!((neuron.a() - 0.02).abs() < tolerance);
        assert!((neuron.b() - 0.2).abs() < tolerance);
        assert!((neuron.c() + 65.0).abs() < tolerance);
        assert!((neuron.d() - 2.0).abs() < tolerance);

        neuron.set_preset(IzhikevichPreset::Chattering);
        assert!((neuron.c() + 50.0).abs() < tolerance);

        neuron.set_preset(IzhikevichPreset::Resonator);
        assert!((neuron.a() - 0.1).abs() < tolerance);
        assert!((neuron.b() - 0.26).abs() < tolerance);
        assert!((neuron.c() + 65.0).abs() < tolerance);
    }

    #[test]
    fn explicit_parameters_build_a_custom_neuron() {
        let tolerance = 1e-6;
        let neuron = Izhikevich::with_parameters(0.03, 0.25, -60.0, 6.0);
        assert_eq!(neuron.preset(), IzhikevichPreset::Custom);
        assert!((neuron.a() - 0.03).abs() < tolerance);
        assert!((neuron.b() - 0.25).abs() < tolerance);
        assert!((neuron.c() + 60.0).abs() < tolerance);
        assert!((neuron.d() - 6.0).abs() < tolerance);
        // Resting state tracks the custom c and b.
        assert!((neuron.state()[0] + 60.0).abs() < tolerance);
        assert!((neuron.state()[1] + 15.0).abs() < tolerance);

        // A bare Custom preset starts from the Default parameters.
        let bare = Izhikevich::new(IzhikevichPreset::Custom);
        assert_eq!(bare.preset(), IzhikevichPreset::Custom);
        assert!((bare.a() - 0.02).abs() < tolerance);
        assert!((bare.d() - 2.0).abs() < tolerance);
    }

    #[test]
    fn parameter_override_switches_to_custom() {
        let mut neuron = Izhikevich::new(IzhikevichPreset::Resonator);
        neuron.set_a(0.05);
        assert_eq!(neuron.preset(), IzhikevichPreset::Custom);
        assert!((neuron.a() - 0.05).abs() < 1e-10);
    }

    #[test]
    fn fast_spiking_fires_more_than_regular_spiking() {
        let mut regular = Izhikevich::new(IzhikevichPreset::RegularSpiking);
        let mut fast = Izhikevich::new(IzhikevichPreset::FastSpiking);

        let current = 10.0;
        let mut regular_count = 0;
        let mut fast_count = 0;
        for _ in 0..1000 {
            if regular.advance(1.0, current) {
                regular_count += 1;
            }
            if fast.advance(1.0, current) {
                fast_count += 1;
            }
        }

        assert!(regular_count > 0, "regular-spiking neuron never fired");
        assert!(
            fast_count > regular_count,
            "fast spiking ({fast_count}) should out-fire regular spiking ({regular_count})"
        );
    }
}
