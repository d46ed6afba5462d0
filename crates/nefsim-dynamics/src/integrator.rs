// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Integrators
//!
//! Advance a [`DynamicalSystem`] over the interval spanned by a driving
//! [`TimeSeries`]. The input series defines the system's drive at (possibly
//! irregular) sample times; integrators interpolate between those samples and
//! make no smoothness assumption, so piecewise-constant inputs are handled
//! exactly as sampled.

use crate::error::{DynamicsError, Result};
use crate::system::DynamicalSystem;
use crate::time_series::TimeSeries;

/// Advances one dynamical system's state given a piecewise time-varying input
/// signal. The produced series holds the system's output `g` at strictly
/// increasing sample times covering the input interval, and the system's owned
/// state is left at the interval end.
pub trait Integrator: Send {
    fn integrate(
        &self,
        system: &mut dyn DynamicalSystem,
        input: &TimeSeries,
    ) -> Result<TimeSeries>;
}

/// Structural pre-checks shared by all integrators: raised before the loop
/// starts, never mid-integration.
fn check_configuration(system: &dyn DynamicalSystem, input: &TimeSeries) -> Result<()> {
    if input.is_empty() {
        return Err(DynamicsError::EmptyInput);
    }
    if input.dimension() != system.input_dimension() {
        return Err(DynamicsError::DimensionMismatch {
            expected: system.input_dimension(),
            actual: input.dimension(),
        });
    }
    Ok(())
}

fn axpy(y: &[f32], h: f32, k: &[f32]) -> Vec<f32> {
    y.iter().zip(k).map(|(a, b)| a + h * b).collect()
}

/// Fixed-step forward-Euler integrator: `state += h * f(t, state, u(t))`.
/// Used for short, cheap dynamics such as synaptic filters.
#[derive(Debug, Clone)]
pub struct EulerIntegrator {
    step_size: f32,
}

impl EulerIntegrator {
    pub fn new(step_size: f32) -> Self {
        Self { step_size }
    }

    pub fn step_size(&self) -> f32 {
        self.step_size
    }
}

impl Integrator for EulerIntegrator {
    fn integrate(
        &self,
        system: &mut dyn DynamicalSystem,
        input: &TimeSeries,
    ) -> Result<TimeSeries> {
        check_configuration(system, input)?;
        let start = input.times()[0];
        let end = input.times()[input.len() - 1];

        let mut state = system.state().to_vec();
        let mut output = TimeSeries::new(system.output_dimension());
        let mut t = start;
        output.push(t, system.g(t, &state))?;

        while t < end {
            let h = self.step_size.min(end - t);
            let u = input.sample(t);
            let derivative = system.f(t, &state, &u);
            state = axpy(&state, h, &derivative);
            t = if h >= end - t { end } else { t + h };
            output.push(t, system.g(t, &state))?;
        }

        system.set_state(&state)?;
        Ok(output)
    }
}

/// Adaptive-step integrator using the embedded Runge-Kutta-Fehlberg 4(5) pair.
///
/// Each trial step computes fourth- and fifth-order estimates from the same
/// six stage evaluations; their difference is the local error estimate. Steps
/// whose error exceeds the tolerance are shrunk by the classic
/// `0.84 * (tol/err)^(1/4)` factor and retried; comfortably accepted steps
/// grow the step size, bounded by `max_step` and clipped so no sample time
/// ever exceeds the interval end. Shrinking below `min_step` raises
/// [`DynamicsError::ToleranceNotMet`].
#[derive(Debug, Clone)]
pub struct Rk45Integrator {
    tolerance: f32,
    min_step: f32,
    max_step: f32,
}

impl Rk45Integrator {
    pub fn new(tolerance: f32) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    pub fn with_bounds(tolerance: f32, min_step: f32, max_step: f32) -> Self {
        Self {
            tolerance,
            min_step,
            max_step,
        }
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// One set of Fehlberg stage evaluations from state `y` at time `t`.
    /// Returns the fourth-order advance and the infinity-norm error estimate.
    fn trial_step(
        &self,
        system: &dyn DynamicalSystem,
        input: &TimeSeries,
        t: f32,
        y: &[f32],
        h: f32,
    ) -> (Vec<f32>, f32) {
        let eval = |time: f32, state: &[f32]| system.f(time, state, &input.sample(time));

        let k1 = eval(t, y);
        let k2 = eval(t + h / 4.0, &axpy(y, h / 4.0, &k1));
        let y3: Vec<f32> = y
            .iter()
            .zip(k1.iter().zip(&k2))
            .map(|(a, (b, c))| a + h * (3.0 / 32.0 * b + 9.0 / 32.0 * c))
            .collect();
        let k3 = eval(t + 3.0 * h / 8.0, &y3);
        let y4: Vec<f32> = y
            .iter()
            .enumerate()
            .map(|(i, a)| {
                a + h * (1932.0 / 2197.0 * k1[i] - 7200.0 / 2197.0 * k2[i]
                    + 7296.0 / 2197.0 * k3[i])
            })
            .collect();
        let k4 = eval(t + 12.0 * h / 13.0, &y4);
        let y5: Vec<f32> = y
            .iter()
            .enumerate()
            .map(|(i, a)| {
                a + h * (439.0 / 216.0 * k1[i] - 8.0 * k2[i] + 3680.0 / 513.0 * k3[i]
                    - 845.0 / 4104.0 * k4[i])
            })
            .collect();
        let k5 = eval(t + h, &y5);
        let y6: Vec<f32> = y
            .iter()
            .enumerate()
            .map(|(i, a)| {
                a + h * (-8.0 / 27.0 * k1[i] + 2.0 * k2[i] - 3544.0 / 2565.0 * k3[i]
                    + 1859.0 / 4104.0 * k4[i]
                    - 11.0 / 40.0 * k5[i])
            })
            .collect();
        let k6 = eval(t + h / 2.0, &y6);

        let mut next = Vec::with_capacity(y.len());
        let mut error: f32 = 0.0;
        for i in 0..y.len() {
            let fourth = y[i]
                + h * (25.0 / 216.0 * k1[i] + 1408.0 / 2565.0 * k3[i]
                    + 2197.0 / 4104.0 * k4[i]
                    - 1.0 / 5.0 * k5[i]);
            let fifth = y[i]
                + h * (16.0 / 135.0 * k1[i] + 6656.0 / 12825.0 * k3[i]
                    + 28561.0 / 56430.0 * k4[i]
                    - 9.0 / 50.0 * k5[i]
                    + 2.0 / 55.0 * k6[i]);
            error = error.max((fifth - fourth).abs());
            next.push(fourth);
        }
        // A diverging trial step must be rejected, not accepted as zero error.
        if next.iter().any(|v| !v.is_finite()) {
            error = f32::INFINITY;
        }
        (next, error)
    }
}

impl Default for Rk45Integrator {
    // Default tolerance sits well above the f32 rounding floor while keeping
    // dense enough output for downstream linear interpolation.
    fn default() -> Self {
        Self {
            tolerance: 5e-6,
            min_step: 1e-7,
            max_step: f32::INFINITY,
        }
    }
}

impl Integrator for Rk45Integrator {
    fn integrate(
        &self,
        system: &mut dyn DynamicalSystem,
        input: &TimeSeries,
    ) -> Result<TimeSeries> {
        check_configuration(system, input)?;
        let start = input.times()[0];
        let end = input.times()[input.len() - 1];
        let span = end - start;

        let mut state = system.state().to_vec();
        let mut output = TimeSeries::new(system.output_dimension());
        let mut t = start;
        output.push(t, system.g(t, &state))?;

        if span <= 0.0 {
            system.set_state(&state)?;
            return Ok(output);
        }

        let mut h = (span / 10.0).min(self.max_step);
        while t < end {
            h = h.min(end - t);
            let clipped = h >= end - t;
            let (next, error) = self.trial_step(system, input, t, &state, h);

            if error <= self.tolerance {
                t = if clipped { end } else { t + h };
                state = next;
                output.push(t, system.g(t, &state))?;
                // Grow cautiously after a comfortable acceptance.
                let scale = if error > 0.0 {
                    (0.84 * (self.tolerance / error).powf(0.25)).clamp(0.1, 4.0)
                } else {
                    4.0
                };
                h = (h * scale).min(self.max_step);
            } else {
                let scale = (0.84 * (self.tolerance / error).powf(0.25)).clamp(0.1, 1.0);
                h *= scale;
                if h < self.min_step {
                    return Err(DynamicsError::ToleranceNotMet {
                        time: t,
                        step: h,
                        min_step: self.min_step,
                    });
                }
            }
        }

        system.set_state(&state)?;
        Ok(output)
    }
}
