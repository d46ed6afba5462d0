// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! State-space dynamical system contract and linear implementations.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{DynamicsError, Result};

/// A continuous-time state-space model. The system owns a mutable state vector
/// of fixed dimension which integrators read before a run and write back after
/// it; the derivative and output functions themselves are pure in the state
/// they are handed.
///
/// Invariants: `f` must only be called with `input.len() == input_dimension()`
/// and `state.len()` equal to the owned state's length; `g` always returns a
/// vector of length `output_dimension()`.
pub trait DynamicalSystem: Send {
    fn input_dimension(&self) -> usize;

    fn output_dimension(&self) -> usize;

    /// Current state vector.
    fn state(&self) -> &[f32];

    /// Replace the state vector. Fails on a length mismatch.
    fn set_state(&mut self, state: &[f32]) -> Result<()>;

    /// Derivative `dstate/dt` at time `t` for the given state and input.
    fn f(&self, t: f32, state: &[f32], input: &[f32]) -> Vec<f32>;

    /// Instantaneous output at time `t` for the given state.
    fn g(&self, t: f32, state: &[f32]) -> Vec<f32>;
}

/// Linear time-invariant system `dx/dt = A x + B u`, `y = C x`.
#[derive(Debug, Clone)]
pub struct LtiSystem {
    a: Array2<f32>,
    b: Array2<f32>,
    c: Array2<f32>,
    state: Vec<f32>,
}

impl LtiSystem {
    /// Build from the dynamics, input, and output matrices plus an initial
    /// state. Shapes are checked up front: `A` must be square `n x n`, `B`
    /// `n x m`, `C` `p x n`, and the initial state length `n`.
    pub fn new(a: Array2<f32>, b: Array2<f32>, c: Array2<f32>, x0: Vec<f32>) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(DynamicsError::DimensionMismatch {
                expected: n,
                actual: a.ncols(),
            });
        }
        if b.nrows() != n {
            return Err(DynamicsError::DimensionMismatch {
                expected: n,
                actual: b.nrows(),
            });
        }
        if c.ncols() != n {
            return Err(DynamicsError::DimensionMismatch {
                expected: n,
                actual: c.ncols(),
            });
        }
        if x0.len() != n {
            return Err(DynamicsError::DimensionMismatch {
                expected: n,
                actual: x0.len(),
            });
        }
        Ok(Self { a, b, c, state: x0 })
    }

    /// First-order low-pass filter with time constant `tau`, one state per
    /// dimension: `dx/dt = (u - x) / tau`, `y = x`. This is the canonical
    /// synaptic dynamics attached to a termination.
    pub fn synaptic_filter(tau: f32, dimension: usize) -> Self {
        let a = Array2::from_diag_elem(dimension, -1.0 / tau);
        let b = Array2::from_diag_elem(dimension, 1.0 / tau);
        let c = Array2::eye(dimension);
        Self {
            a,
            b,
            c,
            state: vec![0.0; dimension],
        }
    }

    pub fn a(&self) -> &Array2<f32> {
        &self.a
    }

    pub fn b(&self) -> &Array2<f32> {
        &self.b
    }

    pub fn c(&self) -> &Array2<f32> {
        &self.c
    }
}

impl DynamicalSystem for LtiSystem {
    fn input_dimension(&self) -> usize {
        self.b.ncols()
    }

    fn output_dimension(&self) -> usize {
        self.c.nrows()
    }

    fn state(&self) -> &[f32] {
        &self.state
    }

    fn set_state(&mut self, state: &[f32]) -> Result<()> {
        if state.len() != self.state.len() {
            return Err(DynamicsError::DimensionMismatch {
                expected: self.state.len(),
                actual: state.len(),
            });
        }
        self.state.copy_from_slice(state);
        Ok(())
    }

    fn f(&self, _t: f32, state: &[f32], input: &[f32]) -> Vec<f32> {
        let x = ArrayView1::from(state);
        let u = ArrayView1::from(input);
        let dx: Array1<f32> = self.a.dot(&x) + self.b.dot(&u);
        dx.to_vec()
    }

    fn g(&self, _t: f32, state: &[f32]) -> Vec<f32> {
        let x = ArrayView1::from(state);
        self.c.dot(&x).to_vec()
    }
}
