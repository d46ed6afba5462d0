// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for dynamics operations

/// Errors raised by time series construction and integration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DynamicsError {
    /// Input/state/sample length does not match the declared dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Sample times must be strictly increasing.
    #[error("sample times must be strictly increasing: {previous} followed by {next}")]
    NonMonotonicTime { previous: f32, next: f32 },

    /// The driving time series carries no samples.
    #[error("input time series has no samples")]
    EmptyInput,

    /// The adaptive integrator could not meet its error tolerance above the
    /// minimum step size. Surfaced as a failure, never silently truncated.
    #[error("error tolerance not met at t={time} (step {step} below minimum {min_step})")]
    ToleranceNotMet { time: f32, step: f32, min_step: f32 },
}

pub type Result<T> = core::result::Result<T, DynamicsError>;
