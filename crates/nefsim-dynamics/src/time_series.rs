// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Ordered (time, vector) sample sequences with linear interpolation.

use crate::error::{DynamicsError, Result};

/// An ordered sequence of (time, vector) samples, monotonically increasing in
/// time. A series is empty only at construction; every `push` keeps the time
/// axis strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    times: Vec<f32>,
    values: Vec<Vec<f32>>,
    dimension: usize,
}

impl TimeSeries {
    /// An empty series carrying vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self {
            times: Vec::new(),
            values: Vec::new(),
            dimension,
        }
    }

    /// Build a series from parallel time/value lists. The lists must be the
    /// same length, non-empty, strictly increasing in time, and uniform in
    /// vector dimension.
    pub fn from_samples(times: Vec<f32>, values: Vec<Vec<f32>>) -> Result<Self> {
        if times.is_empty() {
            return Err(DynamicsError::EmptyInput);
        }
        if times.len() != values.len() {
            return Err(DynamicsError::DimensionMismatch {
                expected: times.len(),
                actual: values.len(),
            });
        }
        let dimension = values[0].len();
        let mut series = Self::new(dimension);
        for (time, value) in times.into_iter().zip(values) {
            series.push(time, value)?;
        }
        Ok(series)
    }

    /// A piecewise-constant series holding `value` over `[start, end]`. When
    /// the interval is degenerate the series carries a single sample.
    pub fn constant(start: f32, end: f32, value: Vec<f32>) -> Self {
        let dimension = value.len();
        let (times, values) = if end > start {
            (vec![start, end], vec![value.clone(), value])
        } else {
            (vec![start], vec![value])
        };
        Self {
            times,
            values,
            dimension,
        }
    }

    /// Append a sample. Fails if the time does not extend the series or the
    /// vector dimension differs.
    pub fn push(&mut self, time: f32, value: Vec<f32>) -> Result<()> {
        if value.len() != self.dimension {
            return Err(DynamicsError::DimensionMismatch {
                expected: self.dimension,
                actual: value.len(),
            });
        }
        if let Some(&previous) = self.times.last() {
            if time <= previous {
                return Err(DynamicsError::NonMonotonicTime {
                    previous,
                    next: time,
                });
            }
        }
        self.times.push(time);
        self.values.push(value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn times(&self) -> &[f32] {
        &self.times
    }

    pub fn values(&self) -> &[Vec<f32>] {
        &self.values
    }

    pub fn start_time(&self) -> Option<f32> {
        self.times.first().copied()
    }

    pub fn end_time(&self) -> Option<f32> {
        self.times.last().copied()
    }

    /// Value at `time` by linear interpolation between the neighboring
    /// samples. Queries before the first sample clamp to the first; queries at
    /// or past the final sample clamp to the last valid index. An empty series
    /// samples as the zero vector.
    pub fn sample(&self, time: f32) -> Vec<f32> {
        if self.times.is_empty() {
            return vec![0.0; self.dimension];
        }
        let upper = self.times.partition_point(|&t| t <= time);
        if upper == 0 {
            return self.values[0].clone();
        }
        if upper == self.times.len() {
            return self.values[self.times.len() - 1].clone();
        }
        let (t0, t1) = (self.times[upper - 1], self.times[upper]);
        let fraction = (time - t0) / (t1 - t0);
        self.values[upper - 1]
            .iter()
            .zip(&self.values[upper])
            .map(|(a, b)| a + fraction * (b - a))
            .collect()
    }
}
