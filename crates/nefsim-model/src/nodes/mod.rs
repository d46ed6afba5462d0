// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Leaf node implementations.

mod ensemble;
mod function_input;

pub use ensemble::{DecodeFn, Ensemble};
pub use function_input::{FunctionInput, TimeFunction, FUNCTION_INPUT_ORIGIN};
