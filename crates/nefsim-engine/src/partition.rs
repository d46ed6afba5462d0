// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Device Partitioner
//!
//! Splits a network's nodes and projections between accelerator devices and
//! the local host, and builds the weighted adjacency matrix the device uses
//! to balance groups. Every endpoint is resolved through the network's alias
//! tables before any identity comparison, so exposure never changes a
//! partition.

use ahash::AHashMap;
use ndarray::Array2;
use tracing::debug;

use nefsim_model::{Network, StructuralError};

/// The device/local split. Projection entries index into
/// `network.projections()`.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub device_nodes: Vec<String>,
    pub device_projections: Vec<usize>,
    pub local_nodes: Vec<String>,
    pub local_projections: Vec<usize>,
}

/// Partition a network. A node goes to the device set when it is flagged
/// eligible; an eligible node without a device profile is a structural
/// error. A projection is device-side only when both resolved endpoints are
/// device nodes; everything else stays local.
pub fn partition(network: &Network) -> Result<Partition, StructuralError> {
    let mut result = Partition::default();

    for name in network.node_names() {
        let node = network.node(name)?;
        if node.eligible_for_device() {
            if node.device_profile().is_none() {
                return Err(StructuralError::MissingDeviceProfile(name.to_string()));
            }
            result.device_nodes.push(name.to_string());
        } else {
            result.local_nodes.push(name.to_string());
        }
    }

    for (index, projection) in network.projections().iter().enumerate() {
        let origin = network.resolve_origin(&projection.origin)?;
        let termination = network.resolve_termination(&projection.termination)?;
        let device_edge = result.device_nodes.iter().any(|n| *n == origin.node)
            && result.device_nodes.iter().any(|n| *n == termination.node);
        if device_edge {
            result.device_projections.push(index);
        } else {
            result.local_projections.push(index);
        }
    }

    debug!(
        device_nodes = result.device_nodes.len(),
        local_nodes = result.local_nodes.len(),
        device_projections = result.device_projections.len(),
        local_projections = result.local_projections.len(),
        "network partitioned"
    );
    Ok(result)
}

/// Communication weights between the given nodes: for each listed projection
/// the resolved termination dimension is accumulated into the lower triangle
/// (both edge directions fold together), then mirrored so the result is
/// symmetric with a zero diagonal. Self-loops carry no inter-group traffic
/// and contribute nothing. A projection endpoint outside `nodes` is a
/// structural error, never silently dropped.
pub fn adjacency_matrix(
    network: &Network,
    nodes: &[String],
    projections: &[usize],
) -> Result<Array2<u32>, StructuralError> {
    let index: AHashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut matrix = Array2::<u32>::zeros((nodes.len(), nodes.len()));

    let all = network.projections();
    for &p in projections {
        let projection = all
            .get(p)
            .ok_or_else(|| StructuralError::NodeNotInSet(format!("projection #{p}")))?;
        let origin = network.resolve_origin(&projection.origin)?;
        let termination = network.resolve_termination(&projection.termination)?;

        let i = *index
            .get(origin.node.as_str())
            .ok_or_else(|| StructuralError::NodeNotInSet(origin.node.clone()))?;
        let j = *index
            .get(termination.node.as_str())
            .ok_or_else(|| StructuralError::NodeNotInSet(termination.node.clone()))?;
        if i == j {
            continue;
        }

        let weight = network.resolved_termination(&termination)?.dimension() as u32;
        let (row, col) = if i > j { (i, j) } else { (j, i) };
        matrix[[row, col]] += weight;
    }

    for row in 0..nodes.len() {
        for col in 0..row {
            matrix[[col, row]] = matrix[[row, col]];
        }
    }
    Ok(matrix)
}
