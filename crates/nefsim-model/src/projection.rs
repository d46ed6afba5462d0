// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Projections
//!
//! Directed origin-to-termination edges. Endpoints are port selectors that
//! may name either a concrete node port or a network-exposed alias; selectors
//! are stored unresolved, and every consumer that compares or marshals
//! endpoints must first resolve them through the owning network. Two
//! selectors naming the same concrete port through different aliases are the
//! same endpoint.

use std::fmt;

/// Node names are unique within a network and serve as node identity.
pub type NodeId = String;

/// Resolved reference to a concrete origin: owning node plus port name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OriginRef {
    pub node: NodeId,
    pub origin: String,
}

impl fmt::Display for OriginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.origin)
    }
}

/// Resolved reference to a concrete termination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TerminationRef {
    pub node: NodeId,
    pub termination: String,
}

impl fmt::Display for TerminationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.termination)
    }
}

/// An unresolved projection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortSelector {
    /// A concrete port on a named node.
    Node { node: NodeId, port: String },
    /// A network-exposed alias; resolution looks it up in the network's
    /// exposure tables.
    Exposed(String),
}

impl PortSelector {
    pub fn node(node: impl Into<NodeId>, port: impl Into<String>) -> Self {
        Self::Node {
            node: node.into(),
            port: port.into(),
        }
    }

    pub fn exposed(alias: impl Into<String>) -> Self {
        Self::Exposed(alias.into())
    }
}

impl fmt::Display for PortSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node { node, port } => write!(f, "{node}.{port}"),
            Self::Exposed(alias) => write!(f, "<{alias}>"),
        }
    }
}

/// A directed edge from an origin selector to a termination selector. The
/// resolved endpoints must have equal dimensions; the owning network checks
/// this when the projection is added.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Projection {
    pub origin: PortSelector,
    pub termination: PortSelector,
}

impl Projection {
    pub fn new(origin: PortSelector, termination: PortSelector) -> Self {
        Self {
            origin,
            termination,
        }
    }
}
