// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Network
//!
//! The composite node: an arena of child nodes, the projections between
//! their ports, and exposure tables mapping public alias names onto concrete
//! child ports. Aliases are thin indirections that never own port data;
//! everything that compares or marshals endpoints resolves through
//! [`Network::resolve_origin`] / [`Network::resolve_termination`] first, so
//! two selectors naming the same concrete port are interchangeable
//! everywhere. Networks implement [`Node`] themselves and nest freely.

use ahash::AHashMap;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{SimulationError, StructuralError};
use crate::node::{Node, SimulationMode};
use crate::output::InstantaneousOutput;
use crate::ports::{Origin, Termination};
use crate::projection::{OriginRef, PortSelector, Projection, TerminationRef};

pub struct Network {
    name: String,
    nodes: Vec<Box<dyn Node>>,
    index: AHashMap<String, usize>,
    projections: Vec<Projection>,
    exposed_origins: AHashMap<String, OriginRef>,
    exposed_terminations: AHashMap<String, TerminationRef>,
    mode: SimulationMode,
    time: f32,
}

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            index: AHashMap::new(),
            projections: Vec::new(),
            exposed_origins: AHashMap::new(),
            exposed_terminations: AHashMap::new(),
            mode: SimulationMode::Default,
            time: 0.0,
        }
    }

    pub fn add_node(&mut self, node: Box<dyn Node>) -> Result<(), StructuralError> {
        let name = node.name().to_string();
        if self.index.contains_key(&name) {
            return Err(StructuralError::DuplicateNode(name));
        }
        self.index.insert(name, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Result<&dyn Node, StructuralError> {
        self.index
            .get(name)
            .map(|&i| &*self.nodes[i])
            .ok_or_else(|| StructuralError::UnknownNode(name.to_string()))
    }

    pub fn node_mut(&mut self, name: &str) -> Result<&mut dyn Node, StructuralError> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut *self.nodes[i]),
            None => Err(StructuralError::UnknownNode(name.to_string())),
        }
    }

    /// Child node names in insertion order.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    /// Publish a child origin under a network-level alias.
    pub fn expose_origin(
        &mut self,
        node: &str,
        origin: &str,
        alias: &str,
    ) -> Result<(), StructuralError> {
        // Target must exist before it can be exposed.
        self.node(node)?.origin(origin)?;
        if self.exposed_origins.contains_key(alias) {
            return Err(StructuralError::DuplicateAlias(alias.to_string()));
        }
        self.exposed_origins.insert(
            alias.to_string(),
            OriginRef {
                node: node.to_string(),
                origin: origin.to_string(),
            },
        );
        Ok(())
    }

    pub fn expose_termination(
        &mut self,
        node: &str,
        termination: &str,
        alias: &str,
    ) -> Result<(), StructuralError> {
        self.node(node)?.termination(termination)?;
        if self.exposed_terminations.contains_key(alias) {
            return Err(StructuralError::DuplicateAlias(alias.to_string()));
        }
        self.exposed_terminations.insert(
            alias.to_string(),
            TerminationRef {
                node: node.to_string(),
                termination: termination.to_string(),
            },
        );
        Ok(())
    }

    /// Resolve a selector to the concrete origin it names, following one
    /// level of alias indirection and validating that the port exists.
    pub fn resolve_origin(&self, selector: &PortSelector) -> Result<OriginRef, StructuralError> {
        let resolved = match selector {
            PortSelector::Node { node, port } => OriginRef {
                node: node.clone(),
                origin: port.clone(),
            },
            PortSelector::Exposed(alias) => self
                .exposed_origins
                .get(alias)
                .cloned()
                .ok_or_else(|| StructuralError::UnresolvedAlias(alias.clone()))?,
        };
        self.node(&resolved.node)?.origin(&resolved.origin)?;
        Ok(resolved)
    }

    pub fn resolve_termination(
        &self,
        selector: &PortSelector,
    ) -> Result<TerminationRef, StructuralError> {
        let resolved = match selector {
            PortSelector::Node { node, port } => TerminationRef {
                node: node.clone(),
                termination: port.clone(),
            },
            PortSelector::Exposed(alias) => self
                .exposed_terminations
                .get(alias)
                .cloned()
                .ok_or_else(|| StructuralError::UnresolvedAlias(alias.clone()))?,
        };
        self.node(&resolved.node)?
            .termination(&resolved.termination)?;
        Ok(resolved)
    }

    pub fn resolved_origin(&self, origin: &OriginRef) -> Result<&Origin, StructuralError> {
        self.node(&origin.node)?.origin(&origin.origin)
    }

    pub fn resolved_origin_mut(
        &mut self,
        origin: &OriginRef,
    ) -> Result<&mut Origin, StructuralError> {
        self.node_mut(&origin.node)?.origin_mut(&origin.origin)
    }

    pub fn resolved_termination(
        &self,
        termination: &TerminationRef,
    ) -> Result<&Termination, StructuralError> {
        self.node(&termination.node)?
            .termination(&termination.termination)
    }

    pub fn resolved_termination_mut(
        &mut self,
        termination: &TerminationRef,
    ) -> Result<&mut Termination, StructuralError> {
        self.node_mut(&termination.node)?
            .termination_mut(&termination.termination)
    }

    /// Add a projection. Both endpoints are resolved up front: unknown ports
    /// and unresolvable aliases fail here, resolved dimensions must match,
    /// and a second edge onto the same resolved (origin, termination) pair is
    /// rejected even when the selectors are spelled differently.
    pub fn add_projection(&mut self, projection: Projection) -> Result<(), StructuralError> {
        let origin_ref = self.resolve_origin(&projection.origin)?;
        let termination_ref = self.resolve_termination(&projection.termination)?;

        let origin_dimension = self.resolved_origin(&origin_ref)?.dimension();
        let termination_dimension = self.resolved_termination(&termination_ref)?.dimension();
        if origin_dimension != termination_dimension {
            return Err(StructuralError::DimensionMismatch {
                expected: origin_dimension,
                actual: termination_dimension,
            });
        }

        for existing in &self.projections {
            let same_origin = self.resolve_origin(&existing.origin)? == origin_ref;
            let same_termination =
                self.resolve_termination(&existing.termination)? == termination_ref;
            if same_origin && same_termination {
                return Err(StructuralError::DuplicateProjection {
                    origin: origin_ref.to_string(),
                    termination: termination_ref.to_string(),
                });
            }
        }

        debug!(network = %self.name, origin = %origin_ref, termination = %termination_ref,
            "projection added");
        self.projections.push(projection);
        Ok(())
    }

    /// Copy the projection's current origin value into its termination. Reads
    /// see the value produced by the previous step.
    pub fn deliver(&mut self, projection: &Projection) -> Result<(), StructuralError> {
        let origin_ref = self.resolve_origin(&projection.origin)?;
        let termination_ref = self.resolve_termination(&projection.termination)?;
        let value: InstantaneousOutput = self.resolved_origin(&origin_ref)?.value().clone();
        self.resolved_termination_mut(&termination_ref)?
            .set_input(value)
    }

    /// Step only the named child nodes, in parallel. Inputs were delivered
    /// before this call, so ordering within the subset is immaterial.
    pub fn step_subset(
        &mut self,
        names: &[String],
        start: f32,
        end: f32,
    ) -> Result<(), SimulationError> {
        let subset: ahash::AHashSet<&str> = names.iter().map(String::as_str).collect();
        self.nodes
            .par_iter_mut()
            .filter(|node| subset.contains(node.name()))
            .try_for_each(|node| node.step(start, end))
    }
}

impl Node for Network {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&mut self, start: f32, end: f32) -> Result<(), SimulationError> {
        let projections = self.projections.clone();
        for projection in &projections {
            self.deliver(projection)?;
        }
        self.nodes
            .par_iter_mut()
            .try_for_each(|node| node.step(start, end))?;
        self.time = end;
        Ok(())
    }

    fn origin(&self, name: &str) -> Result<&Origin, StructuralError> {
        let target = self
            .exposed_origins
            .get(name)
            .ok_or_else(|| StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })?
            .clone();
        self.resolved_origin(&target)
    }

    fn origin_mut(&mut self, name: &str) -> Result<&mut Origin, StructuralError> {
        let target = self
            .exposed_origins
            .get(name)
            .ok_or_else(|| StructuralError::UnknownOrigin {
                node: self.name.clone(),
                name: name.to_string(),
            })?
            .clone();
        self.resolved_origin_mut(&target)
    }

    fn origins(&self) -> Vec<&Origin> {
        self.exposed_origins
            .values()
            .filter_map(|r| self.resolved_origin(r).ok())
            .collect()
    }

    fn termination(&self, name: &str) -> Result<&Termination, StructuralError> {
        let target = self
            .exposed_terminations
            .get(name)
            .ok_or_else(|| StructuralError::UnknownTermination {
                node: self.name.clone(),
                name: name.to_string(),
            })?
            .clone();
        self.resolved_termination(&target)
    }

    fn termination_mut(&mut self, name: &str) -> Result<&mut Termination, StructuralError> {
        let target = self
            .exposed_terminations
            .get(name)
            .ok_or_else(|| StructuralError::UnknownTermination {
                node: self.name.clone(),
                name: name.to_string(),
            })?
            .clone();
        self.resolved_termination_mut(&target)
    }

    fn terminations(&self) -> Vec<&Termination> {
        self.exposed_terminations
            .values()
            .filter_map(|r| self.resolved_termination(r).ok())
            .collect()
    }

    fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Mode changes propagate to every child.
    fn set_mode(&mut self, mode: SimulationMode) {
        self.mode = mode;
        for node in &mut self.nodes {
            node.set_mode(mode);
        }
    }

    fn set_time(&mut self, time: f32) {
        self.time = time;
        for node in &mut self.nodes {
            node.set_time(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{Ensemble, FunctionInput, FUNCTION_INPUT_ORIGIN};
    use crate::output::Units;

    fn relay(name: &str) -> Ensemble {
        let mut ensemble = Ensemble::new(name, 1);
        ensemble.add_termination("in", 1, 0.005).unwrap();
        ensemble
            .add_decoded_origin("out", 1, Box::new(|_, x| x.to_vec()))
            .unwrap();
        ensemble
    }

    fn stim(name: &str, level: f32) -> FunctionInput {
        FunctionInput::new(name, vec![Box::new(move |_| level)], Units::Unk)
    }

    #[test]
    fn alias_and_direct_selectors_resolve_to_the_same_port() {
        let mut network = Network::new("net");
        network.add_node(Box::new(relay("a"))).unwrap();
        network.expose_origin("a", "out", "output").unwrap();

        let direct = network
            .resolve_origin(&PortSelector::node("a", "out"))
            .unwrap();
        let aliased = network
            .resolve_origin(&PortSelector::exposed("output"))
            .unwrap();
        assert_eq!(direct, aliased);
    }

    #[test]
    fn unresolvable_alias_is_a_structural_error() {
        let network = Network::new("net");
        let err = network
            .resolve_origin(&PortSelector::exposed("ghost"))
            .unwrap_err();
        assert!(matches!(err, StructuralError::UnresolvedAlias(_)));
    }

    #[test]
    fn duplicate_projection_is_caught_through_aliases() {
        let mut network = Network::new("net");
        network.add_node(Box::new(stim("stim", 1.0))).unwrap();
        network.add_node(Box::new(relay("a"))).unwrap();
        network
            .expose_origin("stim", FUNCTION_INPUT_ORIGIN, "drive")
            .unwrap();

        network
            .add_projection(Projection::new(
                PortSelector::node("stim", FUNCTION_INPUT_ORIGIN),
                PortSelector::node("a", "in"),
            ))
            .unwrap();
        // Same concrete edge, spelled through the alias.
        let err = network
            .add_projection(Projection::new(
                PortSelector::exposed("drive"),
                PortSelector::node("a", "in"),
            ))
            .unwrap_err();
        assert!(matches!(err, StructuralError::DuplicateProjection { .. }));
    }

    #[test]
    fn projection_dimensions_must_match() {
        let mut network = Network::new("net");
        network
            .add_node(Box::new(FunctionInput::new(
                "stim",
                vec![Box::new(|_| 0.0), Box::new(|_| 1.0)],
                Units::Unk,
            )))
            .unwrap();
        network.add_node(Box::new(relay("a"))).unwrap();

        let err = network
            .add_projection(Projection::new(
                PortSelector::node("stim", FUNCTION_INPUT_ORIGIN),
                PortSelector::node("a", "in"),
            ))
            .unwrap_err();
        assert_eq!(
            err,
            StructuralError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn duplicate_node_names_are_rejected() {
        let mut network = Network::new("net");
        network.add_node(Box::new(relay("a"))).unwrap();
        let err = network.add_node(Box::new(relay("a"))).unwrap_err();
        assert_eq!(err, StructuralError::DuplicateNode("a".to_string()));
    }

    #[test]
    fn deliver_copies_the_previous_step_value() {
        let mut network = Network::new("net");
        network.add_node(Box::new(stim("stim", 0.75))).unwrap();
        network.add_node(Box::new(relay("a"))).unwrap();
        let projection = Projection::new(
            PortSelector::node("stim", FUNCTION_INPUT_ORIGIN),
            PortSelector::node("a", "in"),
        );
        network.add_projection(projection.clone()).unwrap();

        network.deliver(&projection).unwrap();
        let delivered = network
            .node("a")
            .unwrap()
            .termination("in")
            .unwrap()
            .input()
            .cloned()
            .unwrap();
        match delivered {
            InstantaneousOutput::Real { values, .. } => assert_eq!(values, vec![0.75]),
            other => panic!("expected real input, got {other:?}"),
        }
    }

    #[test]
    fn set_mode_propagates_to_children() {
        let mut network = Network::new("net");
        network.add_node(Box::new(relay("a"))).unwrap();
        network.set_mode(SimulationMode::Rate);
        assert_eq!(network.node("a").unwrap().mode(), SimulationMode::Rate);
    }
}
