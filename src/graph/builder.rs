//! Dependency graph construction for setup steps.
//!
//! The builder takes the step specs with their dependency edges and
//! constructs a directed acyclic graph. All structural validation happens
//! here: a [`StepGraph`] that builds successfully has unique ids, resolvable
//! edges and no cycles.

use crate::errors::GraphError;
use crate::step::StepSpec;
use std::collections::HashMap;

/// Index into the step list.
pub type StepIndex = usize;

/// A validated directed acyclic graph of steps.
#[derive(Debug, Clone)]
pub struct StepGraph {
    /// Steps indexed by their position
    specs: Vec<StepSpec>,
    /// Map from step id to index
    index_map: HashMap<String, StepIndex>,
    /// Forward edges: index -> steps that depend on it
    forward_edges: Vec<Vec<StepIndex>>,
    /// Reverse edges: index -> steps it depends on
    reverse_edges: Vec<Vec<StepIndex>>,
}

impl StepGraph {
    /// Number of steps in the graph.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when the graph holds no steps.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Get a step spec by its index.
    pub fn spec(&self, index: StepIndex) -> Option<&StepSpec> {
        self.specs.get(index)
    }

    /// Get the index for a step id.
    pub fn index_of(&self, id: &str) -> Option<StepIndex> {
        self.index_map.get(id).copied()
    }

    /// All step specs in insertion order.
    pub fn specs(&self) -> &[StepSpec] {
        &self.specs
    }

    /// Steps that depend on the given step (forward edges).
    pub fn dependents(&self, index: StepIndex) -> &[StepIndex] {
        self.forward_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Steps that the given step depends on (reverse edges).
    pub fn dependencies(&self, index: StepIndex) -> &[StepIndex] {
        self.reverse_edges.get(index).map_or(&[], |v| v.as_slice())
    }

    /// Steps with no dependencies (entry points).
    pub fn root_steps(&self) -> Vec<StepIndex> {
        self.reverse_edges
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Builder for constructing step graphs.
pub struct GraphBuilder {
    specs: Vec<StepSpec>,
}

impl GraphBuilder {
    /// Create a new builder with the given step specs.
    pub fn new(specs: Vec<StepSpec>) -> Self {
        Self { specs }
    }

    /// Build the step graph.
    ///
    /// Validates the graph structure:
    /// - Step ids must be unique
    /// - All dependencies must reference existing steps
    /// - No cycles are allowed
    pub fn build(self) -> Result<StepGraph, GraphError> {
        if self.specs.is_empty() {
            return Ok(StepGraph {
                specs: Vec::new(),
                index_map: HashMap::new(),
                forward_edges: Vec::new(),
                reverse_edges: Vec::new(),
            });
        }

        let mut index_map = HashMap::new();
        for (i, spec) in self.specs.iter().enumerate() {
            if index_map.contains_key(&spec.id) {
                return Err(GraphError::DuplicateId {
                    id: spec.id.clone(),
                });
            }
            index_map.insert(spec.id.clone(), i);
        }

        let mut forward_edges: Vec<Vec<StepIndex>> = vec![Vec::new(); self.specs.len()];
        let mut reverse_edges: Vec<Vec<StepIndex>> = vec![Vec::new(); self.specs.len()];

        for (to_idx, spec) in self.specs.iter().enumerate() {
            for dep in &spec.depends_on {
                let from_idx =
                    *index_map
                        .get(dep)
                        .ok_or_else(|| GraphError::UnknownDependency {
                            step: spec.id.clone(),
                            dependency: dep.clone(),
                        })?;

                // Edge from_idx -> to_idx: from must terminate before to starts.
                forward_edges[from_idx].push(to_idx);
                reverse_edges[to_idx].push(from_idx);
            }
        }

        let graph = StepGraph {
            specs: self.specs,
            index_map,
            forward_edges,
            reverse_edges,
        };

        Self::validate_no_cycles(&graph)?;

        Ok(graph)
    }

    /// Validate that the graph has no cycles using Kahn's algorithm.
    fn validate_no_cycles(graph: &StepGraph) -> Result<(), GraphError> {
        let mut in_degree: Vec<usize> = graph.reverse_edges.iter().map(|deps| deps.len()).collect();

        let mut queue: Vec<StepIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;

        while let Some(node) = queue.pop() {
            processed += 1;

            for &dependent in graph.dependents(node) {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push(dependent);
                }
            }
        }

        if processed != graph.len() {
            // Steps still carrying in-degree are the ones on a cycle.
            let steps: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .filter_map(|(i, _)| graph.spec(i).map(|s| s.id.clone()))
                .collect();

            return Err(GraphError::CycleDetected { steps });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, deps: Vec<&str>) -> StepSpec {
        StepSpec::new(
            id,
            format!("Step {}", id),
            true,
            deps.into_iter().map(String::from).collect(),
        )
    }

    #[test]
    fn test_build_simple_graph() {
        let specs = vec![
            spec("system-deps", vec![]),
            spec("flutter", vec!["system-deps"]),
            spec("android", vec!["system-deps"]),
            spec("shell-integration", vec!["flutter", "android"]),
        ];

        let graph = GraphBuilder::new(specs).build().unwrap();

        assert_eq!(graph.len(), 4);
        assert_eq!(graph.root_steps(), vec![0]);
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let specs = vec![
            spec("system-deps", vec![]),
            spec("flutter", vec!["system-deps"]),
            spec("android", vec!["system-deps"]),
        ];

        let graph = GraphBuilder::new(specs).build().unwrap();

        assert!(graph.dependencies(0).is_empty());
        assert_eq!(graph.dependencies(1), &[0]);
        assert_eq!(graph.dependencies(2), &[0]);
        let dependents = graph.dependents(0);
        assert!(dependents.contains(&1));
        assert!(dependents.contains(&2));
    }

    #[test]
    fn test_index_lookup() {
        let specs = vec![spec("system-deps", vec![]), spec("flutter", vec!["system-deps"])];
        let graph = GraphBuilder::new(specs).build().unwrap();

        assert_eq!(graph.index_of("flutter"), Some(1));
        assert_eq!(graph.index_of("unknown"), None);
        assert_eq!(graph.spec(0).unwrap().id, "system-deps");
    }

    #[test]
    fn test_cycle_detection() {
        let specs = vec![
            spec("a", vec!["c"]),
            spec("b", vec!["a"]),
            spec("c", vec!["b"]),
        ];

        let result = GraphBuilder::new(specs).build();
        match result {
            Err(GraphError::CycleDetected { steps }) => {
                assert_eq!(steps.len(), 3);
            }
            other => panic!("Expected CycleDetected, got {:?}", other),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let specs = vec![spec("a", vec!["a"])];

        let result = GraphBuilder::new(specs).build();
        assert!(matches!(result, Err(GraphError::CycleDetected { .. })));
    }

    #[test]
    fn test_missing_dependency() {
        let specs = vec![spec("flutter", vec!["nonexistent"])];

        let result = GraphBuilder::new(specs).build();
        match result {
            Err(GraphError::UnknownDependency { step, dependency }) => {
                assert_eq!(step, "flutter");
                assert_eq!(dependency, "nonexistent");
            }
            other => panic!("Expected UnknownDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_step_id() {
        let specs = vec![spec("flutter", vec![]), spec("flutter", vec![])];

        let result = GraphBuilder::new(specs).build();
        assert!(matches!(result, Err(GraphError::DuplicateId { .. })));
    }

    #[test]
    fn test_empty_graph() {
        let graph = GraphBuilder::new(vec![]).build().unwrap();
        assert!(graph.is_empty());
        assert!(graph.root_steps().is_empty());
    }
}
