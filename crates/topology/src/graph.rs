//! Explicit resource dependency graph.
//!
//! Nodes are resources; an edge `a -> b` means `a` must exist before `b`
//! (because `b` refers to `a`, or declares an explicit dependency on it).
//! Creation order is a topological sort of the graph and teardown order is
//! its reverse.

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::trace;

use crate::resources::{Resource, ResourceKind};
use crate::{GraphError, LogicalId};

/// Why one resource depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// A property of the dependent refers to the dependency.
    Reference,
    /// The dependent declares the dependency without referring to it.
    Explicit,
}

/// One node of the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
}

/// Dependency graph over a stack's resources.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<GraphNode, DependencyKind>,
    index: HashMap<LogicalId, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from `resources`.
    ///
    /// Fails if two resources share a logical id or a resource refers to one
    /// that is not in `resources`. Cycles are accepted here and reported by
    /// [`Self::creation_order`].
    pub fn from_resources<'a, I>(resources: I) -> Result<Self, GraphError>
    where
        I: IntoIterator<Item = Resource<'a>>,
    {
        let resources: Vec<Resource<'a>> = resources.into_iter().collect();
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for resource in &resources {
            let id = resource.logical_id().clone();
            if index.contains_key(&id) {
                return Err(GraphError::DuplicateLogicalId(id));
            }
            let node = graph.add_node(GraphNode {
                logical_id: id.clone(),
                kind: resource.kind(),
            });
            index.insert(id, node);
        }

        for resource in &resources {
            let from = resource.logical_id();
            let dependent = index[from];

            let references = resource
                .references()
                .into_iter()
                .map(|id| (id, DependencyKind::Reference));
            let explicit = resource
                .explicit_dependencies()
                .iter()
                .cloned()
                .map(|id| (id, DependencyKind::Explicit));

            for (to, kind) in references.chain(explicit) {
                let Some(&dependency) = index.get(&to) else {
                    return Err(GraphError::UnknownReference {
                        from: from.clone(),
                        to,
                    });
                };
                if graph.find_edge(dependency, dependent).is_none() {
                    trace!(%from, %to, ?kind, "Adding dependency edge");
                    graph.add_edge(dependency, dependent, kind);
                }
            }
        }

        Ok(Self { graph, index })
    }

    /// Number of resources.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of distinct dependencies.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if `dependent` refers to or explicitly depends on
    /// `dependency`.
    pub fn depends_on(&self, dependent: &LogicalId, dependency: &LogicalId) -> bool {
        match (self.index.get(dependency), self.index.get(dependent)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b).is_some(),
            _ => false,
        }
    }

    /// Direct dependencies of `dependent`.
    pub fn dependencies_of(&self, dependent: &LogicalId) -> Vec<&LogicalId> {
        let Some(&node) = self.index.get(dependent) else {
            return Vec::new();
        };
        let mut out: Vec<&LogicalId> = self
            .graph
            .neighbors_directed(node, petgraph::Direction::Incoming)
            .map(|n| &self.graph[n].logical_id)
            .collect();
        out.sort();
        out
    }

    /// Order in which the deployment engine must create the resources.
    pub fn creation_order(&self) -> Result<Vec<&GraphNode>, GraphError> {
        toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|n| &self.graph[n]).collect())
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].logical_id.clone()))
    }

    /// Order in which the deployment engine must delete the resources.
    pub fn teardown_order(&self) -> Result<Vec<&GraphNode>, GraphError> {
        let mut order = self.creation_order()?;
        order.reverse();
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        BuildEnvironment, BuildImage, BuildProject, BuildSpec, ComputeType, EnvironmentVariable,
        ResourceName, ServicePrincipal, ServiceRole, Value,
    };

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn project(logical: &str, role: &str, refers_to: &str) -> BuildProject {
        BuildProject {
            logical_id: id(logical),
            name: ResourceName::new(logical).unwrap(),
            build_spec: BuildSpec::SourceFilename("buildspec.yml".into()),
            environment: BuildEnvironment {
                compute_type: ComputeType::Small,
                image: BuildImage::AmazonLinux2Standard5,
                privileged: false,
            },
            variables: vec![EnvironmentVariable::plaintext("X", Value::Ref(id(refers_to)))],
            service_role: id(role),
            depends_on: Vec::new(),
        }
    }

    fn role(logical: &str) -> ServiceRole {
        ServiceRole {
            logical_id: id(logical),
            principal: ServicePrincipal::new("codebuild.amazonaws.com").unwrap(),
        }
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let r = role("Role");
        let p = project("Project", "Role", "Missing");
        let err =
            DependencyGraph::from_resources([Resource::ServiceRole(&r), Resource::BuildProject(&p)])
                .unwrap_err();
        assert_eq!(err, GraphError::UnknownReference { from: id("Project"), to: id("Missing") });
    }

    #[test]
    fn duplicate_logical_id_is_rejected() {
        let a = role("Role");
        let b = role("Role");
        let err =
            DependencyGraph::from_resources([Resource::ServiceRole(&a), Resource::ServiceRole(&b)])
                .unwrap_err();
        assert_eq!(err, GraphError::DuplicateLogicalId(id("Role")));
    }

    #[test]
    fn cycle_has_no_creation_order() {
        let r = role("Role");
        let a = project("A", "Role", "B");
        let b = project("B", "Role", "A");
        let graph = DependencyGraph::from_resources([
            Resource::ServiceRole(&r),
            Resource::BuildProject(&a),
            Resource::BuildProject(&b),
        ])
        .unwrap();
        assert!(matches!(graph.creation_order(), Err(GraphError::Cycle(_))));
    }

    #[test]
    fn dependencies_come_first() {
        let r = role("Role");
        let p = project("Project", "Role", "Role");
        let graph =
            DependencyGraph::from_resources([Resource::BuildProject(&p), Resource::ServiceRole(&r)])
                .unwrap();
        assert_eq!(graph.edge_count(), 1);
        let order: Vec<&str> = graph
            .creation_order()
            .unwrap()
            .iter()
            .map(|n| n.logical_id.as_str())
            .collect();
        assert_eq!(order, vec!["Role", "Project"]);
        assert!(graph.depends_on(&id("Project"), &id("Role")));
        assert_eq!(graph.dependencies_of(&id("Project")), vec![&id("Role")]);
    }
}
