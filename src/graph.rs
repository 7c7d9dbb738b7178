//! Dependency graph assembly and structural analysis.
//!
//! [`EcosystemGraph`] is built from the loaded record map. Declared
//! dependencies that resolve become [`DependencyEdge`]s; unresolved ones are
//! reported as blocking findings and the edge is simply omitted, so a missing
//! target never crashes the build.
//!
//! Cycle detection runs a depth-first traversal with an explicit recursion
//! stack per edge kind. Two cycles are the same cycle when their node sets
//! match, rotation and direction notwithstanding.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::model::{
    Category, DependencyKind, Finding, Layer, RepositoryRecord, Status,
};

/// Derived edge: `source` depends on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub kind: DependencyKind,
}

/// Output of [`EcosystemGraph::build`]: the graph plus the findings observed
/// while assembling it (unresolved dependencies).
#[derive(Debug)]
pub struct GraphBuild {
    pub graph: EcosystemGraph,
    pub findings: Vec<Finding>,
}

/// The complete audited universe: records plus derived edges.
#[derive(Debug)]
pub struct EcosystemGraph {
    records: BTreeMap<String, RepositoryRecord>,
    edges: Vec<DependencyEdge>,
    reverse_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    InStack,
    Done,
}

#[derive(Debug, Clone, Copy)]
enum DepthState {
    Computing,
    Done(Option<usize>),
}

impl EcosystemGraph {
    /// Assembles the graph from loaded records. Never fails: an unresolved
    /// dependency becomes a blocking finding and its edge is dropped.
    pub fn build(records: BTreeMap<String, RepositoryRecord>) -> GraphBuild {
        let mut findings = Vec::new();
        let mut edges = Vec::new();

        for (name, record) in &records {
            for decl in record.declared_dependencies() {
                if records.contains_key(&decl.name) {
                    edges.push(DependencyEdge {
                        source: name.clone(),
                        target: decl.name.clone(),
                        kind: decl.kind,
                    });
                } else {
                    findings.push(
                        Finding::blocking(
                            Category::Dependency,
                            name,
                            format!("unresolved dependency: {}", decl.name),
                        )
                        .with_remediation(format!(
                            "add `{}` to the ecosystem index or remove the declaration",
                            decl.name
                        )),
                    );
                }
            }
        }

        let mut reverse_counts: BTreeMap<String, usize> =
            records.keys().map(|n| (n.clone(), 0)).collect();
        for edge in &edges {
            if let Some(count) = reverse_counts.get_mut(&edge.target) {
                *count += 1;
            }
        }

        debug!(
            nodes = records.len(),
            edges = edges.len(),
            unresolved = findings.len(),
            "graph assembled"
        );

        GraphBuild {
            graph: EcosystemGraph {
                records,
                edges,
                reverse_counts,
            },
            findings,
        }
    }

    pub fn records(&self) -> &BTreeMap<String, RepositoryRecord> {
        &self.records
    }

    pub fn record(&self, name: &str) -> Option<&RepositoryRecord> {
        self.records.get(name)
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.records.len()
    }

    /// Number of edges (any kind) targeting `name`.
    pub fn reverse_dependency_count(&self, name: &str) -> usize {
        self.reverse_counts.get(name).copied().unwrap_or(0)
    }

    /// Every distinct cycle among edges of `kind`, each as the ordered node
    /// path forming the loop. Cycles with identical node sets are collapsed
    /// into one entry.
    pub fn cycles(&self, kind: DependencyKind) -> Vec<Vec<String>> {
        let adjacency = self.adjacency(kind);
        let mut state: BTreeMap<&str, Mark> = BTreeMap::new();
        let mut stack: Vec<&str> = Vec::new();
        let mut seen_sets: BTreeSet<BTreeSet<String>> = BTreeSet::new();
        let mut cycles = Vec::new();

        // BTreeMap iteration gives a fixed start order, so the result is a
        // pure function of the graph.
        for node in self.records.keys() {
            if state.get(node.as_str()).copied().unwrap_or(Mark::New) == Mark::New {
                Self::visit(
                    node,
                    &adjacency,
                    &mut state,
                    &mut stack,
                    &mut seen_sets,
                    &mut cycles,
                );
            }
        }
        cycles
    }

    fn visit<'a>(
        node: &'a str,
        adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
        state: &mut BTreeMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        seen_sets: &mut BTreeSet<BTreeSet<String>>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        state.insert(node, Mark::InStack);
        stack.push(node);

        if let Some(targets) = adjacency.get(node) {
            for &target in targets {
                match state.get(target).copied().unwrap_or(Mark::New) {
                    Mark::New => {
                        Self::visit(target, adjacency, state, stack, seen_sets, cycles);
                    }
                    Mark::InStack => {
                        // Back-edge: everything from the target's stack
                        // position onward forms the loop.
                        let start = stack.iter().position(|n| *n == target).unwrap_or(0);
                        let path: Vec<String> =
                            stack[start..].iter().map(|n| n.to_string()).collect();
                        let members: BTreeSet<String> = path.iter().cloned().collect();
                        if seen_sets.insert(members) {
                            cycles.push(path);
                        }
                    }
                    Mark::Done => {}
                }
            }
        }

        stack.pop();
        state.insert(node, Mark::Done);
    }

    /// Topological depth over `Direct` edges: 0 for nodes with no direct
    /// dependencies, otherwise one more than the deepest direct dependency.
    /// `None` when the node participates in, or transitively depends on, a
    /// direct cycle.
    pub fn topological_depths(&self) -> BTreeMap<String, Option<usize>> {
        let adjacency = self.adjacency(DependencyKind::Direct);
        let mut memo: BTreeMap<&str, DepthState> = BTreeMap::new();
        let mut depths = BTreeMap::new();
        for name in self.records.keys() {
            let depth = Self::depth(name, &adjacency, &mut memo);
            depths.insert(name.clone(), depth);
        }
        depths
    }

    fn depth<'a>(
        node: &'a str,
        adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
        memo: &mut BTreeMap<&'a str, DepthState>,
    ) -> Option<usize> {
        match memo.get(node) {
            Some(DepthState::Computing) => return None,
            Some(DepthState::Done(depth)) => return *depth,
            None => {}
        }
        memo.insert(node, DepthState::Computing);

        let mut deepest = 0usize;
        let mut undefined = false;
        if let Some(targets) = adjacency.get(node) {
            for &target in targets {
                match Self::depth(target, adjacency, memo) {
                    Some(d) => deepest = deepest.max(d + 1),
                    None => undefined = true,
                }
            }
        }

        let result = if undefined { None } else { Some(deepest) };
        memo.insert(node, DepthState::Done(result));
        result
    }

    /// Unique URL set referenced by the records (home and docs links), the
    /// input for the link prober.
    pub fn link_targets(&self) -> BTreeSet<String> {
        let mut urls = BTreeSet::new();
        for record in self.records.values() {
            if let Some(url) = &record.url {
                urls.insert(url.clone());
            }
            if let Some(url) = &record.docs_url {
                urls.insert(url.clone());
            }
        }
        urls
    }

    /// Serializable graph description for an external visualizer: nodes with
    /// computed reverse-dependency counts and topological depth, plus edges.
    pub fn export(&self) -> GraphExport {
        let depths = self.topological_depths();
        let nodes = self
            .records
            .values()
            .map(|record| ExportNode {
                name: record.name.clone(),
                layer: record.layer,
                status: record.status,
                reverse_dependencies: self.reverse_dependency_count(&record.name),
                depth: depths.get(&record.name).copied().unwrap_or(None),
            })
            .collect();
        GraphExport {
            nodes,
            edges: self.edges.clone(),
        }
    }

    fn adjacency(&self, kind: DependencyKind) -> BTreeMap<&str, Vec<&str>> {
        let mut adjacency: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for edge in &self.edges {
            if edge.kind == kind {
                adjacency
                    .entry(edge.source.as_str())
                    .or_default()
                    .push(edge.target.as_str());
            }
        }
        // Fixed neighbor order keeps traversal deterministic.
        for targets in adjacency.values_mut() {
            targets.sort_unstable();
        }
        adjacency
    }
}

// ============================================================================
// Graph export
// ============================================================================

/// Regenerated dependency-graph description for external consumers. The
/// auditor never renders graphics itself.
#[derive(Debug, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<DependencyEdge>,
}

#[derive(Debug, Serialize)]
pub struct ExportNode {
    pub name: String,
    pub layer: Option<Layer>,
    pub status: Option<Status>,
    pub reverse_dependencies: usize,
    pub depth: Option<usize>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DependencyDecl, RepositoryRecord, Severity};

    fn record_with_deps(name: &str, deps: Vec<DependencyDecl>) -> RepositoryRecord {
        let mut record = RepositoryRecord::named(name);
        record.dependencies = Some(deps);
        record
    }

    fn graph_of(records: Vec<RepositoryRecord>) -> GraphBuild {
        let map = records.into_iter().map(|r| (r.name.clone(), r)).collect();
        EcosystemGraph::build(map)
    }

    #[test]
    fn resolvable_index_builds_without_findings() {
        let build = graph_of(vec![
            record_with_deps("a", vec![DependencyDecl::direct("b")]),
            record_with_deps("b", vec![]),
        ]);
        assert!(build.findings.is_empty());
        assert_eq!(build.graph.edges().len(), 1);
    }

    #[test]
    fn unresolved_dependency_is_blocking_and_edge_omitted() {
        let build = graph_of(vec![record_with_deps(
            "a",
            vec![DependencyDecl::direct("ghost")],
        )]);
        assert!(build.graph.edges().is_empty());
        assert_eq!(build.findings.len(), 1);
        let finding = &build.findings[0];
        assert_eq!(finding.severity, Severity::Blocking);
        assert_eq!(finding.category, Category::Dependency);
        assert_eq!(finding.subject, "a");
        assert!(finding.message.contains("unresolved dependency: ghost"));
    }

    #[test]
    fn reverse_dependency_counts_count_in_edges() {
        let build = graph_of(vec![
            record_with_deps("a", vec![DependencyDecl::direct("c")]),
            record_with_deps("b", vec![DependencyDecl::direct("c")]),
            record_with_deps("c", vec![]),
        ]);
        assert_eq!(build.graph.reverse_dependency_count("c"), 2);
        assert_eq!(build.graph.reverse_dependency_count("a"), 0);
    }

    #[test]
    fn three_node_direct_cycle_reported_once_with_exact_membership() {
        let build = graph_of(vec![
            record_with_deps("a", vec![DependencyDecl::direct("b")]),
            record_with_deps("b", vec![DependencyDecl::direct("c")]),
            record_with_deps("c", vec![DependencyDecl::direct("a")]),
        ]);
        let cycles = build.graph.cycles(DependencyKind::Direct);
        assert_eq!(cycles.len(), 1);
        let members: BTreeSet<&str> = cycles[0].iter().map(String::as_str).collect();
        assert_eq!(members, BTreeSet::from(["a", "b", "c"]));
    }

    #[test]
    fn cycle_detection_is_independent_of_start_node() {
        // The same ring declared with names that sort in a different order;
        // membership must come out identical.
        let build = graph_of(vec![
            record_with_deps("zeta", vec![DependencyDecl::direct("alpha")]),
            record_with_deps("alpha", vec![DependencyDecl::direct("mid")]),
            record_with_deps("mid", vec![DependencyDecl::direct("zeta")]),
        ]);
        let cycles = build.graph.cycles(DependencyKind::Direct);
        assert_eq!(cycles.len(), 1);
        let members: BTreeSet<&str> = cycles[0].iter().map(String::as_str).collect();
        assert_eq!(members, BTreeSet::from(["alpha", "mid", "zeta"]));
    }

    #[test]
    fn conceptual_cycle_not_reported_among_direct_cycles() {
        let build = graph_of(vec![
            record_with_deps(
                "a",
                vec![DependencyDecl::typed("b", DependencyKind::Conceptual)],
            ),
            record_with_deps(
                "b",
                vec![DependencyDecl::typed("c", DependencyKind::Conceptual)],
            ),
            record_with_deps(
                "c",
                vec![DependencyDecl::typed("a", DependencyKind::Conceptual)],
            ),
        ]);
        assert!(build.graph.cycles(DependencyKind::Direct).is_empty());
        assert_eq!(build.graph.cycles(DependencyKind::Conceptual).len(), 1);
    }

    #[test]
    fn two_distinct_cycles_reported_separately() {
        let build = graph_of(vec![
            record_with_deps("a", vec![DependencyDecl::direct("b")]),
            record_with_deps("b", vec![DependencyDecl::direct("a")]),
            record_with_deps("x", vec![DependencyDecl::direct("y")]),
            record_with_deps("y", vec![DependencyDecl::direct("x")]),
        ]);
        let cycles = build.graph.cycles(DependencyKind::Direct);
        assert_eq!(cycles.len(), 2);
    }

    #[test]
    fn self_dependency_is_a_cycle_of_one() {
        let build = graph_of(vec![record_with_deps(
            "a",
            vec![DependencyDecl::direct("a")],
        )]);
        let cycles = build.graph.cycles(DependencyKind::Direct);
        assert_eq!(cycles, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn topological_depth_counts_longest_chain_and_cycles_are_undefined() {
        let build = graph_of(vec![
            record_with_deps("leaf", vec![]),
            record_with_deps("mid", vec![DependencyDecl::direct("leaf")]),
            record_with_deps("top", vec![DependencyDecl::direct("mid")]),
            record_with_deps("ring1", vec![DependencyDecl::direct("ring2")]),
            record_with_deps("ring2", vec![DependencyDecl::direct("ring1")]),
        ]);
        let depths = build.graph.topological_depths();
        assert_eq!(depths["leaf"], Some(0));
        assert_eq!(depths["mid"], Some(1));
        assert_eq!(depths["top"], Some(2));
        assert_eq!(depths["ring1"], None);
        assert_eq!(depths["ring2"], None);
    }

    #[test]
    fn link_targets_deduplicate_across_records() {
        let mut a = RepositoryRecord::named("a");
        a.url = Some("https://example.org/a".to_string());
        a.docs_url = Some("https://docs.example.org".to_string());
        let mut b = RepositoryRecord::named("b");
        b.url = Some("https://docs.example.org".to_string());
        let build = graph_of(vec![a, b]);
        let targets = build.graph.link_targets();
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn export_carries_reverse_counts_and_depths() {
        let build = graph_of(vec![
            record_with_deps("base", vec![]),
            record_with_deps("user", vec![DependencyDecl::direct("base")]),
        ]);
        let export = build.graph.export();
        let base = export.nodes.iter().find(|n| n.name == "base").unwrap();
        assert_eq!(base.reverse_dependencies, 1);
        assert_eq!(base.depth, Some(0));
        assert_eq!(export.edges.len(), 1);
    }
}
