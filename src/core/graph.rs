//! Build graph construction
//!
//! Turns package declarations into an adjacency list keyed by package index
//! and rejects configurations that can never be scheduled: duplicate names,
//! prerequisites without a declaration, and cycles. Construction is pure.
//!
//! Edges point from a package to its prerequisites. Indices follow
//! declaration order, which is also the tie-break used everywhere an order
//! has to be picked among equally eligible packages.

use std::collections::{BTreeSet, HashMap};

use crate::core::package::{Package, PackageKind};
use crate::error::GraphError;

/// Visit state for cycle detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Validated, acyclic dependency graph over packages
#[derive(Debug, Clone)]
pub struct BuildGraph {
    /// Packages in declaration order
    packages: Vec<Package>,
    /// Name -> index
    index: HashMap<String, usize>,
    /// Package -> prerequisite indices (deduplicated, declaration order)
    prerequisites: Vec<Vec<usize>>,
    /// Package -> dependent indices (ascending)
    dependents: Vec<Vec<usize>>,
}

impl BuildGraph {
    /// Build and validate the graph
    pub fn new(packages: Vec<Package>) -> Result<Self, GraphError> {
        let mut index = HashMap::with_capacity(packages.len());
        for (i, pkg) in packages.iter().enumerate() {
            if index.insert(pkg.name().to_string(), i).is_some() {
                return Err(GraphError::DuplicatePackage {
                    name: pkg.name().to_string(),
                });
            }
        }

        let mut prerequisites = Vec::with_capacity(packages.len());
        let mut dependents = vec![Vec::new(); packages.len()];
        for (i, pkg) in packages.iter().enumerate() {
            let mut deps: Vec<usize> = Vec::with_capacity(pkg.prerequisites.len());
            for name in &pkg.prerequisites {
                let Some(&dep) = index.get(name) else {
                    return Err(GraphError::MissingPrerequisiteDeclaration {
                        package: pkg.name().to_string(),
                        prerequisite: name.clone(),
                    });
                };
                if !deps.contains(&dep) {
                    deps.push(dep);
                    dependents[dep].push(i);
                }
            }
            prerequisites.push(deps);
        }

        let graph = Self {
            packages,
            index,
            prerequisites,
            dependents,
        };

        if let Some(cycle) = graph.find_cycle() {
            return Err(GraphError::CyclicDependency { cycle });
        }

        tracing::debug!("Build graph validated: {} packages", graph.len());
        Ok(graph)
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the graph has no packages
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// All packages in declaration order
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Package at `index`
    pub fn package(&self, index: usize) -> &Package {
        &self.packages[index]
    }

    /// Look up a package index by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Direct prerequisites of a package
    pub fn prerequisites(&self, index: usize) -> &[usize] {
        &self.prerequisites[index]
    }

    /// Direct dependents of a package
    pub fn dependents(&self, index: usize) -> &[usize] {
        &self.dependents[index]
    }

    /// Every package that transitively depends on `index`
    pub fn transitive_dependents(&self, index: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.dependents[index].clone();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.dependents[next].iter().copied());
            }
        }
        seen
    }

    /// Targets plus their transitive prerequisites
    pub fn closure(&self, targets: &[String]) -> Result<BTreeSet<usize>, GraphError> {
        let mut roots = Vec::with_capacity(targets.len());
        for name in targets {
            let idx = self
                .index_of(name)
                .ok_or_else(|| GraphError::UnknownTarget { name: name.clone() })?;
            roots.push(idx);
        }
        Ok(self.closure_of(roots))
    }

    /// Packages built when no target is named: every standard package and
    /// whatever it requires
    pub fn default_targets(&self) -> BTreeSet<usize> {
        let roots = self
            .packages
            .iter()
            .enumerate()
            .filter(|(_, p)| p.kind == PackageKind::Standard)
            .map(|(i, _)| i);
        self.closure_of(roots)
    }

    fn closure_of(&self, roots: impl IntoIterator<Item = usize>) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = roots.into_iter().collect();
        while let Some(next) = stack.pop() {
            if seen.insert(next) {
                stack.extend(self.prerequisites[next].iter().copied());
            }
        }
        seen
    }

    /// Topological order of the whole graph
    ///
    /// Kahn's algorithm; among packages whose prerequisites are all placed,
    /// the earliest declared goes first.
    pub fn topological_order(&self) -> Vec<usize> {
        let all: BTreeSet<usize> = (0..self.len()).collect();
        self.topological_order_of(&all)
    }

    /// Topological order restricted to `subset`
    ///
    /// `subset` is expected to be closed under prerequisites (see
    /// [`Self::closure`]); edges leaving the subset are ignored.
    pub fn topological_order_of(&self, subset: &BTreeSet<usize>) -> Vec<usize> {
        let mut remaining: HashMap<usize, usize> = subset
            .iter()
            .map(|&i| {
                let n = self.prerequisites[i]
                    .iter()
                    .filter(|d| subset.contains(d))
                    .count();
                (i, n)
            })
            .collect();

        let mut ready: BTreeSet<usize> = remaining
            .iter()
            .filter(|(_, &n)| n == 0)
            .map(|(&i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(subset.len());
        while let Some(next) = ready.pop_first() {
            order.push(next);
            for dependent in &self.dependents[next] {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
        order
    }

    /// Render as a Graphviz DOT digraph, optionally restricted to `subset`
    pub fn to_dot(&self, subset: Option<&BTreeSet<usize>>) -> String {
        let included = |i: &usize| subset.map_or(true, |s| s.contains(i));

        let mut output = String::new();
        output.push_str("digraph packages {\n");
        output.push_str("    rankdir=TB;\n");
        output.push_str("    node [shape=box];\n");
        output.push('\n');

        for (i, pkg) in self.packages.iter().enumerate() {
            if !included(&i) {
                continue;
            }
            let style = match pkg.kind {
                PackageKind::Standard => "solid",
                PackageKind::Optional => "dashed",
            };
            output.push_str(&format!(
                "    \"{}\" [label=\"{}\", style={style}];\n",
                pkg.name(),
                pkg.id
            ));
        }
        output.push('\n');

        for (i, pkg) in self.packages.iter().enumerate() {
            if !included(&i) {
                continue;
            }
            for &dep in &self.prerequisites[i] {
                output.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    pkg.name(),
                    self.packages[dep].name()
                ));
            }
        }

        output.push_str("}\n");
        output
    }

    /// Find a cycle, returned as the names along it with the first repeated
    /// at the end
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.len()];
        let mut path = Vec::new();

        for start in 0..self.len() {
            if marks[start] == Mark::Unvisited {
                if let Some(cycle) = self.visit(start, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn visit(&self, node: usize, marks: &mut [Mark], path: &mut Vec<usize>) -> Option<Vec<String>> {
        marks[node] = Mark::InProgress;
        path.push(node);

        for &dep in &self.prerequisites[node] {
            match marks[dep] {
                Mark::InProgress => {
                    let start = path.iter().position(|&p| p == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&i| self.packages[i].name().to_string())
                        .collect();
                    cycle.push(self.packages[dep].name().to_string());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.visit(dep, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[node] = Mark::Done;
        None
    }
}
