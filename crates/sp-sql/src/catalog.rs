//! Rule catalog: the immutable, ordered table of rewrite rules

use crate::error::{SqlError, SqlResult};
use crate::matcher::RuleMatch;
use crate::token::Token;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use sp_core::SourceDialect;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

/// Token-stream matcher: given the statement's tokens and a start index,
/// returns the edits for a match beginning at that token.
pub type Matcher = fn(&[Token], usize) -> Option<RuleMatch>;

/// A dialect-to-Databricks rewrite rule.
///
/// Rules must be idempotent: applied to their own output they match nothing.
#[derive(Clone)]
pub struct RewriteRule {
    /// Stable kebab-case name used in transformation logs
    pub name: &'static str,
    /// Source dialects the rule applies to
    pub dialects: &'static [SourceDialect],
    /// Tie-breaker among rules with no ordering constraint (lower runs first)
    pub priority: u32,
    /// Rules that must run before this one
    pub after: &'static [&'static str],
    /// One-line explanation, also used as a conversion hint for escalation
    pub rationale: &'static str,
    pub matcher: Matcher,
}

impl RewriteRule {
    pub fn applies_to(&self, dialect: SourceDialect) -> bool {
        self.dialects.contains(&dialect)
    }

    /// Try to match at token `pos`
    pub fn find(&self, tokens: &[Token], pos: usize) -> Option<RuleMatch> {
        (self.matcher)(tokens, pos)
    }
}

impl fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("dialects", &self.dialects)
            .field("priority", &self.priority)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

/// Rules in application order.
///
/// The order is fixed at load time: a topological sort of the `after`
/// constraints, ties broken by `(priority, name)`. Loading fails on duplicate
/// names, unknown dependencies, or cycles.
#[derive(Debug)]
pub struct RuleCatalog {
    rules: Vec<RewriteRule>,
}

impl RuleCatalog {
    /// Validate and order a rule set
    pub fn new(rules: Vec<RewriteRule>) -> SqlResult<Self> {
        let mut graph: DiGraph<&'static str, ()> = DiGraph::new();
        let mut node_map: HashMap<&'static str, NodeIndex> = HashMap::new();

        for rule in &rules {
            if node_map.contains_key(rule.name) {
                return Err(SqlError::DuplicateRule {
                    name: rule.name.to_string(),
                });
            }
            node_map.insert(rule.name, graph.add_node(rule.name));
        }

        for rule in &rules {
            let to = node_map[rule.name];
            for dep in rule.after {
                let from = node_map
                    .get(dep)
                    .copied()
                    .ok_or_else(|| SqlError::UnknownDependency {
                        rule: rule.name.to_string(),
                        dependency: dep.to_string(),
                    })?;
                // Edge goes from dependency to dependent
                graph.add_edge(from, to, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            return Err(SqlError::CatalogCycle {
                cycle: find_cycle_path(&graph, cycle.node_id()),
            });
        }

        let order = stable_order(&graph, &rules, &node_map);
        let mut slots: Vec<Option<RewriteRule>> = rules.into_iter().map(Some).collect();
        let rules = order
            .into_iter()
            .filter_map(|node| slots[node.index()].take())
            .collect();

        Ok(Self { rules })
    }

    /// The built-in Hive and Trino catalog
    pub fn builtin() -> SqlResult<Self> {
        Self::new(crate::rules::builtin_rules())
    }

    /// All rules in application order
    pub fn rules(&self) -> &[RewriteRule] {
        &self.rules
    }

    /// Rules for one dialect, in application order
    pub fn for_dialect(&self, dialect: SourceDialect) -> impl Iterator<Item = &RewriteRule> {
        self.rules.iter().filter(move |r| r.applies_to(dialect))
    }

    pub fn get(&self, name: &str) -> Option<&RewriteRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// Position of a rule in application order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Kahn's algorithm with a min-heap on `(priority, name)` so the order does
/// not depend on declaration order
fn stable_order(
    graph: &DiGraph<&'static str, ()>,
    rules: &[RewriteRule],
    node_map: &HashMap<&'static str, NodeIndex>,
) -> Vec<NodeIndex> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let key = |n: NodeIndex| {
        let rule = &rules[n.index()];
        Reverse((rule.priority, rule.name, n.index()))
    };

    let mut ready: BinaryHeap<_> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .map(key)
        .collect();
    let mut order = Vec::with_capacity(rules.len());

    while let Some(Reverse((_, name, _))) = ready.pop() {
        let node = node_map[name];
        order.push(node);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(key(next));
            }
        }
    }
    order
}

/// Find a cycle path starting from a node for error reporting
fn find_cycle_path(graph: &DiGraph<&'static str, ()>, start: NodeIndex) -> String {
    let mut path: Vec<&str> = vec![graph[start]];
    let mut current = start;
    let mut visited = HashSet::new();
    visited.insert(current);

    while let Some(edge) = graph.edges(current).next() {
        let target = edge.target();
        path.push(graph[target]);

        if target == start || visited.contains(&target) {
            break;
        }

        visited.insert(target);
        current = target;
    }

    path.join(" -> ")
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
