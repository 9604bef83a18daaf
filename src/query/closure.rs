use std::collections::HashMap;

use log::debug;

use crate::error::Result;
use crate::store::{DependencyStore, EdgeType};

/// Edge lists fetched from the store, each name queried once.
struct EdgeCache<'a> {
    store: &'a DependencyStore,
    edge: EdgeType,
    seen: HashMap<String, Vec<String>>,
}

impl<'a> EdgeCache<'a> {
    fn new(store: &'a DependencyStore, edge: EdgeType) -> Self {
        Self {
            store,
            edge,
            seen: HashMap::new(),
        }
    }

    fn get(&mut self, name: &str) -> Result<&[String]> {
        if !self.seen.contains_key(name) {
            let edges = self.store.edges(name, self.edge)?;
            self.seen.insert(name.to_string(), edges);
        }
        Ok(self.seen.get(name).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Edges of a name already fetched by [`EdgeCache::get`].
    fn known(&self, name: &str) -> &[String] {
        self.seen.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Transitive dependencies and build order over the dependency store.
pub struct ClosureResolver<'a> {
    store: &'a DependencyStore,
}

impl<'a> ClosureResolver<'a> {
    pub fn new(store: &'a DependencyStore) -> Self {
        Self { store }
    }

    /// Every name reachable from `root` along `edge`, `root` included,
    /// arranged so that dependencies come before their dependents where a
    /// single pass can manage it.
    ///
    /// Cycles are not detected here; see [`ClosureResolver::cycles`].
    #[tracing::instrument(skip(self))]
    pub fn closure(&self, root: &str, edge: EdgeType) -> Result<Vec<String>> {
        let mut cache = EdgeCache::new(self.store, edge);
        let record = expand(&mut cache, root)?;
        debug!("Closure of {} has {} name(s)", root, record.len());

        let mut order: Vec<String> = Vec::with_capacity(record.len());
        for name in record {
            // Place the name right before the first placed package needing it.
            let position = order
                .iter()
                .position(|placed| cache.known(placed).contains(&name));
            match position {
                Some(i) => order.insert(i, name),
                None => order.push(name),
            }
        }
        Ok(order)
    }

    /// Elementary dependency cycles reachable from `root` along `edge`.
    ///
    /// Each cycle is reported once, starting at the member that the
    /// closure expansion discovered first. Cycles come out ordered by that
    /// first member.
    #[tracing::instrument(skip(self))]
    pub fn cycles(&self, root: &str, edge: EdgeType) -> Result<Vec<Vec<String>>> {
        let mut cache = EdgeCache::new(self.store, edge);
        let record = expand(&mut cache, root)?;
        let rank: HashMap<&str, usize> = record
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let adjacency = record
            .iter()
            .map(|name| {
                let mut next: Vec<usize> = Vec::new();
                for dep in cache.known(name) {
                    if let Some(&i) = rank.get(dep.as_str())
                        && !next.contains(&i)
                    {
                        next.push(i);
                    }
                }
                next
            })
            .collect();

        Ok(Circuits::new(adjacency)
            .find_all()
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|i| record[i].clone()).collect())
            .collect())
    }
}

/// Grow `[root]` with the edges of every name in it until a full pass adds
/// nothing. Names keep their discovery order.
fn expand(cache: &mut EdgeCache<'_>, root: &str) -> Result<Vec<String>> {
    let mut record = vec![root.to_string()];
    loop {
        let before = record.len();

        let mut discovered: Vec<String> = Vec::new();
        for name in &record {
            for dep in cache.get(name)? {
                if !discovered.contains(dep) {
                    discovered.push(dep.clone());
                }
            }
        }
        for dep in discovered {
            if !record.contains(&dep) {
                record.push(dep);
            }
        }

        if record.len() == before {
            return Ok(record);
        }
    }
}

/// Johnson's elementary circuit search over a graph whose nodes are
/// discovery ranks.
///
/// Circuits are searched from each start node in rank order, through
/// nodes of higher rank only, so every circuit is found exactly once,
/// beginning at its lowest-ranked member. Blocked nodes are not re-entered
/// until a circuit through them closes, which keeps the work per circuit
/// linear in the size of the graph.
struct Circuits {
    adjacency: Vec<Vec<usize>>,
    blocked: Vec<bool>,
    // Nodes to unblock once the keyed node unblocks.
    blocked_by: Vec<Vec<usize>>,
    stack: Vec<usize>,
    found: Vec<Vec<usize>>,
}

impl Circuits {
    fn new(adjacency: Vec<Vec<usize>>) -> Self {
        let nodes = adjacency.len();
        Self {
            adjacency,
            blocked: vec![false; nodes],
            blocked_by: vec![Vec::new(); nodes],
            stack: Vec::new(),
            found: Vec::new(),
        }
    }

    fn find_all(mut self) -> Vec<Vec<usize>> {
        for start in 0..self.adjacency.len() {
            self.blocked.fill(false);
            self.blocked_by.iter_mut().for_each(Vec::clear);
            self.circuit(start, start);
        }
        self.found
    }

    /// Extend the current path through `node`. Returns `true` when some
    /// circuit back to `start` was closed from here.
    fn circuit(&mut self, node: usize, start: usize) -> bool {
        let mut closed = false;
        self.stack.push(node);
        self.blocked[node] = true;

        for i in 0..self.adjacency[node].len() {
            let next = self.adjacency[node][i];
            if next < start {
                continue;
            }
            if next == start {
                self.found.push(self.stack.clone());
                closed = true;
            } else if !self.blocked[next] && self.circuit(next, start) {
                closed = true;
            }
        }

        if closed {
            self.unblock(node);
        } else {
            for i in 0..self.adjacency[node].len() {
                let next = self.adjacency[node][i];
                if next >= start && !self.blocked_by[next].contains(&node) {
                    self.blocked_by[next].push(node);
                }
            }
        }

        self.stack.pop();
        closed
    }

    fn unblock(&mut self, node: usize) {
        self.blocked[node] = false;
        for waiting in std::mem::take(&mut self.blocked_by[node]) {
            if self.blocked[waiting] {
                self.unblock(waiting);
            }
        }
    }
}
