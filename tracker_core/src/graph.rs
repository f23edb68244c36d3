//! Result graph: one vertex per spot, one weighted directed edge per accepted link.
//!
//! Vertices are kept in an arena (spot ids in collection order) and edges in
//! a flat list; adjacency is derived on demand. Connected components use a
//! union-find over the undirected view of the edges.

use crate::error::{Result, TrackerError};
use crate::types::{LinkKind, SpotId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// An accepted link `source → target`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Edge {
    pub source: SpotId,
    pub target: SpotId,
    /// Cost of the link in the matrix it was solved from (informational)
    pub weight: f64,
    pub kind: LinkKind,
}

/// Directed weighted graph over the spots of one tracking run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ResultGraph {
    vertices: Vec<SpotId>,
    edges: Vec<Edge>,
    #[serde(skip)]
    index: HashMap<SpotId, usize>,
    #[serde(skip)]
    pairs: HashSet<(SpotId, SpotId)>,
}

impl ResultGraph {
    /// Graph holding every given spot and no edge.
    pub fn new(vertices: impl IntoIterator<Item = SpotId>) -> Self {
        let mut graph = ResultGraph::default();
        for id in vertices {
            if !graph.index.contains_key(&id) {
                graph.index.insert(id, graph.vertices.len());
                graph.vertices.push(id);
            }
        }
        graph
    }

    /// Add `source → target`. Self-loops, unknown vertices and a second
    /// edge between the same ordered pair are refused.
    pub fn add_edge(
        &mut self,
        source: SpotId,
        target: SpotId,
        weight: f64,
        kind: LinkKind,
    ) -> Result<()> {
        if source == target {
            return Err(TrackerError::SelfLoop(source));
        }
        for id in [source, target] {
            if !self.index.contains_key(&id) {
                return Err(TrackerError::UnknownVertex(id));
            }
        }
        if !self.pairs.insert((source, target)) {
            return Err(TrackerError::DuplicateEdge {
                source_id: source,
                target_id: target,
            });
        }
        self.edges.push(Edge {
            source,
            target,
            weight,
            kind,
        });
        Ok(())
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertices(&self) -> &[SpotId] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edges_of_kind(&self, kind: LinkKind) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn contains_vertex(&self, id: SpotId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn contains_edge(&self, source: SpotId, target: SpotId) -> bool {
        self.pairs.contains(&(source, target))
    }

    /// The edge `source → target`, if present.
    pub fn edge(&self, source: SpotId, target: SpotId) -> Option<&Edge> {
        if !self.contains_edge(source, target) {
            return None;
        }
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub fn successors(&self, id: SpotId) -> Vec<SpotId> {
        self.edges
            .iter()
            .filter(|e| e.source == id)
            .map(|e| e.target)
            .collect()
    }

    pub fn predecessors(&self, id: SpotId) -> Vec<SpotId> {
        self.edges
            .iter()
            .filter(|e| e.target == id)
            .map(|e| e.source)
            .collect()
    }

    /// Connected components of the undirected view.
    ///
    /// Components are ordered by their first vertex in insertion order, and
    /// vertices inside a component keep insertion order, so the output only
    /// depends on connectivity.
    pub fn connected_components(&self) -> Vec<Vec<SpotId>> {
        let mut uf = UnionFind::new(self.vertices.len());
        for e in &self.edges {
            uf.union(self.index[&e.source], self.index[&e.target]);
        }

        let mut slot_of_root: HashMap<usize, usize> = HashMap::new();
        let mut components: Vec<Vec<SpotId>> = Vec::new();
        for (i, &id) in self.vertices.iter().enumerate() {
            let root = uf.find(i);
            let slot = *slot_of_root.entry(root).or_insert_with(|| {
                components.push(Vec::new());
                components.len() - 1
            });
            components[slot].push(id);
        }
        components
    }
}

// ---------------------------------------------------------------------------
// Union-Find (path compression + union by rank)
// ---------------------------------------------------------------------------

struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]]; // path halving
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let rx = self.find(x);
        let ry = self.find(y);
        if rx == ry {
            return;
        }
        match self.rank[rx].cmp(&self.rank[ry]) {
            std::cmp::Ordering::Less => self.parent[rx] = ry,
            std::cmp::Ordering::Greater => self.parent[ry] = rx,
            std::cmp::Ordering::Equal => {
                self.parent[ry] = rx;
                self.rank[rx] += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
