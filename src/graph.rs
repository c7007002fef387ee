use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// A directed graph over arbitrary objects.
///
/// Nodes are numbered in the order their objects are first seen, and the
/// successors of a node keep the order in which edges were added.
#[derive(Clone)]
pub struct ObjectGraph<T>
where
    T: Eq + Hash + Clone,
{
    g: Graph,
    obj_to_node: HashMap<T, usize>,
    node_to_obj: Vec<T>,
}

impl<T: Eq + Hash + Clone> ObjectGraph<T> {
    pub fn new() -> Self {
        Self {
            g: Graph::new(),
            obj_to_node: HashMap::new(),
            node_to_obj: Vec::new(),
        }
    }

    /// Add a node without edges. Returns its index.
    pub fn add_node_unique(&mut self, obj: &T) -> usize {
        let n = self.add_or_get_node(obj);
        self.g.add_nodes_up_to(n);
        n
    }

    /// Add an edge unless it is already present.
    pub fn add_edge_unique(&mut self, from: &T, to: &T) {
        let n_from = self.add_or_get_node(from);
        let n_to = self.add_or_get_node(to);
        self.g.add_edge_unique(n_from, n_to);
    }

    pub fn has_edge(&self, from: &T, to: &T) -> bool {
        match (self.obj_to_node.get(from), self.obj_to_node.get(to)) {
            (Some(n_from), Some(n_to)) => self.g.has_edge(*n_from, *n_to),
            _ => false,
        }
    }

    pub fn get_node_count(&self) -> usize {
        self.g.get_node_count()
    }

    pub fn get_node_index(&self, node: &T) -> Option<usize> {
        self.obj_to_node.get(node).copied()
    }

    pub fn get_object(&self, index: usize) -> Option<&T> {
        self.node_to_obj.get(index)
    }

    pub fn get_edges_from_index(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.g.edges[index].iter().copied()
    }

    fn add_or_get_node(&mut self, obj: &T) -> usize {
        if let Some(n) = self.obj_to_node.get(obj) {
            *n
        } else {
            let new_id = self.node_to_obj.len();
            self.node_to_obj.push(T::clone(obj));
            self.obj_to_node.insert(T::clone(obj), new_id);
            new_id
        }
    }
}

impl<T: Eq + Hash + Clone + fmt::Display> fmt::Display for ObjectGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        for (v, ws) in self.g.edges.iter().enumerate() {
            if ws.is_empty() {
                continue;
            }
            let targets: Vec<String> = ws
                .iter()
                .map(|w| format!("{}", &self.node_to_obj[*w]))
                .collect();
            writeln!(f, "  {} -> {}", &self.node_to_obj[v], targets.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct Graph {
    edges: Vec<Vec<usize>>,
}

impl Graph {
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    pub fn add_nodes_up_to(&mut self, n: usize) {
        if n >= self.edges.len() {
            self.edges.resize(n + 1, Vec::new());
        }
    }

    pub fn add_edge_unique(&mut self, from: usize, to: usize) {
        self.add_nodes_up_to(from);
        self.add_nodes_up_to(to);
        if !self.edges[from].contains(&to) {
            self.edges[from].push(to);
        }
    }

    pub fn get_node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        from < self.edges.len() && self.edges[from].contains(&to)
    }
}
