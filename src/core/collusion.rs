//! Collusion Graph
//!
//! Undirected, unweighted graph of observed communications between
//! participant identities. Two identities are flagged when a path between
//! them is shorter than the configured hop threshold (default 3).
//!
//! Disconnected or unknown identities are simply not flagged. Queries hold a
//! read lock for the whole search, so a reader never sees a half-applied
//! edge insertion.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

/// Process-wide communication graph
#[derive(Debug)]
pub struct CollusionGraph {
    adjacency: RwLock<HashMap<String, HashSet<String>>>,
    threshold: usize,
}

impl CollusionGraph {
    /// `threshold`: paths strictly shorter than this many edges are flagged
    pub fn new(threshold: usize) -> Self {
        Self {
            adjacency: RwLock::new(HashMap::new()),
            threshold,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Add an undirected edge; returns false if it already existed
    ///
    /// Self-communication carries no signal and is ignored.
    pub fn record_communication(&self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        let mut adjacency = self.adjacency.write().unwrap_or_else(PoisonError::into_inner);
        let inserted = adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        if inserted {
            debug!(a, b, "Communication edge recorded");
        }
        inserted
    }

    /// Shortest path length in edges, `None` when no path exists
    pub fn distance(&self, a: &str, b: &str) -> Option<usize> {
        let adjacency = self.adjacency.read().unwrap_or_else(PoisonError::into_inner);
        bfs_distance(&adjacency, a, b, usize::MAX)
    }

    /// True iff a path shorter than the threshold connects `a` and `b`
    pub fn flag_if_close(&self, a: &str, b: &str) -> bool {
        if a == b || self.threshold == 0 {
            return false;
        }
        let adjacency = self.adjacency.read().unwrap_or_else(PoisonError::into_inner);
        let flagged = bfs_distance(&adjacency, a, b, self.threshold - 1).is_some();
        if flagged {
            info!("🕵️ Collusion flag: {} <-> {}", a, b);
        }
        flagged
    }

    /// Every identity within flagging distance of `id`, sorted
    pub fn suspicious_contacts(&self, id: &str) -> Vec<String> {
        if self.threshold == 0 {
            return Vec::new();
        }
        let adjacency = self.adjacency.read().unwrap_or_else(PoisonError::into_inner);
        if !adjacency.contains_key(id) {
            return Vec::new();
        }

        let max_depth = self.threshold - 1;
        let mut seen: HashSet<&str> = HashSet::from([id]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(id, 0)]);
        let mut contacts = Vec::new();

        while let Some((node, depth)) = queue.pop_front() {
            if depth == max_depth {
                continue;
            }
            for next in adjacency.get(node).into_iter().flatten() {
                if seen.insert(next.as_str()) {
                    contacts.push(next.clone());
                    queue.push_back((next.as_str(), depth + 1));
                }
            }
        }

        contacts.sort();
        contacts
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn edge_count(&self) -> usize {
        let adjacency = self.adjacency.read().unwrap_or_else(PoisonError::into_inner);
        adjacency.values().map(HashSet::len).sum::<usize>() / 2
    }

    /// Drop every node and edge (operator session reset)
    pub fn clear(&self) {
        self.adjacency
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Breadth-first search that gives up past `max_depth` edges
fn bfs_distance(
    adjacency: &HashMap<String, HashSet<String>>,
    from: &str,
    to: &str,
    max_depth: usize,
) -> Option<usize> {
    if !adjacency.contains_key(from) || !adjacency.contains_key(to) {
        return None;
    }
    if from == to {
        return Some(0);
    }

    let mut seen: HashSet<&str> = HashSet::from([from]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(from, 0)]);

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for next in adjacency.get(node).into_iter().flatten() {
            if next == to {
                return Some(depth + 1);
            }
            if seen.insert(next.as_str()) {
                queue.push_back((next.as_str(), depth + 1));
            }
        }
    }
    None
}
