//! Import → export dependency graph over the current entities.
//!
//! Adding an entity links it both to the entities it imports from and to the
//! entities already importing what it exports, so insertion order does not
//! matter. Removing a file unlinks its nodes on both sides.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::entity::CodeEntity;
use crate::extractor::import_refers_to;

#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: HashMap<String, CodeEntity>,
    /// importer → exporters
    edges: HashMap<String, Vec<String>>,
    /// exporter → importers
    callers: HashMap<String, Vec<String>>,
    /// import name → ids of entities importing it
    imports: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `entity`, linking it to every known entity that
    /// exports one of its import names and every known entity importing one
    /// of its exports.
    pub fn add_entity(&mut self, entity: CodeEntity) {
        let id = entity.id.clone();

        for import in &entity.imports {
            push_unique(self.imports.entry(import.clone()).or_default(), &id);
        }

        let mut targets = Vec::new();
        let mut importers = Vec::new();
        for node in self.nodes.values().filter(|node| node.id != id) {
            if depends_on(&entity.imports, &node.exports) {
                targets.push(node.id.clone());
            }
            if depends_on(&node.imports, &entity.exports) {
                importers.push(node.id.clone());
            }
        }

        for target in targets {
            self.link(&id, &target);
        }
        for importer in importers {
            self.link(&importer, &id);
        }

        self.nodes.insert(id, entity);
    }

    fn link(&mut self, importer: &str, exporter: &str) {
        push_unique(self.edges.entry(importer.to_owned()).or_default(), exporter);
        push_unique(self.callers.entry(exporter.to_owned()).or_default(), importer);
    }

    /// Ids reachable from `id` over forward edges within `depth` hops, in
    /// breadth-first order. The origin itself is never included, so depth 0
    /// yields nothing.
    #[must_use]
    pub fn get_related(&self, id: &str, depth: usize) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::from([id]);
        let mut related = Vec::new();
        let mut frontier: VecDeque<(&str, usize)> = VecDeque::from([(id, 0)]);

        while let Some((current, hops)) = frontier.pop_front() {
            if hops == depth {
                continue;
            }
            let Some(targets) = self.edges.get(current) else {
                continue;
            };
            for target in targets {
                if !self.nodes.contains_key(target) || !visited.insert(target.as_str()) {
                    continue;
                }
                related.push(target.clone());
                frontier.push_back((target.as_str(), hops + 1));
            }
        }
        related
    }

    /// Live entities that import something `id` exports.
    #[must_use]
    pub fn get_callers(&self, id: &str) -> Vec<String> {
        self.callers
            .get(id)
            .map(|ids| {
                ids.iter()
                    .filter(|c| self.nodes.contains_key(*c))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entities whose name equals or contains `name`, case-insensitively.
    /// Exact matches come first; ties are ordered by id.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Vec<String> {
        let needle = name.to_lowercase();
        let mut matches: Vec<(bool, &str)> = self
            .nodes
            .values()
            .filter_map(|node| {
                let candidate = node.name.to_lowercase();
                if candidate == needle {
                    Some((false, node.id.as_str()))
                } else if candidate.contains(&needle) {
                    Some((true, node.id.as_str()))
                } else {
                    None
                }
            })
            .collect();
        matches.sort_unstable();
        matches.into_iter().map(|(_, id)| id.to_owned()).collect()
    }

    /// Ids of entities recorded as importing `import`.
    #[must_use]
    pub fn importers_of(&self, import: &str) -> Vec<String> {
        self.imports
            .get(import)
            .map(|ids| {
                ids.iter()
                    .filter(|i| self.nodes.contains_key(*i))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&CodeEntity> {
        self.nodes.get(id)
    }

    /// Names of the live entities among `ids`, in order.
    #[must_use]
    pub fn names(&self, ids: &[String]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.name.clone()))
            .collect()
    }

    /// Drop every node that belongs to `file_path` together with every edge
    /// and import record touching it.
    pub fn remove_file(&mut self, file_path: &str) -> usize {
        let doomed: HashSet<String> = self
            .nodes
            .values()
            .filter(|n| n.file_path == file_path)
            .map(|n| n.id.clone())
            .collect();

        for id in &doomed {
            self.nodes.remove(id);
            for target in self.edges.remove(id).unwrap_or_default() {
                if let Some(importers) = self.callers.get_mut(&target) {
                    importers.retain(|c| c != id);
                }
            }
            for importer in self.callers.remove(id).unwrap_or_default() {
                if let Some(targets) = self.edges.get_mut(&importer) {
                    targets.retain(|t| t != id);
                }
            }
        }

        self.edges.retain(|_, targets| !targets.is_empty());
        self.callers.retain(|_, importers| !importers.is_empty());
        self.imports.retain(|_, ids| {
            ids.retain(|i| !doomed.contains(i));
            !ids.is_empty()
        });
        doomed.len()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Forward edges whose both ends are live.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|(from, _)| self.nodes.contains_key(*from))
            .map(|(_, to)| to.iter().filter(|t| self.nodes.contains_key(*t)).count())
            .sum()
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.values().map(|n| n.name.as_str())
    }
}

fn depends_on(imports: &[String], exports: &[String]) -> bool {
    imports
        .iter()
        .any(|import| exports.iter().any(|export| import_refers_to(import, export)))
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;

    fn entity(file: &str, line: usize, name: &str, imports: &[&str], exports: &[&str]) -> CodeEntity {
        let mut e = CodeEntity::new(EntityKind::Function, name, file, line, line, "");
        e.imports = imports.iter().map(|s| (*s).to_owned()).collect();
        e.exports = exports.iter().map(|s| (*s).to_owned()).collect();
        e
    }

    /// a imports b's export, b imports c's export, c imports a's export.
    fn cycle() -> DependencyGraph {
        let mut g = DependencyGraph::new();
        g.add_entity(entity("c.py", 1, "gamma", &["alpha"], &["gamma"]));
        g.add_entity(entity("b.py", 1, "beta", &["gamma"], &["beta"]));
        g.add_entity(entity("a.py", 1, "alpha", &["beta"], &["alpha"]));
        g
    }

    #[test]
    fn depth_zero_is_empty() {
        assert!(cycle().get_related("a.py:1", 0).is_empty());
    }

    #[test]
    fn depth_one_is_direct_dependencies() {
        assert_eq!(cycle().get_related("a.py:1", 1), vec!["b.py:1"]);
    }

    #[test]
    fn cycles_terminate_without_duplicates_or_origin() {
        let g = cycle();
        let related = g.get_related("a.py:1", 10);
        assert_eq!(related, vec!["b.py:1", "c.py:1"]);
    }

    #[test]
    fn callers_are_reverse_edges() {
        let g = cycle();
        assert_eq!(g.get_callers("b.py:1"), vec!["a.py:1"]);
        assert!(g.get_callers("missing").is_empty());
    }

    #[test]
    fn path_segments_link() {
        let mut g = DependencyGraph::new();
        g.add_entity(entity("src/cache.rs", 3, "LruCache", &[], &["LruCache", "get"]));
        g.add_entity(entity("src/main.rs", 1, "main", &["crate::cache::LruCache"], &["main"]));
        assert_eq!(g.get_related("src/main.rs:1", 1), vec!["src/cache.rs:3"]);
        assert_eq!(g.importers_of("crate::cache::LruCache"), vec!["src/main.rs:1"]);
    }

    #[test]
    fn re_adding_does_not_duplicate_edges() {
        let mut g = cycle();
        let before = g.edge_count();
        g.add_entity(entity("b.py", 1, "beta", &["gamma"], &["beta"]));
        assert_eq!(g.edge_count(), before);
        assert_eq!(g.get_callers("c.py:1"), vec!["b.py:1"]);
    }

    #[test]
    fn removed_nodes_are_filtered_from_reads() {
        let mut g = cycle();
        assert_eq!(g.remove_file("b.py"), 1);
        assert!(g.get_related("a.py:1", 3).is_empty());
        assert!(g.get_callers("c.py:1").is_empty());
        assert!(g.node("b.py:1").is_none());
        assert_eq!(g.node_count(), 2);
        // only c → a survives
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut forward = DependencyGraph::new();
        forward.add_entity(entity("b.py", 1, "beta", &[], &["beta"]));
        forward.add_entity(entity("a.py", 1, "alpha", &["beta"], &["alpha"]));

        let mut backward = DependencyGraph::new();
        backward.add_entity(entity("a.py", 1, "alpha", &["beta"], &["alpha"]));
        backward.add_entity(entity("b.py", 1, "beta", &[], &["beta"]));

        for g in [forward, backward] {
            assert_eq!(g.get_related("a.py:1", 1), vec!["b.py:1"]);
            assert_eq!(g.get_callers("b.py:1"), vec!["a.py:1"]);
        }
    }

    #[test]
    fn reindexed_file_drops_stale_links() {
        let mut g = DependencyGraph::new();
        g.add_entity(entity("b.py", 1, "beta", &[], &["beta"]));
        g.add_entity(entity("a.py", 1, "alpha", &["beta"], &["alpha"]));

        // a.py edited to no longer import beta
        g.remove_file("a.py");
        g.add_entity(entity("a.py", 1, "alpha", &[], &["alpha"]));

        assert!(g.get_callers("b.py:1").is_empty());
        assert!(g.get_related("a.py:1", 1).is_empty());
        assert!(g.importers_of("beta").is_empty());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn reindexed_exporter_relinks_importers() {
        let mut g = DependencyGraph::new();
        g.add_entity(entity("b.py", 1, "beta", &[], &["beta"]));
        g.add_entity(entity("a.py", 1, "alpha", &["beta"], &["alpha"]));

        g.remove_file("b.py");
        assert!(g.get_related("a.py:1", 1).is_empty());
        g.add_entity(entity("b.py", 1, "beta", &[], &["beta"]));
        assert_eq!(g.get_related("a.py:1", 1), vec!["b.py:1"]);

        // renamed export: the importer no longer resolves to it
        g.remove_file("b.py");
        g.add_entity(entity("b.py", 1, "delta", &[], &["delta"]));
        assert!(g.get_related("a.py:1", 1).is_empty());
        assert!(g.get_callers("b.py:1").is_empty());
    }

    #[test]
    fn find_by_name_exact_first() {
        let mut g = DependencyGraph::new();
        g.add_entity(entity("x.py", 5, "CacheEntry", &[], &[]));
        g.add_entity(entity("y.py", 1, "cache", &[], &[]));
        g.add_entity(entity("z.py", 2, "SmartCache", &[], &[]));
        assert_eq!(g.find_by_name("CACHE"), vec!["y.py:1", "x.py:5", "z.py:2"]);
        assert!(g.find_by_name("graph").is_empty());
    }

    #[test]
    fn names_skip_missing() {
        let g = cycle();
        assert_eq!(
            g.names(&["a.py:1".into(), "gone:1".into(), "c.py:1".into()]),
            vec!["alpha", "gamma"]
        );
    }
}
