use crate::diff::{DiffOptions, compute_diff};
use crate::paths::{PathGenerator, is_readme};
use crate::scheduler::schedule;
use crate::tree::RemoteTree;
use mirror_core::types::{CandidateKind, PageState, PushCandidate, RemoteNode};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap, HashSet};

fn candidates(edges: &[(usize, usize)], count: usize) -> Vec<PushCandidate> {
    (0..count)
        .map(|i| {
            let body: String = edges
                .iter()
                .filter(|(from, _)| *from == i)
                .map(|(_, to)| format!("[link](c{}.md)\n", to))
                .collect();
            PushCandidate {
                path: format!("c{}.md", i),
                kind: if i % 2 == 0 {
                    CandidateKind::New
                } else {
                    CandidateKind::Modified
                },
                title: format!("C{}", i),
                page_id: (i % 2 == 1).then(|| i.to_string()),
                version: Some(1),
                body
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn test_diff_buckets_are_exact(
        remote in prop::collection::btree_map(0u8..30, 1u64..5, 0..20),
        recorded in prop::collection::btree_map(0u8..30, 0u64..5, 0..20)
    ) {
        let nodes: Vec<RemoteNode> = remote
            .iter()
            .map(|(id, v)| RemoteNode::page(id.to_string(), "t", None, *v))
            .collect();
        let records: BTreeMap<String, String> = recorded
            .keys()
            .map(|id| (id.to_string(), format!("p{}.md", id)))
            .collect();
        let local: HashMap<String, PageState> = recorded
            .iter()
            .map(|(id, v)| {
                (id.to_string(), PageState {
                    page_id: id.to_string(),
                    title: String::new(),
                    version: *v,
                    updated_at: None,
                    synced_at: None
                })
            })
            .collect();

        let changes = compute_diff(&nodes, &records, &local, &DiffOptions::default());
        let added: HashSet<String> = changes.added.iter().map(|e| e.page_id.clone()).collect();
        let modified: HashSet<String> = changes.modified.iter().map(|e| e.page_id.clone()).collect();
        let deleted: HashSet<String> = changes.deleted.iter().map(|e| e.page_id.clone()).collect();

        for id in remote.keys().chain(recorded.keys()) {
            let key = id.to_string();
            let in_remote = remote.contains_key(id);
            let in_local = recorded.contains_key(id);
            prop_assert_eq!(added.contains(&key), in_remote && !in_local);
            prop_assert_eq!(deleted.contains(&key), in_local && !in_remote);
            prop_assert_eq!(
                modified.contains(&key),
                in_remote && in_local && remote[id] > recorded[id]
            );
        }
        prop_assert!(added.is_disjoint(&modified));
        prop_assert!(modified.is_disjoint(&deleted));
    }

    #[test]
    fn test_generated_paths_are_unique_and_inside_root(
        nodes in prop::collection::vec((any::<prop::sample::Index>(), "[a-c ?]{0,4}", any::<bool>()), 1..40)
    ) {
        let mut remote = vec![RemoteNode::page("n0", "Home", None, 1)];
        for (i, (parent, title, folder)) in nodes.iter().enumerate() {
            let id = format!("n{}", i + 1);
            let parent = format!("n{}", parent.index(i + 1));
            remote.push(if *folder {
                RemoteNode::folder(id, title.clone(), Some(&parent))
            } else {
                RemoteNode::page(id, title.clone(), Some(&parent), 1)
            });
        }
        let tree = RemoteTree::new(remote.clone());
        let paths = PathGenerator::new(&tree, Some("n0")).assign_all();

        prop_assert_eq!(paths.len(), remote.len());
        let distinct: HashSet<&String> = paths.values().collect();
        prop_assert_eq!(distinct.len(), remote.len());
        for path in paths.values() {
            let normalized = utils::normalize_relative(path);
            prop_assert_eq!(normalized.as_deref(), Some(path.as_str()));
        }
    }

    #[test]
    fn test_reserved_paths_stay_with_their_owners(
        nodes in prop::collection::vec(
            (any::<prop::sample::Index>(), "[a-c ]{0,3}", any::<bool>(), 0u8..3),
            1..30
        )
    ) {
        let mut remote = vec![RemoteNode::page("n0", "Home", None, 1)];
        for (i, (parent, title, folder, _)) in nodes.iter().enumerate() {
            let id = format!("n{}", i + 1);
            let parent = format!("n{}", parent.index(i + 1));
            remote.push(if *folder {
                RemoteNode::folder(id, title.clone(), Some(&parent))
            } else {
                RemoteNode::page(id, title.clone(), Some(&parent), 1)
            });
        }
        let tree = RemoteTree::new(remote.clone());
        let prior = PathGenerator::new(&tree, Some("n0")).assign_all();

        // 0 keeps its path, 1 is regenerated, 2 left its path to a removed page.
        let mut generator = PathGenerator::new(&tree, Some("n0"));
        let mut reserved: HashMap<String, String> = HashMap::new();
        for (i, node) in remote.iter().enumerate() {
            let plan = if i == 0 { 0 } else { nodes[i - 1].3 };
            let path = &prior[&node.id];
            let owner = if plan == 2 { format!("gone{}", i) } else { node.id.clone() };
            if plan == 0 {
                generator.pin(&node.id, path);
            }
            generator.reserve(&owner, path, node.is_folder());
            if is_readme(path) && path.contains('/') {
                reserved.insert(utils::parent_dir(path).to_string(), owner.clone());
            }
            reserved.insert(path.clone(), owner);
        }
        let paths = generator.assign_all();

        prop_assert_eq!(paths.len(), remote.len());
        let distinct: HashSet<&String> = paths.values().collect();
        prop_assert_eq!(distinct.len(), remote.len());
        for (id, path) in &paths {
            let mut claimed = vec![path.as_str()];
            if is_readme(path) && path.contains('/') {
                claimed.push(utils::parent_dir(path));
            }
            for taken in claimed {
                if let Some(owner) = reserved.get(taken) {
                    prop_assert_eq!(owner, id, "{} took {} reserved for {}", id, taken, owner);
                }
            }
        }
    }

    #[test]
    fn test_acyclic_links_sort_targets_first(
        raw in prop::collection::vec((0usize..12, 0usize..12), 0..30),
        count in 1usize..12
    ) {
        // Only link to earlier candidates so the graph stays acyclic.
        let edges: Vec<(usize, usize)> = raw
            .into_iter()
            .map(|(a, b)| (a % count, b % count))
            .filter(|(a, b)| b < a)
            .collect();
        let result = schedule(candidates(&edges, count));
        prop_assert!(result.cycles.is_empty());

        let order = result.paths();
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, p)| (p.as_str(), i))
            .collect();
        for (from, to) in &edges {
            let from = format!("c{}.md", from);
            let to = format!("c{}.md", to);
            prop_assert!(position[to.as_str()] < position[from.as_str()]);
        }
    }

    #[test]
    fn test_cyclic_links_keep_every_candidate_once(
        raw in prop::collection::vec((0usize..10, 0usize..10), 0..30),
        count in 1usize..10
    ) {
        let edges: Vec<(usize, usize)> = raw
            .into_iter()
            .map(|(a, b)| (a % count, b % count))
            .filter(|(a, b)| a != b)
            .collect();
        let result = schedule(candidates(&edges, count));

        let order = result.paths();
        let unique: HashSet<&String> = order.iter().collect();
        prop_assert_eq!(order.len(), count);
        prop_assert_eq!(unique.len(), count);

        // Emit every candidate whose link targets are already out; what is
        // never emitted sits on or behind a cycle.
        let mut emitted: HashSet<usize> = HashSet::new();
        loop {
            let ready: Vec<usize> = (0..count)
                .filter(|i| !emitted.contains(i))
                .filter(|i| {
                    edges
                        .iter()
                        .filter(|(from, _)| from == i)
                        .all(|(_, to)| emitted.contains(to))
                })
                .collect();
            if ready.is_empty() {
                break;
            }
            emitted.extend(ready);
        }
        prop_assert_eq!(emitted.len() < count, !result.cycles.is_empty());

        let blocked: HashSet<String> = (0..count)
            .filter(|i| !emitted.contains(i))
            .map(|i| format!("c{}.md", i))
            .collect();
        for cycle in &result.cycles {
            prop_assert!(cycle.len() >= 2);
            prop_assert!(cycle.iter().all(|p| blocked.contains(p)));
        }
    }
}
