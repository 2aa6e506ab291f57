//! Dependency-ordered push scheduling.
//!
//! A candidate that links to another candidate depends on it: the target has
//! to exist remotely before the referrer can point at it by id. Candidates
//! are ordered with Kahn's algorithm over a FIFO ready queue that is seeded
//! and refilled in input order. Whatever is left belongs to, or hangs off, a
//! cycle; it is appended with new documents before modified ones.

use crate::links;
use mirror_core::types::{CandidateKind, PushCandidate};
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    pub order: Vec<PushCandidate>,
    /// Each cycle as the ordered list of paths around it.
    pub cycles: Vec<Vec<String>>
}

impl Schedule {
    pub fn paths(&self) -> Vec<String> {
        self.order.iter().map(|c| c.path.clone()).collect()
    }
}

/// Per candidate, the indices of the candidates it links to.
fn dependency_graph(candidates: &[PushCandidate]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| (c.path.as_str(), i))
        .collect();

    candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            links::local_targets(&c.path, &c.body)
                .iter()
                .filter_map(|target| index.get(target.as_str()).copied())
                .filter(|&j| j != i)
                .collect()
        })
        .collect()
}

pub fn schedule(candidates: Vec<PushCandidate>) -> Schedule {
    let deps = dependency_graph(&candidates);
    let n = candidates.len();

    let mut remaining: Vec<usize> = deps.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (i, targets) in deps.iter().enumerate() {
        for &j in targets {
            dependents[j].push(i);
        }
    }

    let mut ready: VecDeque<usize> = (0..n).filter(|&i| remaining[i] == 0).collect();
    let mut emitted = Vec::with_capacity(n);
    let mut done = vec![false; n];

    while let Some(i) = ready.pop_front() {
        emitted.push(i);
        done[i] = true;
        for &d in &dependents[i] {
            remaining[d] -= 1;
            if remaining[d] == 0 {
                ready.push_back(d);
            }
        }
    }

    let leftover: Vec<usize> = (0..n).filter(|&i| !done[i]).collect();
    let cycles = find_cycles(&deps, &leftover)
        .into_iter()
        .map(|cycle| cycle.iter().map(|&i| candidates[i].path.clone()).collect())
        .collect::<Vec<Vec<String>>>();
    for cycle in &cycles {
        tracing::warn!("link cycle between documents: {}", cycle.join(" -> "));
    }

    let (new, modified): (Vec<usize>, Vec<usize>) = leftover
        .into_iter()
        .partition(|&i| candidates[i].kind == CandidateKind::New);
    emitted.extend(new);
    emitted.extend(modified);

    let mut slots: Vec<Option<PushCandidate>> = candidates.into_iter().map(Some).collect();
    let order = emitted
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect();

    Schedule { order, cycles }
}

/// Distinct cycles among `nodes`, found by depth-first search.
fn find_cycles(deps: &[Vec<usize>], nodes: &[usize]) -> Vec<Vec<usize>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black
    }

    let allowed: HashSet<usize> = nodes.iter().copied().collect();
    let mut marks = vec![Mark::White; deps.len()];
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut cycles = Vec::new();

    for &start in nodes {
        if marks[start] != Mark::White {
            continue;
        }
        // Iterative DFS: (node, next edge to try).
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::Grey;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            let next = deps[node][top.1..]
                .iter()
                .position(|t| allowed.contains(t));
            let Some(pos) = next else {
                marks[node] = Mark::Black;
                stack.pop();
                continue;
            };
            let target = deps[node][top.1 + pos];
            top.1 += pos + 1;

            match marks[target] {
                Mark::White => {
                    marks[target] = Mark::Grey;
                    stack.push((target, 0));
                }
                Mark::Grey => {
                    let from = stack.iter().position(|&(n, _)| n == target).unwrap_or(0);
                    let cycle: Vec<usize> = stack[from..].iter().map(|&(n, _)| n).collect();
                    if seen.insert(canonical(&cycle)) {
                        cycles.push(cycle);
                    }
                }
                Mark::Black => {}
            }
        }
    }

    cycles
}

/// Rotation of `cycle` starting at its smallest index.
fn canonical(cycle: &[usize]) -> Vec<usize> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, v)| v)
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}
