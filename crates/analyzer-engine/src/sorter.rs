//! The chain sorter (§4.2): reorders a composite's entries so every
//! producer (`As`) precedes every consumer (`From`), deterministically.

use analyzer_domain::model::ConditionEntry;

/// Stable topological sort of `entries` by `As → From` edges.
///
/// Entries with no `From` are roots, visited in their original order; each
/// root's dependents (entries whose `From` matches the root's `As`) are
/// gathered depth-first immediately after it, also in original order. Any
/// entry unreachable from a root (a dangling or cyclic `From`) is still
/// appended at the end, in original order, so the evaluator sees it and can
/// report a missing-context error rather than the sorter silently dropping it.
#[must_use]
pub fn sort_entries(entries: &[ConditionEntry]) -> Vec<ConditionEntry> {
    let mut visited = vec![false; entries.len()];
    let mut output = Vec::with_capacity(entries.len());

    for index in 0..entries.len() {
        if entries[index].from.is_none() {
            gather(index, entries, &mut visited, &mut output);
        }
    }
    for index in 0..entries.len() {
        gather(index, entries, &mut visited, &mut output);
    }

    output
}

fn gather(
    index: usize,
    entries: &[ConditionEntry],
    visited: &mut [bool],
    output: &mut Vec<ConditionEntry>,
) {
    if visited[index] {
        return;
    }
    visited[index] = true;
    output.push(entries[index].clone());

    let Some(produced) = entries[index].as_name.as_deref() else {
        return;
    };
    for (dependent, candidate) in entries.iter().enumerate() {
        if candidate.from.as_deref() == Some(produced) {
            gather(dependent, entries, visited, output);
        }
    }
}
