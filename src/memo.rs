//! Packrat memoization table and Warth-style seed-growing.
//!
//! `MemoTable` mirrors the reference implementation's `map[offset]map[node]resultTuple`,
//! reshaped around dense [`NodeId`]s instead of pointer identity. `grow_seed` is a direct
//! port of `parseRuleRecursiveLeader`: it seeds the memo with a failing entry so a rule's
//! own left-recursive call fails on the first attempt (forcing the non-recursive
//! alternative to produce a seed), then repeatedly reparses from the same start offset,
//! each time using the previous iteration's memoized result for the recursive call, until
//! an iteration fails to consume more input than the last, at which point the last
//! successful result wins.

use rustc_hash::FxHashMap;

use crate::cursor::Savepoint;
use crate::ids::NodeId;
use crate::value::Value;

/// One cached parse outcome at a given `(offset, node)`.
#[derive(Clone)]
pub struct MemoEntry {
    pub value: Option<Value>,
    pub matched: bool,
    pub end: Savepoint,
}

#[derive(Default)]
pub struct MemoTable {
    table: FxHashMap<usize, FxHashMap<NodeId, MemoEntry>>,
}

impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: usize, node: NodeId) -> Option<&MemoEntry> {
        self.table.get(&offset)?.get(&node)
    }

    pub fn set(&mut self, offset: usize, node: NodeId, entry: MemoEntry) {
        self.table.entry(offset).or_default().insert(node, entry);
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

/// Run the seed-growing loop for a left-recursion leader rule at `node`, starting at
/// `start_offset`/`start`. `attempt` parses the rule body once (restoring the cursor/state
/// to `start` itself) and returns its outcome; it is expected to consult `memo` for the
/// rule's own recursive call, which is why `memo` is re-seeded before every call.
pub fn grow_seed<F>(
    memo: &mut MemoTable,
    node: NodeId,
    start_offset: usize,
    start: Savepoint,
    mut attempt: F,
) -> MemoEntry
where
    F: FnMut(&mut MemoTable) -> MemoEntry,
{
    memo.set(
        start_offset,
        node,
        MemoEntry { value: None, matched: false, end: start },
    );
    let mut last = MemoEntry { value: None, matched: false, end: start };
    let mut depth = 0usize;

    loop {
        let candidate = attempt(memo);
        if !candidate.matched || (candidate.end.offset() <= last.end.offset() && depth != 0) {
            break;
        }
        last = candidate;
        memo.set(
            start_offset,
            node,
            MemoEntry { value: last.value.clone(), matched: last.matched, end: last.end },
        );
        depth += 1;
    }

    memo.set(
        start_offset,
        node,
        MemoEntry { value: last.value.clone(), matched: last.matched, end: last.end },
    );
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Position;
    use crate::value::value;

    fn sp(offset: usize) -> Savepoint {
        Savepoint { position: Position { line: 1, col: offset + 1, offset }, rune: 'x', width: 1 }
    }

    #[test]
    fn get_set_roundtrip() {
        let mut m = MemoTable::new();
        let entry = MemoEntry { value: Some(value(1i32)), matched: true, end: sp(3) };
        m.set(0, NodeId(0), entry);
        let got = m.get(0, NodeId(0)).unwrap();
        assert!(got.matched);
        assert_eq!(got.end.offset(), 3);
    }

    #[test]
    fn miss_returns_none() {
        let m = MemoTable::new();
        assert!(m.get(0, NodeId(0)).is_none());
    }

    #[test]
    fn grow_seed_stops_when_no_further_progress() {
        // Simulates a leader whose body consumes one more char per iteration up to offset
        // 3, then stalls (so growth should stop at offset 3, not loop forever).
        let calls = std::cell::RefCell::new(0usize);
        let start = sp(0);
        let result = grow_seed(&mut MemoTable::new(), NodeId(0), 0, start, |_memo| {
            let mut n = calls.borrow_mut();
            *n += 1;
            let end_offset = (*n).min(3);
            MemoEntry { value: Some(value(end_offset)), matched: true, end: sp(end_offset) }
        });
        assert_eq!(result.end.offset(), 3);
    }

    #[test]
    fn grow_seed_keeps_last_success_when_next_attempt_fails() {
        let calls = std::cell::RefCell::new(0usize);
        let start = sp(0);
        let result = grow_seed(&mut MemoTable::new(), NodeId(0), 0, start, |_memo| {
            let mut n = calls.borrow_mut();
            *n += 1;
            if *n == 1 {
                MemoEntry { value: Some(value(1i32)), matched: true, end: sp(2) }
            } else {
                MemoEntry { value: None, matched: false, end: sp(2) }
            }
        });
        assert!(result.matched);
        assert_eq!(result.end.offset(), 2);
    }

    #[test]
    fn grow_seed_accepts_first_attempt_even_at_zero_progress() {
        let result = grow_seed(&mut MemoTable::new(), NodeId(0), 0, sp(0), |_memo| MemoEntry {
            value: Some(value(())),
            matched: true,
            end: sp(0),
        });
        assert!(result.matched);
        assert_eq!(result.end.offset(), 0);
    }
}
