//! Dense integer identities assigned during lowering.
//!
//! The reference implementation keys its memo table by the expression's pointer identity
//! (`map[int]map[any]resultTuple`, with `any` holding a `*rule`/`*choiceExpr`/etc). A
//! pointer-keyed hash map doesn't translate cleanly to Rust's ownership model and is
//! unfriendly to cache locality; per SPEC_FULL.md §9 we assign every lowered node a stable,
//! dense `u32` index instead, turning the memo table into offset-indexed vectors of small
//! maps keyed by this id.

/// Identifies one node (rule body or sub-expression) in a [`crate::lower::LoweredGrammar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Identifies one rule in a [`crate::lower::LoweredGrammar`], in source-declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub u32);
