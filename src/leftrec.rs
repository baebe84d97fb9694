//! Left-recursion classification.
//!
//! Builds the first-name edge graph (rule -> rules it may call without consuming input)
//! and runs an iterative Tarjan SCC over it. Any SCC with more than one rule, or a
//! single-rule SCC with a self-edge, is left-recursive; within each such SCC the rule with
//! the lowest source-declaration index becomes the "leader" that performs Warth-style
//! seed-growing, per SPEC_FULL.md §4.2. Iterative (explicit work-stack) rather than
//! recursive so pathologically deep grammars can't blow the Rust call stack.

use rustc_hash::FxHashMap;

use crate::analyze::first_names;
use crate::ast::Grammar;

/// Run left-recursion classification over `g`, writing `left_recursive`/`leader` into each
/// rule. Must run after [`crate::analyze::analyze`].
pub fn classify(g: &Grammar) {
    let n = g.rules.len();
    let edges: Vec<Vec<usize>> = g
        .rules
        .iter()
        .map(|r| {
            first_names(g, &r.expr)
                .iter()
                .filter_map(|name| g.rule_index(name))
                .collect()
        })
        .collect();

    let sccs = tarjan_scc(n, &edges);

    for scc in &sccs {
        let has_self_loop = scc.len() == 1 && edges[scc[0]].contains(&scc[0]);
        let is_left_recursive = scc.len() > 1 || has_self_loop;
        if !is_left_recursive {
            continue;
        }
        let leader = *scc.iter().min().unwrap();
        for &idx in scc {
            g.rules[idx].left_recursive.set(true);
            g.rules[idx].leader.set(idx == leader);
        }
    }
}

/// Iterative Tarjan: each stack-machine frame is `(node, next edge index to visit)`,
/// standing in for a recursive call's instruction pointer so no Rust call stack depth is
/// used regardless of grammar depth.
fn tarjan_scc(n: usize, edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut result = Vec::new();
    let mut call_stack: Vec<(usize, usize)> = Vec::new();

    for start in 0..n {
        if index[start].is_some() {
            continue;
        }
        index[start] = Some(next_index);
        lowlink[start] = next_index;
        next_index += 1;
        stack.push(start);
        on_stack[start] = true;
        call_stack.push((start, 0));

        while let Some(&(v, pos)) = call_stack.last() {
            if pos < edges[v].len() {
                let w = edges[v][pos];
                call_stack.last_mut().unwrap().1 += 1;
                if index[w].is_none() {
                    index[w] = Some(next_index);
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w].unwrap());
                }
            } else {
                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v].unwrap() {
                    let mut component = Vec::new();
                    loop {
                        let w = stack.pop().unwrap();
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    result.push(component);
                }
            }
        }
    }

    result
}
