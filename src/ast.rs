//! The high-level grammar AST consumed by the analyzer and lowerer.
//!
//! This is what an out-of-scope front-end (a grammar-syntax parser, not part of this
//! crate) builds. Rules carry analysis annotations (`nullable`, `left_recursive`,
//! `leader`) that start at their defaults and are populated by [`crate::analyze`] and
//! [`crate::leftrec`] before [`crate::lower::lower`] consumes the grammar.

use std::cell::Cell;
use std::rc::Rc;

use crate::charclass::CharClass;
use crate::value::Value;

/// Context handed to user action/predicate/code closures.
pub struct Context<'a> {
    pub pos: crate::cursor::Position,
    pub text: &'a [u8],
    pub state: &'a mut crate::state::StateStore,
    pub global_store: &'a mut crate::state::GlobalStore,
    /// Values bound by labeled captures visible at this point, keyed by label.
    pub vars: &'a crate::state::VarFrame,
}

impl Context<'_> {
    /// Fetch a labeled capture bound earlier in the same rule, downcast to `T`.
    pub fn var<T: 'static>(&self, label: &str) -> Option<&T> {
        self.vars.get(label)?.downcast_ref::<T>()
    }
}

/// An action closure: runs after its sub-expression matches, turning the match into a
/// user value. Returning `Err` records a `user-action` error but does not fail the match.
pub type ActionFn = Rc<dyn Fn(&mut Context) -> Result<Value, String>>;

/// A state/code closure: always succeeds, runs purely for its return value and any side
/// effects on `ctx.state`/`ctx.global_store`.
pub type CodeFn = Rc<dyn Fn(&mut Context) -> Result<Value, String>>;

/// A grammar: an ordered, non-empty list of rules. The first rule is the default
/// entrypoint.
pub struct Grammar {
    pub rules: Vec<Rule>,
}

impl Grammar {
    pub fn new(rules: Vec<Rule>) -> Self {
        Grammar { rules }
    }

    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.name == name)
    }
}

/// One named production in a grammar.
pub struct Rule {
    pub name: String,
    pub display_name: Option<String>,
    pub expr: Expr,

    // Analysis annotations, populated by `analyze`/`leftrec`. `Cell` because the
    // nullability walk in `analyze` needs interior mutability for the "visited" marker
    // while holding shared references into `Grammar::rules`.
    pub(crate) nullable: Cell<bool>,
    pub(crate) visited: Cell<bool>,
    pub(crate) left_recursive: Cell<bool>,
    pub(crate) leader: Cell<bool>,
}

impl Rule {
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Rule {
            name: name.into(),
            display_name: None,
            expr,
            nullable: Cell::new(false),
            visited: Cell::new(false),
            left_recursive: Cell::new(false),
            leader: Cell::new(false),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable.get()
    }

    pub fn is_left_recursive(&self) -> bool {
        self.left_recursive.get()
    }

    pub fn is_leader(&self) -> bool {
        self.leader.get()
    }

    pub fn display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

/// The PEG expression AST. A closed tagged variant (sum type), not a trait-object
/// hierarchy, since the set of expression kinds is fixed (SPEC_FULL.md §9).
pub enum Expr {
    Choice(Vec<Expr>),
    Sequence(Vec<Expr>),
    Labeled {
        label: String,
        expr: Box<Expr>,
        text_capture: bool,
    },
    And(Box<Expr>),
    Not(Box<Expr>),
    ZeroOrOne(Box<Expr>),
    ZeroOrMore(Box<Expr>),
    OneOrMore(Box<Expr>),
    RuleRef(String),
    Lit {
        val: String,
        ignore_case: bool,
    },
    CharClass(CharClass),
    Any,
    Action {
        expr: Box<Expr>,
        run: ActionFn,
    },
    Code(CodeFn),
    Throw(String),
    Recovery {
        expr: Box<Expr>,
        recover_expr: Box<Expr>,
        labels: Vec<String>,
    },
}

impl Expr {
    pub fn lit(val: impl Into<String>) -> Self {
        Expr::Lit { val: val.into(), ignore_case: false }
    }

    pub fn lit_ignore_case(val: impl Into<String>) -> Self {
        Expr::Lit { val: val.into(), ignore_case: true }
    }

    pub fn rule_ref(name: impl Into<String>) -> Self {
        Expr::RuleRef(name.into())
    }

    pub fn labeled(label: impl Into<String>, expr: Expr) -> Self {
        Expr::Labeled { label: label.into(), expr: Box::new(expr), text_capture: false }
    }

    pub fn text_captured(label: impl Into<String>, expr: Expr) -> Self {
        Expr::Labeled { label: label.into(), expr: Box::new(expr), text_capture: true }
    }

    pub fn action(expr: Expr, run: ActionFn) -> Self {
        Expr::Action { expr: Box::new(expr), run }
    }

    pub fn recovery(expr: Expr, recover_expr: Expr, labels: Vec<String>) -> Self {
        Expr::Recovery { expr: Box::new(expr), recover_expr: Box::new(recover_expr), labels }
    }
}
