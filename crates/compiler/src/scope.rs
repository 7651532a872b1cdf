//! The compiler's scope stack.
//!
//! A `Scope` tracks its kind, the names declared directly in it, and
//! the next free local-slot number. Redeclaration is only an error
//! within the same scope, so shadowing across nested blocks is
//! allowed. `next_local` resets to 0 on entering an `Fn`/`Constructor`/
//! `Class` scope and is otherwise inherited from the parent scope (see
//! [`crate::codegen::Compiler::push_scope`]).

use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Block,
    If,
    Elif,
    Else,
    Fn,
    Constructor,
    While,
    Class,
}

/// A declared name's compile-time record.
///
/// `slot` is either a local-frame slot (when `is_entity` is false) or an
/// index into the entity table (when `is_entity` is true); the two
/// namespaces share this field because a name is only ever one or the
/// other, never both.
#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    pub is_global: bool,
    pub is_entity: bool,
    pub class_bound: bool,
    pub slot: u32,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub locals: HashMap<Rc<str>, Symbol>,
    pub next_local: u32,
}

impl Scope {
    pub fn new(kind: ScopeKind) -> Self {
        Scope {
            kind,
            locals: HashMap::new(),
            next_local: 0,
        }
    }
}

/// Unresolved `break`/`continue` jump operand offsets for one enclosing
/// `while`, patched once the loop's re-evaluation and end offsets are
/// known.
#[derive(Debug, Default)]
pub struct LoopPatches {
    pub break_patches: Vec<usize>,
    pub continue_patches: Vec<usize>,
}
