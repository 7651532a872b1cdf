//! One call activation record.
//!
//! A frame owns its instruction pointer and a fixed-capacity local-slot
//! array; it borrows its bytecode from the [`glint_core::Entity`] that
//! was called (a [`glint_core::FunctionProto`] lives as long as the VM,
//! so the frame only needs a clone of the `Rc`). The bound instance is
//! `Some` for method/constructor calls and `None` for plain functions.

use glint_core::{FunctionProto, ObjectRef, Value};
use std::rc::Rc;

/// Local-slot capacity per frame.
pub const MAX_LOCALS: usize = 255;

pub struct Frame {
    pub ip: usize,
    pub function: Rc<FunctionProto>,
    pub instance: Option<ObjectRef>,
    pub is_constructor: bool,
    pub locals: [Value; MAX_LOCALS],
}

impl Frame {
    pub fn new(function: Rc<FunctionProto>, instance: Option<ObjectRef>, is_constructor: bool) -> Self {
        Frame {
            ip: 0,
            function,
            instance,
            is_constructor,
            locals: std::array::from_fn(|_| Value::Nil),
        }
    }
}
