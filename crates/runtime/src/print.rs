//! `print` formatting and the `type_name` text used in error messages.
//!
//! Heap-allocated objects (`ARRAY`/`INSTANCE`) format their `at ADDR`
//! suffix from the object's allocation-order id rather than a raw
//! pointer, so the output is deterministic and testable instead of a
//! pointer value that moves between runs. `FN`/`CLASS` values are
//! entity-table records with program-length lifetime, never swept, so
//! their `Rc` pointer address is stable for the whole run and is used
//! directly.

use glint_core::heap::ObjectKind;
use glint_core::Value;

pub fn format_value(value: &Value) -> String {
    match value {
        Value::Nil => "NIL".to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Str(r) => match r.kind() {
            ObjectKind::Str { data, .. } => data.to_string(),
            _ => unreachable!("Str value must reference a Str object"),
        },
        Value::Array(r) => match r.kind() {
            ObjectKind::Array(items) => {
                format!("<object array: {}> at 0x{:x}", items.borrow().len(), r.id())
            }
            _ => unreachable!("Array value must reference an Array object"),
        },
        Value::Fn(proto) => format!(
            "<fn '{}': {}> at {:p}",
            proto.name,
            proto.params.len(),
            std::rc::Rc::as_ptr(proto)
        ),
        Value::NativeFn(proto) => format!("<native fn '{}' {}>", proto.name, proto.arity),
        Value::Method(r) => match r.kind() {
            ObjectKind::Method { func, .. } => format!(
                "<fn '{}': {}> at {:p}",
                func.name,
                func.params.len(),
                std::rc::Rc::as_ptr(func)
            ),
            _ => unreachable!("Method value must reference a Method object"),
        },
        Value::Class(proto) => format!("<class '{}'> at {:p}", proto.name, std::rc::Rc::as_ptr(proto)),
        Value::Instance(r) => match r.kind() {
            ObjectKind::Instance { class, .. } => {
                format!("<instance of '{}'> at 0x{:x}", class.name, r.id())
            }
            _ => unreachable!("Instance value must reference an Instance object"),
        },
    }
}

/// A human-readable type name for runtime error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Bool(_) => "bool",
        Value::Int(_) => "int",
        Value::Str(_) => "str",
        Value::Array(_) => "arr",
        Value::Fn(_) | Value::NativeFn(_) | Value::Method(_) => "callable",
        Value::Class(_) => "class",
        Value::Instance(_) => "instance",
    }
}
