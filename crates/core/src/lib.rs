//! Glint Core: value model, heap and entity tables shared by the
//! compiler and the runtime.
//!
//! The compiler writes into the `Constants` and `Entities` tables while
//! lowering an AST to bytecode; the runtime reads from the same tables
//! while executing that bytecode. Keeping both sides of that contract in
//! one crate means a `LOAD` index always means the same thing to whoever
//! emitted it and whoever dispatches it.
//!
//! # Modules
//!
//! - `value`: the tagged `Value` union the VM pushes and pops.
//! - `heap`: the mark-and-sweep object pool for `Str`/`Array`/`Method`/
//!   `Instance` values.
//! - `entity`: long-lived function/native/class records, indexed by the
//!   `LOAD` opcode.
//! - `chunk`: the opcode enum and the byte buffer a function's body
//!   compiles into.
//! - `natives`: the fixed, numbered table of built-in callables.

pub mod chunk;
pub mod entity;
pub mod heap;
pub mod natives;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use entity::{ClassProto, Entities, Entity, FunctionProto, NativeProto};
pub use heap::{Heap, ObjectKind, ObjectRef};
pub use natives::{NATIVES, NativeSignature};
pub use value::{Constants, TypeTag, Value};
