//! Glint Runtime: the bytecode interpreter.
//!
//! Consumes a [`glint_compiler::CompiledProgram`] (entity table,
//! constant pools, top-level script chunk) and executes it on a
//! stack-and-frame VM, dispatching native calls and driving the
//! mark-and-sweep collector on `GBG`.
//!
//! # Modules
//!
//! - `vm`: the operand stack, frame stack and opcode dispatch loop.
//! - `frame`: one call activation record.
//! - `natives`: host implementations of the non-bytecode native registry.
//! - `bootstrap`: assembles the full entity table at VM construction.
//! - `print`: `print` formatting and error type-names.
//! - `disassemble`: `--dump-bytecode`'s listing.
//! - `error`: `RuntimeError`, the VM's terminal error type.

mod bootstrap;
mod disassemble;
mod error;
mod frame;
mod natives;
mod print;
mod vm;

pub use error::RuntimeError;
pub use frame::MAX_LOCALS;
pub use vm::Vm;
