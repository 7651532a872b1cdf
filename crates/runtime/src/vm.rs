//! The bytecode interpreter: operand stack, frame stack, and the
//! opcode dispatch loop.
//!
//! The operand stack is a single `Vec<Value>` shared by every frame;
//! only locals are per-frame (see [`crate::frame::Frame`]). It's capped
//! at [`MAX_STACK`] to match the fixed-size stack of a real VM. `step`
//! fetches one instruction, advances the current frame's `ip` past it,
//! then executes its effect; jump opcodes overwrite `ip` afterward.

use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use glint_core::heap::ObjectKind;
use glint_core::{Chunk, Constants, Entities, Entity, FunctionProto, Heap, ObjectRef, OpCode, TypeTag, Value};

use crate::error::RuntimeError;
use crate::frame::{Frame, MAX_LOCALS};
use crate::print::{format_value, type_name};

/// Operand stack capacity.
pub const MAX_STACK: usize = 255;
/// Frame stack capacity.
pub const MAX_FRAMES: usize = 255;

struct FetchedInstr {
    op: OpCode,
    operand_u8: u8,
    operand_i32: i32,
    line: u32,
    instr_start: usize,
}

pub struct Vm {
    pub(crate) heap: Heap,
    globals: HashMap<Rc<str>, Value>,
    entities: Entities,
    constants: Constants,
    stack: Vec<Value>,
    frames: Vec<Frame>,
    stop: bool,
    exit_code: i32,
    current_line: u32,
    dump_bytecode: bool,
    stdout: Box<dyn Write>,
}

impl Vm {
    /// Build a VM ready to run `script` (the compiled program's
    /// top-level chunk) as a synthetic main frame, with `user_entities`
    /// appended after the native registry (`glint-runtime`'s
    /// `bootstrap` module). `print` writes to real stdout by default;
    /// tests redirect it with [`Vm::with_writer`].
    pub fn new(user_entities: Entities, constants: Constants, script: Chunk) -> Self {
        let entities = crate::bootstrap::build_entities(user_entities);
        let main_proto = Rc::new(FunctionProto {
            name: Rc::from("<script>"),
            params: Vec::new(),
            chunk: script,
        });
        let main_frame = Frame::new(main_proto, None, false);
        Vm {
            heap: Heap::new(),
            globals: HashMap::new(),
            entities,
            constants,
            stack: Vec::new(),
            frames: vec![main_frame],
            stop: false,
            exit_code: 0,
            current_line: 0,
            dump_bytecode: false,
            stdout: Box::new(std::io::stdout()),
        }
    }

    /// Enable a disassembly dump of every entity (and the top-level
    /// script) to stderr before execution begins (`--dump-bytecode`).
    pub fn with_dump_bytecode(mut self, enabled: bool) -> Self {
        self.dump_bytecode = enabled;
        self
    }

    /// Redirect `print` output away from stdout, e.g. to an in-memory
    /// buffer shared with the caller for exact-output tests.
    pub fn with_writer(mut self, writer: Box<dyn Write>) -> Self {
        self.stdout = writer;
        self
    }

    /// Run until the program halts (`HLT`/`RET` at the main frame,
    /// `exit`, or an unrecovered `RUNTIME_ERROR`), returning the
    /// process exit code.
    pub fn run(mut self) -> i32 {
        if self.dump_bytecode {
            crate::disassemble::dump(&self.entities, &self.frames[0].function, &mut std::io::stderr());
        }
        while !self.stop {
            if self.frames.is_empty() {
                break;
            }
            if let Err(e) = self.step() {
                eprintln!("RUNTIME_ERROR (line {}): {}", e.line, e.message);
                self.exit_code = 1;
                break;
            }
        }
        // Final collection at teardown so the last cycle's garbage is
        // accounted for even on programs that never emit GBG.
        self.collect_garbage();
        self.exit_code
    }

    pub(crate) fn rt_err(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(message, self.current_line)
    }

    pub(crate) fn request_stop(&mut self, code: i32) {
        self.stop = true;
        self.exit_code = code;
    }

    // ---- operand stack -----------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= MAX_STACK {
            return Err(self.rt_err("operand stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or_else(|| self.rt_err("pop from an empty stack"))
    }

    fn peek(&self) -> Result<&Value, RuntimeError> {
        self.stack.last().ok_or_else(|| self.rt_err("peek on an empty stack"))
    }

    fn pop_int(&mut self) -> Result<i64, RuntimeError> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(self.rt_err(format!("expected int, found {}", type_name(&other)))),
        }
    }

    fn pop_bool(&mut self) -> Result<bool, RuntimeError> {
        match self.pop()? {
            Value::Bool(b) => Ok(b),
            other => Err(self.rt_err(format!("expected bool, found {}", type_name(&other)))),
        }
    }

    fn pop_str_data(&mut self) -> Result<Rc<str>, RuntimeError> {
        match self.pop()? {
            Value::Str(r) => match r.kind() {
                ObjectKind::Str { data, .. } => Ok(Rc::clone(data)),
                _ => unreachable!("Str value must reference a Str object"),
            },
            other => Err(self.rt_err(format!("expected str, found {}", type_name(&other)))),
        }
    }

    // ---- instruction fetch --------------------------------------------

    fn fetch(&mut self, idx: usize) -> Result<FetchedInstr, RuntimeError> {
        let function = Rc::clone(&self.frames[idx].function);
        let chunk = &function.chunk;
        let ip = self.frames[idx].ip;
        if ip >= chunk.len() {
            return Err(self.rt_err("instruction pointer ran past the end of the chunk"));
        }
        let instr_start = ip;
        let byte = chunk.read_u8(ip);
        let op = OpCode::from_u8(byte)
            .ok_or_else(|| RuntimeError::new("unknown opcode", chunk.line_for(instr_start)))?;
        let mut next_ip = ip + 1;
        let (operand_u8, operand_i32) = match op {
            OpCode::BConst | OpCode::Arr | OpCode::Is | OpCode::Call | OpCode::LRead | OpCode::LSet => {
                let b = chunk.read_u8(next_ip);
                next_ip += 1;
                (b, 0)
            }
            OpCode::IConst
            | OpCode::SConst
            | OpCode::GWrite
            | OpCode::GRead
            | OpCode::Load
            | OpCode::Class
            | OpCode::SetProperty
            | OpCode::GetProperty
            | OpCode::From
            | OpCode::Jmp
            | OpCode::Jit
            | OpCode::Jif => {
                let v = chunk.read_i32(next_ip);
                next_ip += 4;
                (0, v)
            }
            _ => (0, 0),
        };
        let line = chunk.line_for(instr_start);
        self.frames[idx].ip = next_ip;
        Ok(FetchedInstr { op, operand_u8, operand_i32, line, instr_start })
    }

    // ---- dispatch ------------------------------------------------------

    fn step(&mut self) -> Result<(), RuntimeError> {
        let idx = self.frames.len() - 1;
        let instr = self.fetch(idx)?;
        self.current_line = instr.line;

        match instr.op {
            OpCode::Nil => self.push(Value::Nil)?,
            OpCode::BConst => self.push(Value::Bool(instr.operand_u8 != 0))?,
            OpCode::IConst => {
                let n = self.constants.int(instr.operand_i32 as usize);
                self.push(Value::Int(n))?;
            }
            OpCode::SConst => {
                let s = self.constants.string(instr.operand_i32 as usize);
                let r = self.heap.alloc_str(s, true);
                self.push(Value::Str(r))?;
            }
            OpCode::Arr => self.op_arr(instr.operand_u8)?,
            OpCode::ArrLen => self.op_arr_len()?,
            OpCode::ArrItm => self.op_arr_itm()?,
            OpCode::ArrSitm => self.op_arr_sitm()?,
            OpCode::LRead => {
                let v = self.frames[idx].locals[instr.operand_u8 as usize].clone();
                self.push(v)?;
            }
            OpCode::LSet => {
                let v = self.peek()?.clone();
                self.frames[idx].locals[instr.operand_u8 as usize] = v;
            }
            OpCode::GWrite => {
                let name = self.constants.string(instr.operand_i32 as usize);
                let v = self.peek()?.clone();
                self.globals.insert(name, v);
            }
            OpCode::GRead => {
                let name = self.constants.string(instr.operand_i32 as usize);
                let v = self
                    .globals
                    .get(name.as_ref())
                    .cloned()
                    .ok_or_else(|| self.rt_err(format!("undefined global '{name}'")))?;
                self.push(v)?;
            }
            OpCode::Load => {
                let v = self.op_load(instr.operand_i32)?;
                self.push(v)?;
            }
            OpCode::Add | OpCode::Sub | OpCode::Mul | OpCode::Div | OpCode::Mod => {
                self.op_arith(instr.op)?
            }
            OpCode::Lt | OpCode::Le | OpCode::Gt | OpCode::Ge | OpCode::Eq | OpCode::Ne => {
                self.op_compare(instr.op)?
            }
            OpCode::Or => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                self.push(Value::Bool(a || b))?;
            }
            OpCode::And => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                self.push(Value::Bool(a && b))?;
            }
            OpCode::Not => {
                let a = self.pop_bool()?;
                self.push(Value::Bool(!a))?;
            }
            OpCode::NNot => {
                let a = self.pop_int()?;
                self.push(Value::Int(a.wrapping_neg()))?;
            }
            OpCode::SLeft => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(Value::Int(a.wrapping_shl(b as u32)))?;
            }
            OpCode::SRight => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(Value::Int(a.wrapping_shr(b as u32)))?;
            }
            OpCode::BOr => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(Value::Int(a | b))?;
            }
            OpCode::BXor => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(Value::Int(a ^ b))?;
            }
            OpCode::BAnd => {
                let b = self.pop_int()?;
                let a = self.pop_int()?;
                self.push(Value::Int(a & b))?;
            }
            OpCode::BNot => {
                let a = self.pop_int()?;
                self.push(Value::Int(!a))?;
            }
            OpCode::Jmp => {
                let target = instr.instr_start as i64 + instr.operand_i32 as i64;
                self.frames[idx].ip = self.jump_target(target)?;
            }
            OpCode::Jit => {
                let cond = self.pop_bool()?;
                if cond {
                    let target = instr.instr_start as i64 + instr.operand_i32 as i64;
                    self.frames[idx].ip = self.jump_target(target)?;
                }
            }
            OpCode::Jif => {
                let cond = self.pop_bool()?;
                if !cond {
                    let target = instr.instr_start as i64 + instr.operand_i32 as i64;
                    self.frames[idx].ip = self.jump_target(target)?;
                }
            }
            OpCode::Concat => self.op_concat()?,
            OpCode::StrLen => {
                let s = self.pop_str_data()?;
                self.push(Value::Int(s.len() as i64))?;
            }
            OpCode::StrItm => self.op_str_itm()?,
            OpCode::Class => {
                let v = self.op_class(instr.operand_i32)?;
                self.push(v)?;
            }
            OpCode::This => {
                let inst = self.frames[idx]
                    .instance
                    .ok_or_else(|| self.rt_err("'this' has no bound instance in this frame"))?;
                self.push(Value::Instance(inst))?;
            }
            OpCode::SetProperty => self.op_set_property(instr.operand_i32)?,
            OpCode::GetProperty => self.op_get_property(instr.operand_i32)?,
            OpCode::Is => {
                let v = self.pop()?;
                let tag = TypeTag::from_u8(instr.operand_u8)
                    .ok_or_else(|| self.rt_err("unknown type tag in IS"))?;
                self.push(Value::Bool(v.type_tag() as u8 == tag as u8))?;
            }
            OpCode::From => self.op_from(instr.operand_i32)?,
            OpCode::Prt => {
                let v = self.pop()?;
                let _ = writeln!(self.stdout, "{}", format_value(&v));
            }
            OpCode::Pop => {
                self.pop()?;
            }
            OpCode::Call => self.op_call(instr.operand_u8)?,
            OpCode::Gbg => self.collect_garbage(),
            OpCode::Ret => self.op_ret()?,
            OpCode::Hlt => self.request_stop(0),
        }
        Ok(())
    }

    fn jump_target(&self, target: i64) -> Result<usize, RuntimeError> {
        let idx = self.frames.len() - 1;
        let len = self.frames[idx].function.chunk.len() as i64;
        if target < 0 || target > len {
            return Err(self.rt_err("jump target out of range"));
        }
        Ok(target as usize)
    }

    // ---- arrays ---------------------------------------------------------

    fn op_arr(&mut self, is_empty: u8) -> Result<(), RuntimeError> {
        let length = self.pop_int()?;
        if length < 0 {
            return Err(self.rt_err("array length cannot be negative"));
        }
        let length = length as usize;
        let items = if is_empty != 0 {
            vec![Value::Nil; length]
        } else {
            let mut items = Vec::with_capacity(length);
            for _ in 0..length {
                items.push(self.pop()?);
            }
            items.reverse();
            items
        };
        let r = self.heap.alloc_array(items);
        self.push(Value::Array(r))
    }

    fn op_arr_len(&mut self) -> Result<(), RuntimeError> {
        let len = match self.pop()? {
            Value::Array(r) => match r.kind() {
                ObjectKind::Array(items) => items.borrow().len(),
                _ => unreachable!("Array value must reference an Array object"),
            },
            other => return Err(self.rt_err(format!("expected arr, found {}", type_name(&other)))),
        };
        self.push(Value::Int(len as i64))
    }

    /// Dispatches dynamically on ARRAY vs STR since every `[ ]` index
    /// expression compiles to `ARR_ITM` regardless of the operand's
    /// static type.
    fn op_arr_itm(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop_int()?;
        let base = self.pop()?;
        match base {
            Value::Array(r) => match r.kind() {
                ObjectKind::Array(items) => {
                    let items = items.borrow();
                    let item = items
                        .get(index as usize)
                        .cloned()
                        .filter(|_| index >= 0)
                        .ok_or_else(|| self.rt_err(format!("array index {index} out of range (len {})", items.len())))?;
                    drop(items);
                    self.push(item)
                }
                _ => unreachable!("Array value must reference an Array object"),
            },
            Value::Str(r) => match r.kind() {
                ObjectKind::Str { data, .. } => {
                    let bytes = data.as_bytes();
                    if index < 0 || index as usize >= bytes.len() {
                        return Err(self.rt_err(format!("string index {index} out of range (len {})", bytes.len())));
                    }
                    let ch = (bytes[index as usize] as char).to_string();
                    let r = self.heap.alloc_str(Rc::from(ch.as_str()), false);
                    self.push(Value::Str(r))
                }
                _ => unreachable!("Str value must reference a Str object"),
            },
            other => Err(self.rt_err(format!("cannot index into {}", type_name(&other)))),
        }
    }

    /// `arr[idx] = value`: pops index then array, leaves `value` on
    /// top as the assignment expression's result, the same discipline
    /// `SET_PROPERTY` follows.
    fn op_arr_sitm(&mut self) -> Result<(), RuntimeError> {
        let index = self.pop_int()?;
        let array = self.pop()?;
        let value = self.peek()?.clone();
        match array {
            Value::Array(r) => match r.kind() {
                ObjectKind::Array(items) => {
                    let mut items = items.borrow_mut();
                    if index < 0 || index as usize >= items.len() {
                        return Err(self.rt_err(format!("array index {index} out of range (len {})", items.len())));
                    }
                    items[index as usize] = value;
                    Ok(())
                }
                _ => unreachable!("Array value must reference an Array object"),
            },
            other => Err(self.rt_err(format!("cannot index-assign into {}", type_name(&other)))),
        }
    }

    // ---- strings ---------------------------------------------------------

    /// Pops the string (top), then the index: the interpreter's fixed
    /// pop order. `str_char`'s synthesized body arranges its stack so
    /// the string lands on top.
    fn op_str_itm(&mut self) -> Result<(), RuntimeError> {
        let s = self.pop_str_data()?;
        let index = self.pop_int()?;
        let bytes = s.as_bytes();
        if index < 0 || index as usize >= bytes.len() {
            return Err(self.rt_err(format!("string index {index} out of range (len {})", bytes.len())));
        }
        let ch = (bytes[index as usize] as char).to_string();
        let r = self.heap.alloc_str(Rc::from(ch.as_str()), false);
        self.push(Value::Str(r))
    }

    fn op_concat(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop_str_data()?;
        let a = self.pop_str_data()?;
        let joined = format!("{a}{b}");
        let r = self.heap.alloc_str(Rc::from(joined.as_str()), false);
        self.push(Value::Str(r))
    }

    // ---- arithmetic / comparison -----------------------------------------

    fn op_arith(&mut self, op: OpCode) -> Result<(), RuntimeError> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let result = match op {
            OpCode::Add => a.wrapping_add(b),
            OpCode::Sub => a.wrapping_sub(b),
            OpCode::Mul => a.wrapping_mul(b),
            OpCode::Div => {
                if b == 0 {
                    return Err(self.rt_err("division by zero"));
                }
                a.wrapping_div(b)
            }
            OpCode::Mod => {
                if b == 0 {
                    return Err(self.rt_err("modulus by zero"));
                }
                a.wrapping_rem(b)
            }
            _ => unreachable!("op_arith called with a non-arithmetic opcode"),
        };
        self.push(Value::Int(result))
    }

    fn op_compare(&mut self, op: OpCode) -> Result<(), RuntimeError> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        let result = match op {
            OpCode::Lt => a < b,
            OpCode::Le => a <= b,
            OpCode::Gt => a > b,
            OpCode::Ge => a >= b,
            OpCode::Eq => a == b,
            OpCode::Ne => a != b,
            _ => unreachable!("op_compare called with a non-comparison opcode"),
        };
        self.push(Value::Bool(result))
    }

    // ---- entities / classes ------------------------------------------------

    fn op_load(&mut self, idx: i32) -> Result<Value, RuntimeError> {
        let entity = self
            .entities
            .get(idx as usize)
            .ok_or_else(|| self.rt_err(format!("entity index {idx} out of range")))?;
        Ok(match entity {
            Entity::Function(proto) => Value::Fn(Rc::clone(proto)),
            Entity::Native(proto) => Value::NativeFn(Rc::clone(proto)),
            Entity::Class(proto) => Value::Class(Rc::clone(proto)),
        })
    }

    fn op_class(&mut self, idx: i32) -> Result<Value, RuntimeError> {
        let entity = self
            .entities
            .get(idx as usize)
            .ok_or_else(|| self.rt_err(format!("entity index {idx} out of range")))?;
        match entity {
            Entity::Class(proto) => Ok(Value::Instance(self.heap.alloc_instance(Rc::clone(proto)))),
            other => Err(self.rt_err(format!("entity {idx} is a {}, not a class", other.kind_name()))),
        }
    }

    fn op_get_property(&mut self, idx: i32) -> Result<(), RuntimeError> {
        let name = self.constants.string(idx as usize);
        let instance_ref = match self.pop()? {
            Value::Instance(r) => r,
            other => return Err(self.rt_err(format!("cannot access a property of {}", type_name(&other)))),
        };
        let (class, attr) = match instance_ref.kind() {
            ObjectKind::Instance { class, attrs } => {
                (Rc::clone(class), attrs.borrow().get(name.as_ref()).cloned())
            }
            _ => unreachable!("Instance value must reference an Instance object"),
        };
        if let Some(value) = attr {
            return self.push(value);
        }
        if let Some(method) = class.methods.get(name.as_ref()) {
            let method_ref = self.heap.alloc_method(instance_ref, Rc::clone(method));
            return self.push(Value::Method(method_ref));
        }
        Err(self.rt_err(format!("'{}' has no attribute or method named '{name}'", class.name)))
    }

    fn op_set_property(&mut self, idx: i32) -> Result<(), RuntimeError> {
        let name = self.constants.string(idx as usize);
        let instance_ref = match self.pop()? {
            Value::Instance(r) => r,
            other => return Err(self.rt_err(format!("cannot set a property on {}", type_name(&other)))),
        };
        let value = self.peek()?.clone();
        match instance_ref.kind() {
            ObjectKind::Instance { attrs, .. } => {
                attrs.borrow_mut().insert(name, value);
                Ok(())
            }
            _ => unreachable!("Instance value must reference an Instance object"),
        }
    }

    fn op_from(&mut self, idx: i32) -> Result<(), RuntimeError> {
        let name = self.constants.string(idx as usize);
        let v = self.pop()?;
        let matches = match v {
            Value::Instance(r) => match r.kind() {
                ObjectKind::Instance { class, .. } => class.name.as_ref() == name.as_ref(),
                _ => unreachable!("Instance value must reference an Instance object"),
            },
            _ => false,
        };
        self.push(Value::Bool(matches))
    }

    // ---- calls -------------------------------------------------------------

    fn op_call(&mut self, argc: u8) -> Result<(), RuntimeError> {
        let argc = argc as usize;
        if argc >= MAX_LOCALS {
            return Err(self.rt_err("too many call arguments"));
        }
        let mut args = vec![Value::Nil; argc];
        for slot in args.iter_mut() {
            *slot = self.pop()?;
        }
        let callee = self.pop()?;
        match callee {
            Value::Fn(proto) => self.enter_call(proto, None, false, args),
            Value::NativeFn(proto) => {
                if proto.arity as usize != argc {
                    return Err(self.rt_err(format!(
                        "'{}' expects {} argument(s), got {argc}",
                        proto.name, proto.arity
                    )));
                }
                let result = self.call_native(proto.index, args)?;
                self.push(result)
            }
            Value::Method(r) => match r.kind() {
                ObjectKind::Method { instance, func } => {
                    self.enter_call(Rc::clone(func), Some(*instance), false, args)
                }
                _ => unreachable!("Method value must reference a Method object"),
            },
            Value::Class(class_proto) => {
                let instance_ref = self.heap.alloc_instance(Rc::clone(&class_proto));
                match &class_proto.ctor {
                    Some(ctor) => self.enter_call(Rc::clone(ctor), Some(instance_ref), true, args),
                    None => self.push(Value::Instance(instance_ref)),
                }
            }
            other => Err(self.rt_err(format!("value of type {} is not callable", type_name(&other)))),
        }
    }

    fn enter_call(
        &mut self,
        proto: Rc<FunctionProto>,
        instance: Option<ObjectRef>,
        is_constructor: bool,
        args: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        if args.len() != proto.params.len() {
            return Err(self.rt_err(format!(
                "'{}' expects {} argument(s), got {}",
                proto.name,
                proto.params.len(),
                args.len()
            )));
        }
        if self.frames.len() >= MAX_FRAMES {
            return Err(self.rt_err("frame stack overflow"));
        }
        let mut frame = Frame::new(proto, instance, is_constructor);
        for (slot, value) in args.into_iter().enumerate() {
            frame.locals[slot] = value;
        }
        self.frames.push(frame);
        Ok(())
    }

    fn op_ret(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop()?;
        self.frames.pop();
        if self.frames.is_empty() {
            self.stop = true;
        } else {
            self.push(value)?;
        }
        Ok(())
    }

    // ---- gc ------------------------------------------------------------

    fn collect_garbage(&mut self) {
        for frame in &self.frames {
            if let Some(instance) = frame.instance {
                self.heap.mark_value(&Value::Instance(instance));
            }
            for local in &frame.locals {
                self.heap.mark_value(local);
            }
        }
        for value in &self.stack {
            self.heap.mark_value(value);
        }
        for value in self.globals.values() {
            self.heap.mark_value(value);
        }
        let freed = self.heap.sweep();
        tracing::debug!(freed, remaining = self.heap.len(), "gc cycle");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glint_core::{Constants, Entities};

    fn test_vm(script: Chunk) -> Vm {
        Vm::new(Entities::new(), Constants::new(), script)
    }

    #[test]
    fn popping_an_empty_stack_is_a_runtime_error() {
        let mut chunk = Chunk::new();
        chunk.push_op(OpCode::Pop);
        let mut vm = test_vm(chunk);
        let err = vm.step().unwrap_err();
        assert!(err.message.contains("empty stack"));
    }

    #[test]
    fn integer_overflow_wraps_instead_of_trapping() {
        let mut constants = Constants::new();
        let a = constants.push_int(i64::MAX);
        let b = constants.push_int(1);
        let mut chunk = Chunk::new();
        chunk.push_op(OpCode::IConst);
        chunk.push_i32(a as i32);
        chunk.push_op(OpCode::IConst);
        chunk.push_i32(b as i32);
        chunk.push_op(OpCode::Add);
        let mut vm = Vm::new(Entities::new(), constants, chunk);
        vm.step().unwrap();
        vm.step().unwrap();
        vm.step().unwrap();
        assert!(matches!(vm.pop().unwrap(), Value::Int(n) if n == i64::MIN));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let mut constants = Constants::new();
        let a = constants.push_int(10);
        let b = constants.push_int(0);
        let mut chunk = Chunk::new();
        chunk.push_op(OpCode::IConst);
        chunk.push_i32(a as i32);
        chunk.push_op(OpCode::IConst);
        chunk.push_i32(b as i32);
        chunk.push_op(OpCode::Div);
        let mut vm = Vm::new(Entities::new(), constants, chunk);
        vm.step().unwrap();
        vm.step().unwrap();
        let err = vm.step().unwrap_err();
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn jump_target_out_of_range_is_a_runtime_error() {
        let mut chunk = Chunk::new();
        chunk.push_op(OpCode::Jmp);
        chunk.push_i32(1_000_000);
        let mut vm = test_vm(chunk);
        let err = vm.step().unwrap_err();
        assert!(err.message.contains("out of range"));
    }

    #[test]
    fn hlt_stops_the_machine_with_exit_code_zero() {
        let mut chunk = Chunk::new();
        chunk.push_op(OpCode::Hlt);
        let vm = test_vm(chunk);
        assert_eq!(vm.run(), 0);
    }

    #[test]
    fn gc_sweeps_unreachable_strings_but_keeps_globals_alive() {
        let mut chunk = Chunk::new();
        chunk.push_op(OpCode::Hlt);
        let mut vm = test_vm(chunk);
        let kept = vm.heap.alloc_str(Rc::from("kept"), false);
        vm.globals.insert(Rc::from("g"), Value::Str(kept));
        let _dropped = vm.heap.alloc_str(Rc::from("dropped"), false);
        assert_eq!(vm.heap.len(), 2);
        vm.collect_garbage();
        assert_eq!(vm.heap.len(), 1);
    }
}
