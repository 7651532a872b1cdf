//! `--dump-bytecode`'s disassembler: a flat, one-instruction-per-line
//! listing of every compiled entity plus the top-level script chunk,
//! written to stderr before execution begins.

use std::io::Write;

use glint_core::{Chunk, Entities, Entity, FunctionProto, OpCode};

pub fn dump(entities: &Entities, script: &FunctionProto, out: &mut impl Write) {
    let _ = writeln!(out, "=== script ===");
    dump_chunk(&script.chunk, out);

    for index in 0..entities.len() {
        let Some(entity) = entities.get(index) else { continue };
        match entity {
            Entity::Function(proto) => {
                let _ = writeln!(out, "=== fn {index} '{}' ({} params) ===", proto.name, proto.params.len());
                dump_chunk(&proto.chunk, out);
            }
            Entity::Class(proto) => {
                if let Some(ctor) = &proto.ctor {
                    let _ = writeln!(out, "=== class {index} '{}' init ===", proto.name);
                    dump_chunk(&ctor.chunk, out);
                }
                for (name, method) in &proto.methods {
                    let _ = writeln!(out, "=== class {index} '{}' method '{name}' ===", proto.name);
                    dump_chunk(&method.chunk, out);
                }
            }
            Entity::Native(_) => {}
        }
    }
}

fn dump_chunk(chunk: &Chunk, out: &mut impl Write) {
    let mut offset = 0;
    while offset < chunk.len() {
        let instr_start = offset;
        let byte = chunk.read_u8(offset);
        let Some(op) = OpCode::from_u8(byte) else {
            let _ = writeln!(out, "{instr_start:06} ?? (unknown opcode byte {byte})");
            break;
        };
        offset += 1;
        let line = chunk.line_for(instr_start);
        let operand_text = match op {
            OpCode::BConst | OpCode::Arr | OpCode::Is | OpCode::Call | OpCode::LRead | OpCode::LSet => {
                let v = chunk.read_u8(offset);
                offset += 1;
                format!(" {v}")
            }
            OpCode::Jmp | OpCode::Jit | OpCode::Jif => {
                let delta = chunk.read_i32(offset);
                offset += 4;
                let target = instr_start as i64 + delta as i64;
                format!(" {delta:+} -> {target}")
            }
            OpCode::IConst
            | OpCode::SConst
            | OpCode::GWrite
            | OpCode::GRead
            | OpCode::Load
            | OpCode::Class
            | OpCode::SetProperty
            | OpCode::GetProperty
            | OpCode::From => {
                let v = chunk.read_i32(offset);
                offset += 4;
                format!(" {v}")
            }
            _ => String::new(),
        };
        let _ = writeln!(out, "{instr_start:06} line {line:<4} {op}{operand_text}");
    }
}
