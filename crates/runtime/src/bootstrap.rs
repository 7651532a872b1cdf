//! Assembles the runtime's complete entity table: the fixed native
//! registry, in [`glint_core::NATIVES`] order, followed by the
//! compiler's user-defined functions and classes.
//!
//! The last four natives (`arr_len`, `str_len`, `str_char`, `concat`)
//! are not host callables; they're synthesized here as ordinary
//! [`FunctionProto`]s whose single-instruction bodies wrap the matching
//! primitive opcode. `str_char`'s body pushes the index before the
//! string so that it lands on top of the stack, matching
//! [`OpCode::StrItm`]'s fixed pop order (string, then index).

use std::rc::Rc;

use glint_core::{Chunk, Entities, Entity, FunctionProto, NativeProto, OpCode, natives};

fn bytecode_native(name: &'static str, params: &[&str], build: impl FnOnce(&mut Chunk)) -> Entity {
    let mut chunk = Chunk::new();
    build(&mut chunk);
    chunk.push_op(OpCode::Ret);
    Entity::Function(Rc::new(FunctionProto {
        name: Rc::from(name),
        params: params.iter().map(|p| Rc::from(*p)).collect(),
        chunk,
    }))
}

/// Build the full, VM-ready entity table: natives first (their `LOAD`
/// index is their position in [`glint_core::NATIVES`]), then every
/// user-defined function/class appended in the order the compiler
/// declared them.
pub fn build_entities(user_entities: Entities) -> Entities {
    let mut entities = Entities::new();

    for (index, sig) in natives::NATIVES.iter().enumerate() {
        let entity = if sig.is_bytecode {
            match sig.name {
                "arr_len" => bytecode_native("arr_len", &["a"], |c| {
                    c.push_op(OpCode::LRead);
                    c.push_u8(0);
                    c.push_op(OpCode::ArrLen);
                }),
                "str_len" => bytecode_native("str_len", &["s"], |c| {
                    c.push_op(OpCode::LRead);
                    c.push_u8(0);
                    c.push_op(OpCode::StrLen);
                }),
                "str_char" => bytecode_native("str_char", &["s", "i"], |c| {
                    // Push index, then string, so the string lands on
                    // top: STR_ITM pops string then index.
                    c.push_op(OpCode::LRead);
                    c.push_u8(1);
                    c.push_op(OpCode::LRead);
                    c.push_u8(0);
                    c.push_op(OpCode::StrItm);
                }),
                "concat" => bytecode_native("concat", &["a", "b"], |c| {
                    c.push_op(OpCode::LRead);
                    c.push_u8(0);
                    c.push_op(OpCode::LRead);
                    c.push_u8(1);
                    c.push_op(OpCode::Concat);
                }),
                other => unreachable!("unexpected bytecode native '{other}'"),
            }
        } else {
            Entity::Native(Rc::new(NativeProto {
                name: sig.name,
                arity: sig.arity,
                index,
            }))
        };
        entities.push(entity);
    }

    for index in 0..user_entities.len() {
        let entity = user_entities
            .get(index)
            .expect("index within user_entities.len() is always present")
            .clone();
        entities.push(entity);
    }

    entities
}
