//! The fixed, numbered table of built-in callables.
//!
//! Order matters: this *is* the `LOAD` index space natives occupy,
//! before any user-defined function or class is appended. The compiler
//! consults this table by name during identifier resolution; the
//! runtime consults it to populate the entity table in the same order
//! (`glint-runtime`'s bootstrap module), either with a host-implemented
//! native or, for the last four, a synthesized bytecode body built from
//! a single primitive opcode.

/// One row of the native registry.
#[derive(Debug, Clone, Copy)]
pub struct NativeSignature {
    pub name: &'static str,
    pub arity: u8,
    /// `true` for the four natives that are implemented as ordinary
    /// bytecode functions wrapping a primitive opcode, rather than as a
    /// host-implemented native callable.
    pub is_bytecode: bool,
}

macro_rules! native {
    ($name:literal, $arity:literal) => {
        NativeSignature {
            name: $name,
            arity: $arity,
            is_bytecode: false,
        }
    };
    ($name:literal, $arity:literal, bytecode) => {
        NativeSignature {
            name: $name,
            arity: $arity,
            is_bytecode: true,
        }
    };
}

/// Registry order defines the `LOAD` index of every native. Do not
/// reorder without retiring every compiled program that references
/// these indices.
pub const NATIVES: &[NativeSignature] = &[
    native!("char_code", 2),
    native!("code_char", 1),
    native!("sub_str", 3),
    native!("str_lower", 1),
    native!("str_upper", 1),
    native!("str_title", 1),
    native!("cmp_str", 2),
    native!("cmp_ic_str", 2),
    native!("is_str_int", 1),
    native!("ascii_to_int", 1),
    native!("int_to_ascii", 1),
    native!("time", 0),
    native!("sleep", 1),
    native!("read_ln", 0),
    native!("read_file_bytes", 5),
    native!("panic", 1),
    native!("exit", 1),
    native!("arr_len", 1, bytecode),
    native!("str_len", 1, bytecode),
    native!("str_char", 2, bytecode),
    native!("concat", 2, bytecode),
];

/// Look up a native's registry index by name, for the compiler's
/// identifier resolution pass.
pub fn index_of(name: &str) -> Option<usize> {
    NATIVES.iter().position(|n| n.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_table_order() {
        assert_eq!(index_of("char_code"), Some(0));
        assert_eq!(index_of("concat"), Some(NATIVES.len() - 1));
        assert_eq!(index_of("nonexistent"), None);
    }

    #[test]
    fn bytecode_natives_are_the_trailing_four() {
        let bytecode_count = NATIVES.iter().filter(|n| n.is_bytecode).count();
        assert_eq!(bytecode_count, 4);
        assert!(NATIVES[NATIVES.len() - 4..].iter().all(|n| n.is_bytecode));
    }
}
