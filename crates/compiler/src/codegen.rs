//! Single-pass bytecode generator.
//!
//! Walks the AST once, emitting bytecode directly into per-function
//! `Chunk`s while resolving identifiers against a scope stack. There is
//! no separate resolution pass: a name is classified (native, entity,
//! class-bound, global, local) at the point it's used, against whatever
//! has been declared so far.

use std::collections::HashMap;
use std::rc::Rc;

use glint_core::natives;
use glint_core::{Chunk, ClassProto, Constants, Entities, Entity, FunctionProto, OpCode};
use glint_runtime::MAX_LOCALS;

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
use crate::error::CompileError;
use crate::scope::{LoopPatches, Scope, ScopeKind, Symbol};

type CResult<T> = Result<T, CompileError>;

/// What `compile_source` hands back to the driver: the user-defined
/// entity table (functions and classes, indexed from 0; the runtime
/// prepends the native table in front of these, see
/// `glint-runtime`'s bootstrap module), the constant pools, and the
/// top-level statements compiled as the program's entry chunk.
pub struct CompiledProgram {
    pub entities: Entities,
    pub constants: Constants,
    pub script: Chunk,
}

pub fn compile_program(program: &Program) -> CResult<CompiledProgram> {
    let mut c = Compiler::new();
    let mut script = Chunk::new();
    for stmt in &program.statements {
        c.stmt(&mut script, stmt)?;
    }
    script.push_op(OpCode::Hlt);
    let mut entities = Entities::new();
    for entity in c.user_entities {
        entities.push(entity);
    }
    Ok(CompiledProgram {
        entities,
        constants: c.constants,
        script,
    })
}

struct Compiler {
    constants: Constants,
    /// Compiled functions/classes, indexed from 0. The runtime's final
    /// entity table puts every native ahead of these, so any `LOAD`
    /// targeting one of these entities has to add that offset in; see
    /// `entity_load_index`.
    user_entities: Vec<Entity>,
    scopes: Vec<Scope>,
    loop_stack: Vec<LoopPatches>,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            constants: Constants::new(),
            user_entities: Vec::new(),
            scopes: vec![Scope::new(ScopeKind::Global)],
            loop_stack: Vec::new(),
        }
    }

    fn err(&self, line: u32, message: impl Into<String>) -> CompileError {
        CompileError::new(message, line)
    }

    fn str_const(&mut self, s: &str) -> i32 {
        self.constants.push_string(s) as i32
    }

    fn depth(&self) -> usize {
        self.scopes.len() - 1
    }

    fn push_scope(&mut self, kind: ScopeKind) {
        let next_local = match kind {
            ScopeKind::Fn | ScopeKind::Constructor | ScopeKind::Class => 0,
            _ => self.scopes[self.depth()].next_local,
        };
        let mut scope = Scope::new(kind);
        scope.next_local = next_local;
        self.scopes.push(scope);
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Compile `stmts` inside a freshly pushed scope of `kind`.
    fn block_in(&mut self, chunk: &mut Chunk, kind: ScopeKind, stmts: &[Stmt]) -> CResult<()> {
        self.push_scope(kind);
        for stmt in stmts {
            self.stmt(chunk, stmt)?;
        }
        self.pop_scope();
        Ok(())
    }

    /// Reserve the next contiguous entity index and push a placeholder
    /// so later declarations (which see `user_entities.len()` as the
    /// next free index) don't collide with this one before its real
    /// body has been compiled.
    fn reserve_entity(&mut self) -> usize {
        let index = self.user_entities.len();
        self.user_entities.push(Entity::Function(Rc::new(FunctionProto {
            name: Rc::from(""),
            params: Vec::new(),
            chunk: Chunk::new(),
        })));
        index
    }

    fn finish_entity(&mut self, index: usize, entity: Entity) {
        self.user_entities[index] = entity;
    }

    /// Translate a `user_entities` index (what `reserve_entity`/
    /// `finish_entity` work in) into the `LOAD` operand the runtime
    /// expects: the runtime's entity table puts every native ahead of
    /// the user entities, so `LOAD` has to carry that offset baked in.
    fn entity_load_index(&self, user_index: u32) -> i32 {
        natives::NATIVES.len() as i32 + user_index as i32
    }

    fn declare(&mut self, name: &Rc<str>, line: u32, is_entity: bool) -> CResult<Symbol> {
        let depth = self.depth();
        if self.scopes[depth].locals.contains_key(name) {
            return Err(self.err(line, format!("'{name}' is already declared in this scope")));
        }
        let symbol = if is_entity {
            let slot = self.reserve_entity();
            Symbol {
                is_global: false,
                is_entity: true,
                class_bound: false,
                slot: slot as u32,
            }
        } else {
            let is_global = depth == 0;
            let slot = self.scopes[depth].next_local;
            if slot as usize >= MAX_LOCALS {
                return Err(self.err(line, format!("'{name}' exceeds the {MAX_LOCALS}-slot local limit")));
            }
            self.scopes[depth].next_local += 1;
            Symbol {
                is_global,
                is_entity: false,
                class_bound: false,
                slot: slot as u32,
            }
        };
        self.scopes[depth].locals.insert(Rc::clone(name), symbol);
        Ok(symbol)
    }

    fn declare_class_bound(&mut self, name: &Rc<str>, depth: usize, line: u32) -> CResult<()> {
        if self.scopes[depth].locals.contains_key(name) {
            return Err(self.err(line, format!("'{name}' is already declared in this scope")));
        }
        self.scopes[depth].locals.insert(
            Rc::clone(name),
            Symbol {
                is_global: false,
                is_entity: false,
                class_bound: true,
                slot: 0,
            },
        );
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<Symbol> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.locals.get(name) {
                return Some(*sym);
            }
        }
        None
    }

    /// Nearest enclosing `while`, stopping at a function/constructor/
    /// class boundary.
    fn inside_loop(&self) -> bool {
        for scope in self.scopes.iter().rev() {
            match scope.kind {
                ScopeKind::While => return true,
                ScopeKind::Fn | ScopeKind::Constructor | ScopeKind::Class => return false,
                _ => {}
            }
        }
        false
    }

    /// Nearest enclosing `Fn`/`Constructor` scope, searched without a
    /// class boundary (methods and constructors are themselves `Fn`/
    /// `Constructor` scopes nested directly under `Class`).
    fn nearest_fn_scope(&self) -> Option<ScopeKind> {
        for scope in self.scopes.iter().rev() {
            if matches!(scope.kind, ScopeKind::Fn | ScopeKind::Constructor) {
                return Some(scope.kind);
            }
        }
        None
    }

    /// Depth of the nearest enclosing `Class` scope, searched all the
    /// way to the bottom of the stack (a method/constructor body is
    /// always nested under its class, regardless of how many blocks
    /// sit in between).
    fn nearest_class_scope(&self) -> Option<usize> {
        for (depth, scope) in self.scopes.iter().enumerate().rev() {
            if scope.kind == ScopeKind::Class {
                return Some(depth);
            }
        }
        None
    }

    // ---- expressions ----------------------------------------------

    fn expr(&mut self, chunk: &mut Chunk, expr: &Expr) -> CResult<()> {
        chunk.mark_line(expr.line);
        match &expr.kind {
            ExprKind::Nil => {
                chunk.push_op(OpCode::Nil);
            }
            ExprKind::Bool(b) => {
                chunk.push_op(OpCode::BConst);
                chunk.push_u8(*b as u8);
            }
            ExprKind::Int(i) => {
                chunk.push_op(OpCode::IConst);
                let idx = self.constants.push_int(*i);
                chunk.push_i32(idx as i32);
            }
            ExprKind::Str(s) => {
                chunk.push_op(OpCode::SConst);
                let idx = self.str_const(s);
                chunk.push_i32(idx);
            }
            ExprKind::Identifier(name) => {
                self.identifier(chunk, name, expr.line)?;
            }
            ExprKind::This(member) => {
                if self.nearest_class_scope().is_none() {
                    return Err(self.err(expr.line, "'this' can only be used inside a class"));
                }
                chunk.push_op(OpCode::This);
                if let Some(name) = member {
                    chunk.push_op(OpCode::GetProperty);
                    let idx = self.str_const(name);
                    chunk.push_i32(idx);
                }
            }
            ExprKind::Group(inner) => self.expr(chunk, inner)?,
            ExprKind::Array { items, length } => {
                for item in items {
                    self.expr(chunk, item)?;
                }
                match length {
                    Some(len) => self.expr(chunk, len)?,
                    None => {
                        chunk.push_op(OpCode::IConst);
                        let idx = self.constants.push_int(items.len() as i64);
                        chunk.push_i32(idx as i32);
                    }
                }
                chunk.push_op(OpCode::Arr);
                chunk.push_u8(items.is_empty() as u8);
            }
            ExprKind::Assign { target, value } => self.assign(chunk, target, value)?,
            ExprKind::IsTest { value, tag } => {
                self.expr(chunk, value)?;
                chunk.push_op(OpCode::Is);
                chunk.push_u8(*tag as u8);
            }
            ExprKind::FromTest { value, class_name } => {
                self.expr(chunk, value)?;
                chunk.push_op(OpCode::From);
                let idx = self.str_const(class_name);
                chunk.push_i32(idx);
            }
            ExprKind::Logical { op, left, right } => {
                // Both operands are always evaluated; there is no
                // short-circuit.
                self.expr(chunk, left)?;
                self.expr(chunk, right)?;
                chunk.push_op(match op {
                    LogicalOp::Or => OpCode::Or,
                    LogicalOp::And => OpCode::And,
                });
            }
            ExprKind::Binary { op, left, right } => {
                self.expr(chunk, left)?;
                self.expr(chunk, right)?;
                chunk.push_op(binary_opcode(*op));
            }
            ExprKind::Unary { op, operand } => {
                self.expr(chunk, operand)?;
                chunk.push_op(match op {
                    UnaryOp::Neg => OpCode::NNot,
                    UnaryOp::Not => OpCode::Not,
                });
            }
            ExprKind::Index { array, index } => {
                self.expr(chunk, array)?;
                self.expr(chunk, index)?;
                chunk.push_op(OpCode::ArrItm);
            }
            ExprKind::Member { object, name } => {
                self.expr(chunk, object)?;
                chunk.push_op(OpCode::GetProperty);
                let idx = self.str_const(name);
                chunk.push_i32(idx);
            }
            ExprKind::Call { callee, args } => {
                self.expr(chunk, callee)?;
                for arg in args.iter().rev() {
                    self.expr(chunk, arg)?;
                }
                chunk.push_op(OpCode::Call);
                chunk.push_u8(args.len() as u8);
            }
        }
        Ok(())
    }

    fn identifier(&mut self, chunk: &mut Chunk, name: &Rc<str>, line: u32) -> CResult<()> {
        if let Some(idx) = natives::index_of(name) {
            chunk.push_op(OpCode::Load);
            chunk.push_i32(idx as i32);
            return Ok(());
        }
        let sym = self
            .resolve(name)
            .ok_or_else(|| self.err(line, format!("undefined symbol '{name}'")))?;
        if sym.is_entity {
            chunk.push_op(OpCode::Load);
            chunk.push_i32(self.entity_load_index(sym.slot));
        } else if sym.class_bound {
            chunk.push_op(OpCode::This);
            chunk.push_op(OpCode::GetProperty);
            let idx = self.str_const(name);
            chunk.push_i32(idx);
        } else if sym.is_global {
            chunk.push_op(OpCode::GRead);
            let idx = self.str_const(name);
            chunk.push_i32(idx);
        } else {
            chunk.push_op(OpCode::LRead);
            chunk.push_u8(sym.slot as u8);
        }
        Ok(())
    }

    /// The four assignment target shapes: a general `.` member, an
    /// implicit `this.name`, an array index, and a plain identifier.
    fn assign(&mut self, chunk: &mut Chunk, target: &Expr, value: &Expr) -> CResult<()> {
        match &target.kind {
            ExprKind::Member { name, .. } => {
                self.expr(chunk, value)?;
                chunk.push_op(OpCode::This);
                chunk.push_op(OpCode::SetProperty);
                let idx = self.str_const(name);
                chunk.push_i32(idx);
                Ok(())
            }
            ExprKind::This(Some(name)) => {
                let depth = self
                    .nearest_class_scope()
                    .ok_or_else(|| self.err(target.line, "'this' can only be used inside a class"))?;
                if !self.scopes[depth].locals.contains_key(name) {
                    self.declare_class_bound(name, depth, target.line)?;
                }
                self.expr(chunk, value)?;
                chunk.push_op(OpCode::This);
                chunk.push_op(OpCode::SetProperty);
                let idx = self.str_const(name);
                chunk.push_i32(idx);
                Ok(())
            }
            ExprKind::Index { array, index } => {
                self.expr(chunk, value)?;
                self.expr(chunk, array)?;
                self.expr(chunk, index)?;
                chunk.push_op(OpCode::ArrSitm);
                Ok(())
            }
            ExprKind::Identifier(name) => {
                self.expr(chunk, value)?;
                let sym = self
                    .resolve(name)
                    .ok_or_else(|| self.err(target.line, format!("undefined symbol '{name}'")))?;
                if sym.class_bound {
                    chunk.push_op(OpCode::This);
                    chunk.push_op(OpCode::SetProperty);
                    let idx = self.str_const(name);
                    chunk.push_i32(idx);
                } else if sym.is_global {
                    chunk.push_op(OpCode::GWrite);
                    let idx = self.str_const(name);
                    chunk.push_i32(idx);
                } else {
                    chunk.push_op(OpCode::LSet);
                    chunk.push_u8(sym.slot as u8);
                }
                Ok(())
            }
            _ => Err(self.err(target.line, "illegal assignment target")),
        }
    }

    // ---- statements -------------------------------------------------

    fn stmt(&mut self, chunk: &mut Chunk, stmt: &Stmt) -> CResult<()> {
        chunk.mark_line(stmt.line);
        match &stmt.kind {
            StmtKind::VarDecl { name, init } => {
                let symbol = self.declare(name, stmt.line, false)?;
                match init {
                    Some(e) => self.expr(chunk, e)?,
                    None => {
                        chunk.push_op(OpCode::Nil);
                    }
                }
                if symbol.is_global {
                    chunk.push_op(OpCode::GWrite);
                    let idx = self.str_const(name);
                    chunk.push_i32(idx);
                } else {
                    chunk.push_op(OpCode::LSet);
                    chunk.push_u8(symbol.slot as u8);
                }
                chunk.push_op(OpCode::Pop);
                Ok(())
            }
            StmtKind::Block(stmts) => self.block_in(chunk, ScopeKind::Block, stmts),
            StmtKind::If { branches, else_branch } => self.if_stmt(chunk, branches, else_branch),
            StmtKind::While { cond, body } => self.while_stmt(chunk, cond, body),
            StmtKind::Break => {
                if !self.inside_loop() {
                    return Err(self.err(stmt.line, "'break' can only be used inside a 'while' loop"));
                }
                let patch = chunk.emit_jump(OpCode::Jmp);
                self.loop_stack.last_mut().expect("inside_loop implies an active loop").break_patches.push(patch);
                Ok(())
            }
            StmtKind::Continue => {
                if !self.inside_loop() {
                    return Err(self.err(stmt.line, "'continue' can only be used inside a 'while' loop"));
                }
                let patch = chunk.emit_jump(OpCode::Jmp);
                self.loop_stack
                    .last_mut()
                    .expect("inside_loop implies an active loop")
                    .continue_patches
                    .push(patch);
                Ok(())
            }
            StmtKind::FnDecl { name, params, body } => self.fn_decl(stmt.line, name, params, body),
            StmtKind::ClassDecl { name, ctor, methods } => self.class_decl(stmt.line, name, ctor, methods),
            StmtKind::Print(e) => {
                self.expr(chunk, e)?;
                chunk.push_op(OpCode::Prt);
                Ok(())
            }
            StmtKind::Return(value) => {
                match self.nearest_fn_scope() {
                    Some(ScopeKind::Constructor) => {
                        return Err(self.err(stmt.line, "'return' cannot be used inside a constructor"));
                    }
                    Some(_) => {}
                    None => return Err(self.err(stmt.line, "'return' can only be used inside a function")),
                }
                match value {
                    Some(e) => self.expr(chunk, e)?,
                    None => {
                        chunk.push_op(OpCode::Nil);
                    }
                }
                chunk.push_op(OpCode::Ret);
                Ok(())
            }
            StmtKind::ExprStmt(e) => {
                self.expr(chunk, e)?;
                chunk.push_op(OpCode::Pop);
                Ok(())
            }
        }
    }

    fn if_stmt(
        &mut self,
        chunk: &mut Chunk,
        branches: &[(Expr, Vec<Stmt>)],
        else_branch: &Option<Vec<Stmt>>,
    ) -> CResult<()> {
        let mut end_jumps = Vec::with_capacity(branches.len());
        for (i, (cond, body)) in branches.iter().enumerate() {
            self.expr(chunk, cond)?;
            let jif = chunk.emit_jump(OpCode::Jif);
            let kind = if i == 0 { ScopeKind::If } else { ScopeKind::Elif };
            self.block_in(chunk, kind, body)?;
            end_jumps.push(chunk.emit_jump(OpCode::Jmp));
            let after_body = chunk.len();
            chunk.patch_jump(jif, after_body);
        }
        if let Some(else_body) = else_branch {
            self.block_in(chunk, ScopeKind::Else, else_body)?;
        }
        let end = chunk.len();
        for jmp in end_jumps {
            chunk.patch_jump(jmp, end);
        }
        Ok(())
    }

    fn while_stmt(&mut self, chunk: &mut Chunk, cond: &Expr, body: &[Stmt]) -> CResult<()> {
        let jmp_to_cond = chunk.emit_jump(OpCode::Jmp);
        let body_start = chunk.len();
        self.loop_stack.push(LoopPatches::default());
        self.block_in(chunk, ScopeKind::While, body)?;
        let cond_start = chunk.len();
        chunk.patch_jump(jmp_to_cond, cond_start);
        self.expr(chunk, cond)?;
        chunk.emit_jump_back(OpCode::Jit, body_start);
        let after_while = chunk.len();
        let patches = self.loop_stack.pop().expect("pushed above");
        for p in patches.continue_patches {
            chunk.patch_jump(p, cond_start);
        }
        for p in patches.break_patches {
            chunk.patch_jump(p, after_while);
        }
        Ok(())
    }

    fn fn_decl(&mut self, line: u32, name: &Rc<str>, params: &[Rc<str>], body: &[Stmt]) -> CResult<()> {
        if self.nearest_fn_scope().is_some() {
            return Err(self.err(line, format!("cannot declare function '{name}' inside another function")));
        }
        let symbol = self.declare(name, line, true)?;
        let mut fn_chunk = Chunk::new();
        self.push_scope(ScopeKind::Fn);
        for p in params {
            self.declare(p, line, false)?;
        }
        self.fn_body(&mut fn_chunk, body)?;
        self.pop_scope();
        let proto = FunctionProto {
            name: Rc::clone(name),
            params: params.to_vec(),
            chunk: fn_chunk,
        };
        self.finish_entity(symbol.slot as usize, Entity::Function(Rc::new(proto)));
        Ok(())
    }

    /// Compile a function/method body, appending an implicit `NIL; RET`
    /// when control can fall off the end (empty body or a non-`return`
    /// final statement).
    fn fn_body(&mut self, chunk: &mut Chunk, body: &[Stmt]) -> CResult<()> {
        for stmt in body {
            self.stmt(chunk, stmt)?;
        }
        let falls_through = !matches!(body.last().map(|s| &s.kind), Some(StmtKind::Return(_)));
        if falls_through {
            chunk.push_op(OpCode::Nil);
            chunk.push_op(OpCode::Ret);
        }
        Ok(())
    }

    fn class_decl(
        &mut self,
        line: u32,
        name: &Rc<str>,
        ctor: &Option<(Vec<Rc<str>>, Vec<Stmt>)>,
        methods: &[(Rc<str>, Vec<Rc<str>>, Vec<Stmt>)],
    ) -> CResult<()> {
        if self.depth() != 0 {
            return Err(self.err(line, format!("class '{name}' can only be declared at global scope")));
        }
        let symbol = self.declare(name, line, true)?;
        self.push_scope(ScopeKind::Class);
        let class_depth = self.depth();

        // Pre-declare every method name so methods can call each other
        // (and the constructor can call them) regardless of source
        // order.
        for (mname, _, _) in methods {
            self.declare_class_bound(mname, class_depth, line)?;
        }

        let ctor_proto = match ctor {
            Some((params, ctor_body)) => {
                let mut ctor_chunk = Chunk::new();
                self.push_scope(ScopeKind::Constructor);
                for p in params {
                    self.declare(p, line, false)?;
                }
                for stmt in ctor_body {
                    self.stmt(&mut ctor_chunk, stmt)?;
                }
                ctor_chunk.push_op(OpCode::This);
                ctor_chunk.push_op(OpCode::Ret);
                self.pop_scope();
                Some(Rc::new(FunctionProto {
                    name: Rc::from("init"),
                    params: params.clone(),
                    chunk: ctor_chunk,
                }))
            }
            None => None,
        };

        let mut method_table = HashMap::with_capacity(methods.len());
        for (mname, params, mbody) in methods {
            let mut m_chunk = Chunk::new();
            self.push_scope(ScopeKind::Fn);
            for p in params {
                self.declare(p, line, false)?;
            }
            self.fn_body(&mut m_chunk, mbody)?;
            self.pop_scope();
            method_table.insert(
                Rc::clone(mname),
                Rc::new(FunctionProto {
                    name: Rc::clone(mname),
                    params: params.clone(),
                    chunk: m_chunk,
                }),
            );
        }

        self.pop_scope();

        let proto = ClassProto {
            name: Rc::clone(name),
            ctor: ctor_proto,
            methods: method_table,
        };
        self.finish_entity(symbol.slot as usize, Entity::Class(Rc::new(proto)));
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Lt => OpCode::Lt,
        BinaryOp::Le => OpCode::Le,
        BinaryOp::Gt => OpCode::Gt,
        BinaryOp::Ge => OpCode::Ge,
        BinaryOp::Eq => OpCode::Eq,
        BinaryOp::Ne => OpCode::Ne,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    fn compile(src: &str) -> CompiledProgram {
        let tokens = lexer::tokenize(src).expect("lex");
        let program = parser::parse(tokens).expect("parse");
        compile_program(&program).expect("compile")
    }

    #[test]
    fn arithmetic_emits_expected_opcodes() {
        let compiled = compile("print 2 + 3 * 4;");
        assert!(compiled.script.code.first().copied() == Some(OpCode::IConst as u8));
    }

    #[test]
    fn redeclaration_in_same_scope_is_an_error() {
        let tokens = lexer::tokenize("cl a = 1; cl a = 2;").unwrap();
        let program = parser::parse(tokens).unwrap();
        let err = compile_program(&program).unwrap_err();
        assert!(err.message.contains("already declared"));
    }

    #[test]
    fn break_outside_while_is_an_error() {
        let tokens = lexer::tokenize("break;").unwrap();
        let program = parser::parse(tokens).unwrap();
        assert!(compile_program(&program).is_err());
    }

    #[test]
    fn return_inside_constructor_is_an_error() {
        let src = "klass Pt { init(x) { ret x; } }";
        let tokens = lexer::tokenize(src).unwrap();
        let program = parser::parse(tokens).unwrap();
        let err = compile_program(&program).unwrap_err();
        assert!(err.message.contains("constructor"));
    }

    #[test]
    fn function_inside_function_is_an_error() {
        let src = "proc outer() { proc inner() { ret 1; } ret 1; }";
        let tokens = lexer::tokenize(src).unwrap();
        let program = parser::parse(tokens).unwrap();
        assert!(compile_program(&program).is_err());
    }

    #[test]
    fn class_outside_global_scope_is_an_error() {
        let src = "if (true) { klass Pt { } }";
        let tokens = lexer::tokenize(src).unwrap();
        let program = parser::parse(tokens).unwrap();
        assert!(compile_program(&program).is_err());
    }

    #[test]
    fn fn_with_no_explicit_return_gets_implicit_nil_ret() {
        let compiled = compile("proc f() { print 1; }");
        let entity = compiled.entities.get(0).unwrap();
        match entity {
            Entity::Function(proto) => {
                let last_op = *proto.chunk.code.last().unwrap();
                assert_eq!(last_op, OpCode::Ret as u8);
            }
            _ => panic!("expected function entity"),
        }
    }

    #[test]
    fn while_loop_jumps_land_in_range() {
        let compiled = compile("cl i = 0; while (i < 3) { i = i + 1; }");
        // Every JMP/JIT/JIF target must stay within the chunk.
        let code = &compiled.script.code;
        let mut offset = 0;
        while offset < code.len() {
            let op = OpCode::from_u8(code[offset]).unwrap();
            offset += 1;
            match op {
                OpCode::Jmp | OpCode::Jit | OpCode::Jif => {
                    let delta = compiled.script.read_i32(offset) as i64;
                    let from = offset as i64 - 1;
                    let target = from + delta;
                    assert!(target >= 0 && target <= code.len() as i64);
                    offset += 4;
                }
                OpCode::BConst | OpCode::ArrLen => offset += op_operand_len(op),
                _ => offset += op_operand_len(op),
            }
        }
    }

    fn op_operand_len(op: OpCode) -> usize {
        match op {
            OpCode::BConst | OpCode::Arr | OpCode::Is | OpCode::Call => 1,
            OpCode::LRead | OpCode::LSet => 1,
            OpCode::IConst
            | OpCode::SConst
            | OpCode::GWrite
            | OpCode::GRead
            | OpCode::Load
            | OpCode::Class
            | OpCode::SetProperty
            | OpCode::GetProperty
            | OpCode::From => 4,
            _ => 0,
        }
    }
}
