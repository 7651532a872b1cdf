//! End-to-end scenarios: source text in, exact stdout out, driving the
//! full lex → parse → compile → run pipeline the way `glintc` does.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use glint_compiler::compile_source;
use glint_runtime::Vm;

/// An in-memory sink for `print` output, shared with the assertion
/// after the VM (which takes `self` by value in `run`) is consumed.
#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run(source: &str) -> (String, i32) {
    let compiled = compile_source(source).expect("should compile");
    let captured = Captured::default();
    let vm = Vm::new(compiled.entities, compiled.constants, compiled.script)
        .with_writer(Box::new(captured.clone()));
    let code = vm.run();
    let out = String::from_utf8(captured.0.borrow().clone()).expect("utf8 output");
    (out, code)
}

#[test]
fn arithmetic_precedence() {
    let (out, code) = run("print 2 + 3 * 4 ;");
    assert_eq!(out, "14\n");
    assert_eq!(code, 0);
}

#[test]
fn globals_and_addition() {
    let (out, _) = run("cl x = 10; cl y = 20; print x + y;");
    assert_eq!(out, "30\n");
}

#[test]
fn recursive_fibonacci() {
    let (out, _) = run(
        "proc fib(n){ if (n < 2) { ret n; } ret fib(n-1) + fib(n-2); }
         print fib(10);",
    );
    assert_eq!(out, "55\n");
}

#[test]
fn class_constructor_and_method() {
    let (out, _) = run(
        "klass Pt { init(x,y){ this.x=x; this.y=y; } proc sum(){ ret this.x + this.y; } }
         cl p = Pt(3,4); print p.sum();",
    );
    assert_eq!(out, "7\n");
}

#[test]
fn array_index_read_and_write() {
    let (out, _) = run("cl a = [10,20,30]; print a[1]; a[1]=99; print a[1];");
    assert_eq!(out, "20\n99\n");
}

#[test]
fn while_loop_prints_each_iteration() {
    let (out, _) = run("cl i = 0; while (i < 3) { print i; i = i + 1; }");
    assert_eq!(out, "0\n1\n2\n");
}

#[test]
fn is_and_from_type_tests() {
    let (out, _) = run(
        r#"klass Pt { init(x){ this.x = x; } }
           print "he" is str;
           print 5 from Pt;"#,
    );
    assert_eq!(out, "true\nfalse\n");
}

#[test]
fn empty_array_literal_with_explicit_length_is_all_nil() {
    let (out, _) = run("cl a = []:5; print a[4];");
    assert_eq!(out, "NIL\n");
}

#[test]
fn out_of_bounds_array_write_is_a_runtime_error_exit_code() {
    let (_, code) = run("cl a = [1,2,3]; a[5] = 9;");
    assert_eq!(code, 1);
}

#[test]
fn panic_native_exits_one() {
    let (_, code) = run(r#"panic("boom");"#);
    assert_eq!(code, 1);
}

#[test]
fn exit_native_sets_exit_code() {
    let (_, code) = run("exit(7);");
    assert_eq!(code, 7);
}

#[test]
fn break_and_continue_inside_while() {
    let (out, _) = run(
        "cl i = 0; while (true) { i = i + 1; if (i == 2) { continue; } if (i > 3) { break; } print i; }",
    );
    assert_eq!(out, "1\n3\n");
}

#[test]
fn elif_cascade_picks_first_matching_branch() {
    let (out, _) = run(
        "cl x = 2; if (x == 1) { print 100; } elif (x == 2) { print 200; } else { print 300; }",
    );
    assert_eq!(out, "200\n");
}

#[test]
fn string_concat_and_length_natives() {
    let (out, _) = run(r#"print concat("foo", "bar"); print str_len("hello");"#);
    assert_eq!(out, "foobar\n5\n");
}

#[test]
fn undefined_symbol_is_a_compile_error() {
    let err = compile_source("print nope;").unwrap_err();
    assert!(err.to_string().contains("COMPILE_ERROR"));
}
