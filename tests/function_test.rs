mod common;
use common::*;
use nanojs::mach::Vm;

#[test]
fn test_simple_call() {
    assert_eq!(run("let add = function(a, b) { a + b; }; add(3, 4)"), "7");
    assert_eq!(run("let one = function() { 1; }; one()"), "1");
}

#[test]
fn test_last_statement_is_the_result() {
    assert_eq!(run("let f = function() { 1; 2; }; f()"), "2");
    assert_eq!(run("let f = function() {}; f()"), "undefined");
}

#[test]
fn test_return() {
    assert_eq!(run("let f = function() { return 7; 8; }; f()"), "7");
    assert_eq!(run("let f = function() { return; 8; }; f()"), "undefined");
    let src = "let f = function(n) {
            if (n > 1) { return 'big'; }
            return 'small';
        };
        f(2) + ' ' + f(0)";
    assert_eq!(run(src), "big small");
}

#[test]
fn test_return_from_loop() {
    let src = "let first_over = function(limit) {
            let i = 0;
            while (true) {
                if (i > limit) { return i; }
                i = i + 1;
            }
        };
        first_over(4)";
    assert_eq!(run(src), "5");
}

#[test]
fn test_argument_binding() {
    // missing arguments bind as undefined, extras are dropped
    assert_eq!(run("let f = function(a, b) { typeof b; }; f(1)"), "undefined");
    assert_eq!(run("let f = function(a) { a; }; f(1, 2, 3)"), "1");
    // a name on a function literal binds nothing
    assert_eq!(run("let f = function self(n) { n; }; f(3)"), "3");
}

#[test]
fn test_recursion() {
    let src = "let fib = function(n) {
            return n < 2 ? n : fib(n - 2) + fib(n - 1);
        };
        fib(10)";
    assert_eq!(run(src), "55");
}

#[test]
fn test_functions_are_values() {
    let src = "let twice = function(f, x) { return f(f(x)); };
        twice(function(n) { return n + 1; }, 3)";
    assert_eq!(run(src), "5");
    // a function stringifies as its source
    assert_eq!(run("function(a) { a; }"), "function(a) { a; }");
}

#[test]
fn test_no_closures() {
    let src = "let make = function() {
            let n = 7;
            return function() { return n; };
        };
        let f = make();
        f()";
    assert_eq!(run(src), "undefined variable: [n] (line 1)");
}

#[test]
fn test_call_scope_dies_with_the_call() {
    let vm = &mut Vm::new();
    eval(vm, "let f = function(x) { x; }; f(1);");
    assert_eq!(eval(vm, "x"), "undefined variable: [x] (line 1)");
}

#[test]
fn test_not_callable() {
    assert_eq!(
        run("let x = 1; x()"),
        "not callable: calling number [1] (line 1)"
    );
    assert_eq!(run("'s'()"), "not callable: calling string [s] (line 1)");
    assert_eq!(
        run("undefined()"),
        "not callable: calling undefined [undefined] (line 1)"
    );
}

#[test]
fn test_calls_inside_expressions() {
    let src = "let sq = function(n) { n * n; };
        sq(2) + sq(3) * sq(1)";
    assert_eq!(run(src), "13");
}
