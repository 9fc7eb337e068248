mod common;
use common::*;
use nanojs::mach::Vm;

#[test]
fn test_temporaries_are_reclaimed() {
    let vm = &mut Vm::new();
    eval(vm, "0");
    let before = vm.stats();
    // concat builds intermediates; none should outlive the statement
    eval(vm, "'aa' + 'bb' + 'cc'; 0");
    assert_eq!(vm.stats().str_bytes, before.str_bytes);
    assert_eq!(vm.stats().objs, before.objs);
}

#[test]
fn test_abandoned_object_frees_everything() {
    let vm = &mut Vm::new();
    eval(vm, "let o = 0; 0");
    let before = vm.stats();
    eval(vm, "o = { k: 'vvvv', n: 1 }; 0");
    assert!(vm.stats().objs > before.objs);
    assert!(vm.stats().props > before.props);
    eval(vm, "o = 0; 0");
    let after = vm.stats();
    assert_eq!(after.objs, before.objs);
    assert_eq!(after.props, before.props);
    assert_eq!(after.str_bytes, before.str_bytes);
}

#[test]
fn test_call_scope_is_reclaimed() {
    let vm = &mut Vm::new();
    eval(vm, "let f = function(s) { s + s; }; 0");
    let before = vm.stats();
    assert_eq!(eval(vm, "f('ab')"), "abab");
    eval(vm, "0");
    let after = vm.stats();
    assert_eq!(after.objs, before.objs);
    assert_eq!(after.props, before.props);
    assert_eq!(after.str_bytes, before.str_bytes);
}

#[test]
fn test_result_stays_alive_until_next_eval() {
    let mut vm = Vm::new();
    let v = vm.eval("'一' + '二'").unwrap();
    // the concatenation is still readable after eval returns
    assert_eq!(vm.get_str(v), Some("一二"));
}

#[test]
fn test_object_pool_exhaustion() {
    let vm = &mut Vm::new();
    let mut src = String::from("let o0 = { a: 1 }");
    for i in 1..40 {
        src.push_str(&format!(", o{} = {{ a: 1 }}", i));
    }
    let msg = eval(vm, &src);
    assert!(msg.starts_with("out of memory"), "{}", msg);
    // the machine stays usable afterwards
    assert_eq!(eval(vm, "1 + 1"), "2");
}

#[test]
fn test_string_pool_exhaustion() {
    let vm = &mut Vm::new();
    let msg = eval(
        vm,
        "let s = 'xxxxxxxx'; while (true) { s = s + s; } s",
    );
    assert!(msg.starts_with("out of memory"), "{}", msg);
    assert_eq!(eval(vm, "'still' + ' works'"), "still works");
}

#[test]
fn test_runaway_recursion_is_stopped() {
    let vm = &mut Vm::new();
    let msg = eval(vm, "let f = function(n) { return f(n + 1); }; f(0)");
    assert!(msg.starts_with("stack overflow"), "{}", msg);
    assert_eq!(vm.stats().scopes, 1);
    assert_eq!(vm.stats().stack_depth, 0);
}

#[test]
fn test_errors_unwind_cleanly() {
    let vm = &mut Vm::new();
    eval(vm, "let a = 'x'; 0");
    let before = vm.stats();
    let msg = eval(vm, "{ let tmp = 'yyyy'; a + 1; }");
    assert_eq!(msg, "type mismatch: operands must be numbers (line 1)");
    assert_eq!(vm.stats().scopes, 1);
    assert_eq!(vm.stats().stack_depth, 0);
    assert_eq!(vm.stats().props, before.props);
    assert_eq!(vm.stats().str_bytes, before.str_bytes);
    // bindings from before the error are intact
    assert_eq!(eval(vm, "a + 'y'"), "xy");
}
