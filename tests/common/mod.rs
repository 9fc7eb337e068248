#![allow(dead_code)]

use nanojs::mach::Vm;

/// Evaluates a script and renders the result, or the error, the way
/// the REPL would.
pub fn eval(vm: &mut Vm, src: &str) -> String {
    match vm.eval(src) {
        Ok(v) => vm.stringify(v),
        Err(error) => format!("{}", error),
    }
}

/// Evaluates one script on a fresh machine.
pub fn run(src: &str) -> String {
    eval(&mut Vm::new(), src)
}
