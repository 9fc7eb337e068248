/*!
## Terminal Module

The `nanojs` executable: a line-editing REPL, a file runner, and the
demonstration host functions every script gets.
*/

extern crate ansi_term;
extern crate chrono;
extern crate linefeed;
extern crate rand;

use crate::lang::Error;
use crate::mach::{FfiCall, FfiVal, Vm};
use ansi_term::Style;
use chrono::Utc;
use linefeed::{Interface, ReadResult};
use rand::Rng;

pub fn main() {
    let mut args = std::env::args().skip(1);
    let result = match args.next() {
        Some(flag) if flag == "-e" => match args.next() {
            Some(src) => run_line(&src),
            None => {
                eprintln!("usage: nanojs [-e EXPR | FILE]");
                std::process::exit(2);
            }
        },
        Some(path) => run_file(&path),
        None => repl(),
    };
    if let Err(error) = result {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

fn repl() -> std::io::Result<()> {
    let interface = Interface::new("nanojs")?;
    interface.set_prompt("> ")?;
    println!("NanoJS {}", env!("CARGO_PKG_VERSION"));
    let mut vm = host_vm();
    while let ReadResult::Input(line) = interface.read_line()? {
        if line.trim().is_empty() {
            continue;
        }
        if line.trim() == ".stats" {
            println!("{}", vm.stats());
            continue;
        }
        interface.add_history_unique(line.clone());
        match vm.eval(&line) {
            Ok(v) => println!("{}", vm.stringify(v)),
            Err(error) => report(&error),
        }
    }
    Ok(())
}

fn run_file(path: &str) -> std::io::Result<()> {
    let src = std::fs::read_to_string(path)?;
    let mut vm = host_vm();
    if let Err(error) = vm.eval(&src) {
        report(&error);
        std::process::exit(1);
    }
    Ok(())
}

fn run_line(src: &str) -> std::io::Result<()> {
    let mut vm = host_vm();
    match vm.eval(src) {
        Ok(v) => println!("{}", vm.stringify(v)),
        Err(error) => {
            report(&error);
            std::process::exit(1);
        }
    }
    Ok(())
}

fn report(error: &Error) {
    eprintln!("{}", Style::new().bold().paint(error.to_string()));
}

/// A machine preloaded with the host functions every script gets.
fn host_vm() -> Vm {
    let mut vm = Vm::new();
    vm.register_native("print", "vs", print_str)
        .expect("registering print");
    vm.register_native("now", "F", now_ms)
        .expect("registering now");
    vm.register_native("random", "iii", random_range)
        .expect("registering random");
    vm
}

fn print_str(call: &mut FfiCall<'_>) -> Result<FfiVal, Error> {
    println!("{}", call.string(0)?);
    Ok(FfiVal::Word(0))
}

fn now_ms(_call: &mut FfiCall<'_>) -> Result<FfiVal, Error> {
    Ok(FfiVal::Double(Utc::now().timestamp_millis() as f64))
}

/// A word in `[lo, hi)`, or `lo` when the range is empty.
fn random_range(call: &mut FfiCall<'_>) -> Result<FfiVal, Error> {
    let lo = call.word(0)?;
    let hi = call.word(1)?;
    let n = if lo < hi {
        rand::thread_rng().gen_range(lo..hi)
    } else {
        lo
    };
    Ok(FfiVal::Word(n))
}
