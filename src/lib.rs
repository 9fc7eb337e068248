//! # NanoJS
//!
//! An embeddable JavaScript subset for memory-constrained hosts.
//!
//! The whole engine lives in one fixed-size machine: no syntax tree, no
//! bytecode, no heap allocation per value. Source is evaluated in a
//! single pass, and strings live in a compacting pool a few kilobytes
//! large, which makes the engine suitable as a scripting layer on
//! hosts where memory is counted in bytes.
//!
//! Embedding is three calls:
//! ```
//! use nanojs::mach::Vm;
//!
//! let mut vm = Vm::new();
//! let v = vm.eval("let x = 40; x + 2").unwrap();
//! assert_eq!(vm.stringify(v), "42");
//! ```
//!
//! Host functions register with a type signature and marshal
//! automatically:
//! ```
//! use nanojs::mach::{FfiCall, FfiVal, Val, Vm};
//! # use nanojs::lang::Error;
//!
//! fn triple(call: &mut FfiCall) -> Result<FfiVal, Error> {
//!     Ok(FfiVal::Word(call.word(0)? * 3))
//! }
//!
//! let mut vm = Vm::new();
//! vm.register_native("triple", "ii", triple).unwrap();
//! assert_eq!(vm.eval("triple(14)").unwrap(), Val::Num(42.0));
//! ```
//!
//! The `nanojs` binary runs script files and offers a line-editing
//! REPL. See the language guide for what the dialect does and does not
//! include.

#[path = "doc/guide.rs"]
#[allow(non_snake_case)]
pub mod _Language_Guide;

pub mod lang;
pub mod mach;
pub mod term;
