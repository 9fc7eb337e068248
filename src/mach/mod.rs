/*!
## Machine Module

This Rust module is the NanoJS virtual machine. All script state lives
in fixed-capacity pools owned by [`Vm`]; the evaluator parses source
text and executes it in the same pass, keeping expression state on the
operand stack.

*/

pub type Ind = u16;

/// Terminates property chains and marks unallocated slots.
pub const INVALID_INDEX: Ind = Ind::MAX;

mod eval;
mod ffi;
pub mod limits;
mod pool;
mod stack;
mod val;
mod vm;

pub use ffi::FfiCall;
pub use ffi::FfiVal;
pub use ffi::NativeFn;
pub use ffi::Word;
pub use stack::Stack;
pub use val::Type;
pub use val::Val;
pub use vm::Vm;
pub use vm::VmStats;
