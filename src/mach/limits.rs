/*!
## Limits Module

Capacity tunables for [`Vm`](super::Vm). Every pool is sized here, at
compile time; a VM never allocates beyond these bounds once created.
Hosts that need bigger scripts bump these and rebuild.

*/

/// Operand stack slots. Expression evaluation depth, not call depth.
pub const DATA_STACK_SIZE: usize = 32;

/// Scope stack slots. One is taken by the global scope, each block and
/// each function call takes one more.
pub const SCOPE_STACK_SIZE: usize = 16;

/// Object pool slots, including the global object at slot zero.
pub const OBJ_POOL_SIZE: usize = 32;

/// Property pool slots, shared by all objects.
pub const PROP_POOL_SIZE: usize = 128;

/// Native function descriptors a VM can register.
pub const NATIVE_POOL_SIZE: usize = 16;

/// Bytes in the compacting string buffer. Each string costs its length
/// plus two bytes of framing.
pub const STR_BUF_SIZE: usize = 4096;

/// Longest string value, in bytes. The framing length prefix is a
/// single byte.
pub const STR_MAX_LEN: usize = 0xff;

/// Retained message bytes for the most recent evaluation error.
pub const ERROR_MSG_SIZE: usize = 64;

/// Parser recursion guard, counting expression nesting, operator
/// chains, and script function calls together.
pub const MAX_NEST_DEPTH: u32 = 256;

/// Arguments a native function signature may declare.
pub const MAX_FFI_ARGS: usize = 6;

/// Arguments a signature may declare when any of them is a float or a
/// double.
pub const MAX_FFI_FLOAT_ARGS: usize = 3;
