/*!
## FFI Module

Signature-driven marshaling between script values and host functions.

A native is registered with a signature string: the first character
declares the return type, the rest declare the arguments.

| char | meaning                                          |
|------|--------------------------------------------------|
| `v`  | return only: undefined                           |
| `i`  | machine-word integer                             |
| `b`  | boolean (argument marshals by truthiness)        |
| `f`  | 32-bit float                                     |
| `F`  | 64-bit double                                    |
| `s`  | string, copied across the boundary               |
| `u`  | argument only: consumed and ignored              |
| `[…]`| argument only: a script function, callable later |

At most [`MAX_FFI_ARGS`](super::limits::MAX_FFI_ARGS) arguments, at most
[`MAX_FFI_FLOAT_ARGS`](super::limits::MAX_FFI_FLOAT_ARGS) when any is a
float or double, floats and doubles never mixed, and at most one
callback. Calls are checked strictly: arity and argument types must
match the declaration or the call fails.
*/

use super::eval;
use super::limits;
use super::pool::NativeDesc;
use super::val::Val;
use super::vm::Vm;
use crate::error;
use crate::lang::Error;
use log::trace;

type Result<T> = std::result::Result<T, Error>;

/// Machine-word integer crossing the host boundary.
pub type Word = isize;

/// A host function. It receives the marshaled call and returns one
/// value matching its registered return type.
pub type NativeFn = fn(&mut FfiCall<'_>) -> Result<FfiVal>;

/// A value marshaled across the host boundary.
#[derive(Debug, Clone)]
pub enum FfiVal {
    Word(Word),
    Bool(bool),
    Float(f32),
    Double(f64),
    Str(String),
    /// Placeholder for a callback argument; the function itself is held
    /// by the call and applied through [`FfiCall::invoke`].
    Callback,
}

/// A script function argument captured for later application. The
/// source is copied out of the pool, so the callback stays valid no
/// matter what the machine reclaims in the meantime.
#[derive(Debug, Clone)]
struct PendingCb {
    body: String,
    sig: String,
}

/// One native call in flight: the marshaled arguments plus the machine,
/// re-entrant for callbacks.
pub struct FfiCall<'v> {
    vm: &'v mut Vm,
    args: Vec<FfiVal>,
    cb: Option<PendingCb>,
    depth: u32,
}

impl<'v> FfiCall<'v> {
    pub fn count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[FfiVal] {
        &self.args
    }

    pub fn word(&self, i: usize) -> Result<Word> {
        match self.args.get(i) {
            Some(FfiVal::Word(w)) => Ok(*w),
            _ => Err(error!(FfiCall; "argument {} is not a word", i + 1)),
        }
    }

    pub fn boolean(&self, i: usize) -> Result<bool> {
        match self.args.get(i) {
            Some(FfiVal::Bool(b)) => Ok(*b),
            _ => Err(error!(FfiCall; "argument {} is not a boolean", i + 1)),
        }
    }

    pub fn float(&self, i: usize) -> Result<f32> {
        match self.args.get(i) {
            Some(FfiVal::Float(n)) => Ok(*n),
            _ => Err(error!(FfiCall; "argument {} is not a float", i + 1)),
        }
    }

    pub fn double(&self, i: usize) -> Result<f64> {
        match self.args.get(i) {
            Some(FfiVal::Double(n)) => Ok(*n),
            _ => Err(error!(FfiCall; "argument {} is not a double", i + 1)),
        }
    }

    pub fn string(&self, i: usize) -> Result<&str> {
        match self.args.get(i) {
            Some(FfiVal::Str(s)) => Ok(s),
            _ => Err(error!(FfiCall; "argument {} is not a string", i + 1)),
        }
    }

    /// Applies the call's callback argument to `words`. Arguments the
    /// callback declared as `i` receive successive words rendered as
    /// numbers; every other declaration receives `null`. The callback's
    /// result is truncated to a word, zero when not a number.
    pub fn invoke(&mut self, words: &[Word]) -> Result<Word> {
        let cb = match &self.cb {
            Some(cb) => cb.clone(),
            None => return Err(error!(FfiCall; "call has no callback argument")),
        };
        let mut rendered = String::new();
        for (i, c) in cb.sig.chars().skip(1).enumerate() {
            if i > 0 {
                rendered.push(',');
            }
            match c {
                'i' => {
                    let w = words.get(i).copied().unwrap_or(0);
                    rendered.push_str(&w.to_string());
                }
                _ => rendered.push_str("null"),
            }
        }
        trace!("callback {} ({})", cb.sig, rendered);
        let result = eval::run_call(self.vm, &cb.body, &rendered, self.depth)?;
        let word = result.as_num().unwrap_or(0.0) as Word;
        self.vm.abandon(result);
        Ok(word)
    }
}

/// Argument declarations, scanned out of a signature's tail.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ArgKind {
    Word,
    Bool,
    Float,
    Double,
    Str,
    Userdata,
    /// Byte span of the nested signature, brackets excluded.
    Callback(usize, usize),
}

fn scan_args(tail: &str, allow_callback: bool) -> Result<Vec<ArgKind>> {
    let b = tail.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < b.len() {
        let kind = match b[i] {
            b'i' => ArgKind::Word,
            b'b' => ArgKind::Bool,
            b'f' => ArgKind::Float,
            b'F' => ArgKind::Double,
            b's' => ArgKind::Str,
            b'u' => ArgKind::Userdata,
            b'[' if allow_callback => {
                let start = i + 1;
                match tail[start..].find(']') {
                    Some(off) => {
                        i = start + off;
                        ArgKind::Callback(start, start + off)
                    }
                    None => return Err(error!(BadSignature; "unterminated callback")),
                }
            }
            c => {
                return Err(error!(BadSignature; "bad argument type '{}'", c as char));
            }
        };
        out.push(kind);
        i += 1;
    }
    Ok(out)
}

/// Validates a signature at registration time so calls can trust it.
pub(crate) fn check_signature(sig: &str) -> Result<()> {
    let ret = match sig.chars().next() {
        Some(c) => c,
        None => return Err(error!(BadSignature; "empty signature")),
    };
    if !matches!(ret, 'v' | 'i' | 'b' | 'f' | 'F' | 's') {
        return Err(error!(BadSignature; "bad return type '{}'", ret));
    }
    let tail = &sig[1..];
    let args = scan_args(tail, true)?;
    if args.len() > limits::MAX_FFI_ARGS {
        return Err(error!(BadSignature; "too many arguments"));
    }
    let mut floats = 0;
    let mut doubles = 0;
    let mut callbacks = 0;
    for arg in &args {
        match *arg {
            ArgKind::Float => floats += 1,
            ArgKind::Double => doubles += 1,
            ArgKind::Callback(start, end) => {
                callbacks += 1;
                check_callback_signature(&tail[start..end])?;
            }
            _ => {}
        }
    }
    if floats > 0 && doubles > 0 {
        return Err(error!(BadSignature; "float and double arguments mixed"));
    }
    if (floats > 0 || doubles > 0) && args.len() > limits::MAX_FFI_FLOAT_ARGS {
        return Err(error!(BadSignature; "too many arguments alongside floats"));
    }
    if callbacks > 1 {
        return Err(error!(BadSignature; "more than one callback"));
    }
    Ok(())
}

fn check_callback_signature(sig: &str) -> Result<()> {
    let ret = match sig.chars().next() {
        Some(c) => c,
        None => return Err(error!(BadSignature; "empty callback signature")),
    };
    if !matches!(ret, 'v' | 'i' | 'b' | 'f' | 'F' | 's') {
        return Err(error!(BadSignature; "bad callback return type '{}'", ret));
    }
    scan_args(&sig[1..], false)?;
    Ok(())
}

/// Marshals the top `nargs` operand stack slots per the declaration and
/// applies the native function. The stack itself is left untouched; the
/// evaluator unwinds it after the return value is converted.
pub(crate) fn dispatch(vm: &mut Vm, desc: &NativeDesc, nargs: usize, depth: u32) -> Result<FfiVal> {
    trace!("ffi [{}] with {} args", desc.sig, nargs);
    let tail = &desc.sig[1..];
    let decls = scan_args(tail, true)?;
    if decls.len() != nargs {
        return Err(error!(FfiCall; "expected {} arguments, got {}", decls.len(), nargs));
    }
    let mut args = Vec::with_capacity(nargs);
    let mut cb = None;
    for (i, kind) in decls.iter().enumerate() {
        let v = vm.peek(nargs - 1 - i)?;
        let marshaled = match *kind {
            ArgKind::Word => match v.as_num() {
                Some(n) => FfiVal::Word(n as Word),
                None => return Err(arg_mismatch(i, "number")),
            },
            ArgKind::Bool => FfiVal::Bool(vm.is_true(v)),
            ArgKind::Float => match v.as_num() {
                Some(n) => FfiVal::Float(n),
                None => return Err(arg_mismatch(i, "number")),
            },
            ArgKind::Double => match v.as_num() {
                Some(n) => FfiVal::Double(n as f64),
                None => return Err(arg_mismatch(i, "number")),
            },
            ArgKind::Str => match v {
                Val::Str(_) => match vm.get_str(v) {
                    Some(s) => FfiVal::Str(s.to_string()),
                    None => {
                        return Err(error!(FfiCall; "argument {} is not valid utf-8", i + 1));
                    }
                },
                _ => return Err(arg_mismatch(i, "string")),
            },
            ArgKind::Userdata => FfiVal::Word(0),
            ArgKind::Callback(start, end) => {
                let body = match v {
                    Val::Func(_) => vm.func_source(v)?.to_string(),
                    _ => return Err(arg_mismatch(i, "function")),
                };
                cb = Some(PendingCb {
                    body,
                    sig: tail[start..end].to_string(),
                });
                FfiVal::Callback
            }
        };
        args.push(marshaled);
    }
    let mut call = FfiCall {
        vm,
        args,
        cb,
        depth,
    };
    (desc.func)(&mut call)
}

fn arg_mismatch(i: usize, want: &str) -> Error {
    error!(FfiCall; "argument {} must be a {}", i + 1, want)
}

/// Converts the native's return value per the signature's first
/// character. A mismatched variant is the host's bug and fails the
/// call.
pub(crate) fn ret_to_val(vm: &mut Vm, desc: &NativeDesc, ret: FfiVal) -> Result<Val> {
    match (desc.sig.as_bytes()[0], ret) {
        (b'v', _) => Ok(Val::Undefined),
        (b'i', FfiVal::Word(w)) => Ok(Val::Num(w as f32)),
        (b'b', FfiVal::Bool(t)) => Ok(Val::Num(if t { 1.0 } else { 0.0 })),
        (b'f', FfiVal::Float(n)) => Ok(Val::Num(n)),
        (b'F', FfiVal::Double(n)) => Ok(Val::Num(n as f32)),
        (b's', FfiVal::Str(s)) => vm.mk_str(s.as_bytes()),
        (want, got) => {
            Err(error!(FfiCall; "native returned {:?}, signature says '{}'", got, want as char))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_signature_validation() {
        assert!(check_signature("v").is_ok());
        assert!(check_signature("iii").is_ok());
        assert!(check_signature("vsb").is_ok());
        assert!(check_signature("vi[vi]u").is_ok());
        assert!(check_signature("vff").is_ok());
        assert!(check_signature("FFF").is_ok());

        assert!(check_signature("").is_err());
        assert!(check_signature("x").is_err());
        assert!(check_signature("vx").is_err());
        assert!(check_signature("vu[vi").is_err());
        assert!(check_signature("v[x]").is_err());
        assert!(check_signature("v[]").is_err());
        // u is argument-only
        assert!(check_signature("u").is_err());
        // arity and float limits
        assert!(check_signature("viiiiiii").is_err());
        assert!(check_signature("vffff").is_err());
        assert!(check_signature("vfiii").is_err());
        assert!(check_signature("vfF").is_err());
        assert!(check_signature("v[vi][vi]").is_err());
    }

    fn double_word(call: &mut FfiCall<'_>) -> Result<FfiVal> {
        Ok(FfiVal::Word(call.word(0)? * 2))
    }

    fn shout(call: &mut FfiCall<'_>) -> Result<FfiVal> {
        Ok(FfiVal::Str(call.string(0)?.to_uppercase()))
    }

    fn apply_cb(call: &mut FfiCall<'_>) -> Result<FfiVal> {
        let n = call.word(0)?;
        let w = call.invoke(&[n])?;
        Ok(FfiVal::Word(w))
    }

    #[test]
    fn test_word_round_trip() {
        let mut vm = Vm::new();
        vm.register_native("dbl", "ii", double_word).unwrap();
        assert_eq!(vm.eval("dbl(21)").unwrap(), Val::Num(42.0));
        assert_eq!(vm.eval("dbl(dbl(1)) + 1").unwrap(), Val::Num(5.0));
    }

    #[test]
    fn test_string_round_trip() {
        let mut vm = Vm::new();
        vm.register_native("shout", "ss", shout).unwrap();
        let v = vm.eval("shout('hi ' + 'there')").unwrap();
        assert_eq!(vm.get_str(v), Some("HI THERE"));
    }

    #[test]
    fn test_arity_is_strict() {
        let mut vm = Vm::new();
        vm.register_native("dbl", "ii", double_word).unwrap();
        let e = vm.eval("dbl()").unwrap_err();
        assert_eq!(e.code(), ErrorCode::FfiCall);
        let e = vm.eval("dbl(1, 2)").unwrap_err();
        assert_eq!(e.code(), ErrorCode::FfiCall);
    }

    #[test]
    fn test_arg_types_are_strict() {
        let mut vm = Vm::new();
        vm.register_native("dbl", "ii", double_word).unwrap();
        let e = vm.eval("dbl('nope')").unwrap_err();
        assert_eq!(e.code(), ErrorCode::FfiCall);
    }

    #[test]
    fn test_bad_signature_is_rejected_at_registration() {
        let mut vm = Vm::new();
        let e = vm.register_native("bad", "q", double_word).unwrap_err();
        assert_eq!(e.code(), ErrorCode::BadSignature);
    }

    #[test]
    fn test_callback() {
        let mut vm = Vm::new();
        vm.register_native("apply", "ii[ii]u", apply_cb).unwrap();
        let v = vm
            .eval("apply(5, function(x) { return x + 1; }, null)")
            .unwrap();
        assert_eq!(v, Val::Num(6.0));
    }

    #[test]
    fn test_callback_missing() {
        fn bad_invoke(call: &mut FfiCall<'_>) -> Result<FfiVal> {
            call.invoke(&[1])?;
            Ok(FfiVal::Word(0))
        }
        let mut vm = Vm::new();
        vm.register_native("f", "ii", bad_invoke).unwrap();
        let e = vm.eval("f(1)").unwrap_err();
        assert_eq!(e.code(), ErrorCode::FfiCall);
    }
}
