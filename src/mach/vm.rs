/*!
## VM Module

[`Vm`] owns all script state: the operand and scope stacks, the object
and property pools, the native-function table and the string buffer.
Nothing is heap-allocated per value; strings live in one compacting
buffer and everything else is a pool slot, so a `Vm` is bounded by the
capacities in [`limits`](super::limits) for as long as it lives.

Memory is reclaimed eagerly. Dropping a value abandons it: if no
property and no live stack slot still references it, a string is cut
out of the buffer (relocating everything above it) and an object is
freed along with its properties. Cyclic objects defeat this scheme and
stay allocated; function sources are deliberately never reclaimed.

*/

use super::eval;
use super::ffi;
use super::limits;
use super::pool::{NativeDesc, Obj, Prop, StrPool};
use super::pool::{OBJ_ALLOCATED, PROP_ALLOCATED};
use super::stack::Stack;
use super::val::Val;
use super::{Ind, INVALID_INDEX};
use crate::error;
use crate::lang::Error;
use log::{debug, trace};

type Result<T> = std::result::Result<T, Error>;

pub struct Vm {
    pub(crate) data: Stack<Val>,
    pub(crate) scopes: Stack<Val>,
    objs: Vec<Obj>,
    props: Vec<Prop>,
    natives: Vec<NativeDesc>,
    strings: StrPool,
    last_error: String,
}

/// Pool occupancy snapshot, for hosts that watch memory pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmStats {
    pub objs: usize,
    pub props: usize,
    pub natives: usize,
    pub str_bytes: usize,
    pub stack_depth: usize,
    pub scopes: usize,
}

impl std::fmt::Display for VmStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "objs {}/{} props {}/{} strings {}/{} stack {} scopes {}",
            self.objs,
            limits::OBJ_POOL_SIZE,
            self.props,
            limits::PROP_POOL_SIZE,
            self.str_bytes,
            limits::STR_BUF_SIZE,
            self.stack_depth,
            self.scopes
        )
    }
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Vm {{ {} }}", self.stats())
    }
}

impl Default for Vm {
    fn default() -> Vm {
        Vm::new()
    }
}

impl Vm {
    pub fn new() -> Vm {
        let mut objs = vec![Obj::free(); limits::OBJ_POOL_SIZE];
        objs[0] = Obj {
            flags: OBJ_ALLOCATED,
            props: INVALID_INDEX,
        };
        let mut scopes = Stack::new(limits::SCOPE_STACK_SIZE, "scope stack overflow");
        // Slot zero is the global object and the bottom scope.
        scopes
            .push(Val::Obj(0))
            .expect("fresh scope stack has room for the global scope");
        Vm {
            data: Stack::new(limits::DATA_STACK_SIZE, "operand stack overflow"),
            scopes,
            objs,
            props: vec![Prop::free(); limits::PROP_POOL_SIZE],
            natives: Vec::with_capacity(limits::NATIVE_POOL_SIZE),
            strings: StrPool::new(limits::STR_BUF_SIZE),
            last_error: String::new(),
        }
    }

    /// Evaluates a script and returns the value of its last statement.
    ///
    /// The returned value stays alive, and any string or object data it
    /// points at stays valid, until the next `eval` call on this VM.
    /// On error the stacks are unwound, the message is retained for
    /// [`last_error`](Vm::last_error), and the VM remains usable.
    pub fn eval(&mut self, src: &str) -> Result<Val> {
        self.last_error.clear();
        // The previous result was kept alive for the host; reclaim it now.
        while !self.data.is_empty() {
            self.drop_top()?;
        }
        debug!("eval {:?}", src);
        match eval::run(self, src) {
            Ok(v) => {
                debug!("eval done: {}", self.stats());
                Ok(v)
            }
            Err(e) => {
                self.record_error(&e);
                self.recover();
                Err(e)
            }
        }
    }

    /// Message of the most recent evaluation error, bounded in length.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    fn record_error(&mut self, e: &Error) {
        let mut msg = e.to_string();
        if msg.len() > limits::ERROR_MSG_SIZE {
            let mut n = limits::ERROR_MSG_SIZE;
            while !msg.is_char_boundary(n) {
                n -= 1;
            }
            msg.truncate(n);
        }
        self.last_error = msg;
    }

    /// Unwinds whatever an aborted evaluation left behind.
    fn recover(&mut self) {
        while self.scopes.len() > 1 {
            if self.delete_scope().is_err() {
                break;
            }
        }
        while !self.data.is_empty() {
            match self.data.pop() {
                Ok(v) => self.abandon(v),
                Err(_) => break,
            }
        }
    }

    // ------------------------------------------------------- constructors

    /// Copies `bytes` into the string pool and returns a value backed
    /// by them. Hosts use this to build string globals.
    pub fn mk_str(&mut self, bytes: &[u8]) -> Result<Val> {
        let ind = self.strings.append(bytes)?;
        trace!("mk_str {} [{}]", ind, String::from_utf8_lossy(bytes));
        Ok(Val::Str(ind))
    }

    /// Stores a function's source text. Same framing as a string, but
    /// tagged so it calls instead of printing.
    pub(crate) fn mk_func(&mut self, src: &str) -> Result<Val> {
        let ind = self.strings.append(src.as_bytes())?;
        trace!("mk_func {} [{}]", ind, src);
        Ok(Val::Func(ind))
    }

    pub(crate) fn mk_obj(&mut self, flags: u8) -> Result<Val> {
        // Slot zero is the global object; scan from one.
        for i in 1..self.objs.len() {
            if self.objs[i].is_allocated() {
                continue;
            }
            self.objs[i] = Obj {
                flags: OBJ_ALLOCATED | flags,
                props: INVALID_INDEX,
            };
            trace!("mk_obj {}", i);
            return Ok(Val::Obj(i as Ind));
        }
        Err(error!(OutOfMemory; "object pool full"))
    }

    // ------------------------------------------------------------- hosts

    /// Registers a Rust function under `name` in the global scope.
    /// `sig` declares the return and argument types and is validated
    /// here; see the [`ffi`](super::ffi) module for the grammar.
    pub fn register_native(&mut self, name: &str, sig: &str, func: ffi::NativeFn) -> Result<()> {
        ffi::check_signature(sig)?;
        if self.natives.len() >= limits::NATIVE_POOL_SIZE {
            return Err(error!(OutOfMemory; "native pool full"));
        }
        let ind = self.natives.len() as Ind;
        self.natives.push(NativeDesc {
            func,
            sig: sig.to_string(),
        });
        self.set_global(name, Val::Native(ind))
    }

    /// Binds a value to a name in the global scope.
    pub fn set_global(&mut self, name: &str, val: Val) -> Result<()> {
        let key = self.mk_str(name.as_bytes())?;
        self.set_prop(Val::Obj(0), key, val)
    }

    pub fn get_global(&self, name: &str) -> Option<Val> {
        let ind = self.find_prop(Val::Obj(0), name.as_bytes())?;
        Some(self.props[ind as usize].val)
    }

    pub fn stats(&self) -> VmStats {
        VmStats {
            objs: self.objs.iter().filter(|o| o.is_allocated()).count(),
            props: self.props.iter().filter(|p| p.is_allocated()).count(),
            natives: self.natives.len(),
            str_bytes: self.strings.used(),
            stack_depth: self.data.len(),
            scopes: self.scopes.len(),
        }
    }

    // ------------------------------------------------------------ values

    pub fn is_true(&self, v: Val) -> bool {
        match v {
            Val::True => true,
            Val::Num(n) => n != 0.0,
            Val::Obj(_) | Val::Func(_) => true,
            Val::Str(i) => self.strings.length(i) > 0,
            _ => false,
        }
    }

    /// String content of a string or function value.
    pub fn get_str(&self, v: Val) -> Option<&str> {
        match v {
            Val::Str(i) | Val::Func(i) => std::str::from_utf8(self.strings.bytes(i)).ok(),
            _ => None,
        }
    }

    pub(crate) fn str_bytes(&self, ind: Ind) -> &[u8] {
        self.strings.bytes(ind)
    }

    pub(crate) fn str_eq(&self, a: Ind, b: Ind) -> bool {
        self.strings.bytes(a) == self.strings.bytes(b)
    }

    pub(crate) fn concat(&mut self, a: Ind, b: Ind) -> Result<Val> {
        let ind = self.strings.append_pair(a, b)?;
        Ok(Val::Str(ind))
    }

    pub(crate) fn func_source(&self, v: Val) -> Result<&str> {
        match v {
            Val::Func(i) => std::str::from_utf8(self.strings.bytes(i))
                .map_err(|_| error!(InternalError; "function source is not utf-8")),
            _ => Err(error!(NotCallable; "calling a non-function")),
        }
    }

    pub(crate) fn native(&self, ind: Ind) -> Result<NativeDesc> {
        match self.natives.get(ind as usize) {
            Some(desc) => Ok(desc.clone()),
            None => Err(error!(InternalError; "corrupt native index {}", ind)),
        }
    }

    /// Renders a value for display.
    pub fn stringify(&self, v: Val) -> String {
        match v {
            Val::Undefined => "undefined".to_string(),
            Val::Null => "null".to_string(),
            Val::True => "true".to_string(),
            Val::False => "false".to_string(),
            Val::Num(n) => format_num(n),
            Val::Str(i) | Val::Func(i) => {
                String::from_utf8_lossy(self.strings.bytes(i)).into_owned()
            }
            Val::Obj(i) => {
                let mut out = String::from("obj(");
                let mut pi = self.objs[i as usize].props;
                while pi != INVALID_INDEX {
                    let prop = &self.props[pi as usize];
                    if let Val::Str(k) = prop.key {
                        if out.len() > 4 {
                            out.push(',');
                        }
                        out.push_str(&String::from_utf8_lossy(self.strings.bytes(k)));
                    }
                    pi = prop.next;
                }
                out.push(')');
                out
            }
            Val::Native(i) => format!("cfunc@{}", i),
            Val::Err => format!("ERROR: {}", self.last_error),
            Val::Ref(i) => format!("ref@{}", i),
        }
    }

    // -------------------------------------------------------- properties

    /// Finds a property by key content in one object. Returns the
    /// property pool index.
    pub(crate) fn find_prop(&self, obj: Val, name: &[u8]) -> Option<Ind> {
        let oi = match obj {
            Val::Obj(i) => i as usize,
            _ => return None,
        };
        let mut pi = self.objs.get(oi)?.props;
        while pi != INVALID_INDEX {
            let prop = &self.props[pi as usize];
            if let Val::Str(k) = prop.key {
                if self.strings.bytes(k) == name {
                    return Some(pi);
                }
            }
            pi = prop.next;
        }
        None
    }

    pub(crate) fn prop_val(&self, prop_ind: Ind) -> Val {
        self.props[prop_ind as usize].val
    }

    /// Overwrites a property value, reclaiming whatever it replaced.
    pub(crate) fn assign_prop(&mut self, prop_ind: Ind, val: Val) {
        let old = self.props[prop_ind as usize].val;
        self.props[prop_ind as usize].val = val;
        trace!("assign prop {} = {:?}", prop_ind, val);
        self.abandon(old);
    }

    /// Sets `obj[key] = val`, overwriting an existing property of the
    /// same key or allocating a new slot. `key` must be a string value.
    pub(crate) fn set_prop(&mut self, obj: Val, key: Val, val: Val) -> Result<()> {
        let oi = match obj {
            Val::Obj(i) => i as usize,
            _ => return Err(error!(TypeMismatch; "setting property on non-object")),
        };
        if oi >= self.objs.len() || !self.objs[oi].is_allocated() {
            return Err(error!(InternalError; "corrupt object index {}", oi));
        }
        let ki = match key {
            Val::Str(k) => k,
            _ => return Err(error!(InternalError; "property key must be a string")),
        };
        let existing = {
            let name = self.strings.bytes(ki);
            self.find_prop(obj, name)
        };
        if let Some(pi) = existing {
            let old = self.props[pi as usize].val;
            self.props[pi as usize].val = val;
            trace!("set_prop {} (overwrite) = {:?}", pi, val);
            // The freshly made key duplicates the stored one.
            self.abandon_pair(old, key);
            return Ok(());
        }
        for i in 0..self.props.len() {
            if self.props[i].is_allocated() {
                continue;
            }
            self.props[i] = Prop {
                flags: PROP_ALLOCATED,
                key,
                val,
                next: self.objs[oi].props,
            };
            self.objs[oi].props = i as Ind;
            trace!("set_prop {} = {:?}", i, val);
            return Ok(());
        }
        Err(error!(OutOfMemory; "property pool full"))
    }

    // ------------------------------------------------------------ scopes

    /// Walks scopes innermost to outermost looking for a variable.
    pub(crate) fn lookup(&self, name: &[u8]) -> Option<Ind> {
        for i in (0..self.scopes.len()).rev() {
            let scope = *self.scopes.get(i)?;
            if let Some(pi) = self.find_prop(scope, name) {
                return Some(pi);
            }
        }
        None
    }

    pub(crate) fn current_scope(&self) -> Val {
        *self.scopes.last().unwrap_or(&Val::Obj(0))
    }

    pub(crate) fn create_scope(&mut self, flags: u8) -> Result<Val> {
        let scope = self.mk_obj(flags)?;
        if let Err(e) = self.scopes.push(scope) {
            self.abandon(scope);
            return Err(e);
        }
        debug!("create_scope {:?}", scope);
        Ok(scope)
    }

    pub(crate) fn delete_scope(&mut self) -> Result<()> {
        if self.scopes.len() <= 1 {
            return Err(error!(InternalError; "corrupt scope stack"));
        }
        let scope = self.scopes.pop()?;
        debug!("delete_scope {:?}", scope);
        self.abandon(scope);
        Ok(())
    }

    // ----------------------------------------------------- operand stack

    pub(crate) fn push(&mut self, v: Val) -> Result<()> {
        trace!("push {:?}", v);
        self.data.push(v)
    }

    /// Pops without reclaiming. For values about to be re-rooted.
    pub(crate) fn pop_raw(&mut self) -> Result<Val> {
        self.data.pop()
    }

    /// Pops and reclaims the top of the operand stack.
    pub(crate) fn drop_top(&mut self) -> Result<()> {
        let v = self.data.pop()?;
        trace!("drop {:?}", v);
        self.abandon(v);
        Ok(())
    }

    pub(crate) fn top(&self) -> Result<Val> {
        self.peek(0)
    }

    pub(crate) fn peek(&self, depth: usize) -> Result<Val> {
        let len = self.data.len();
        if depth >= len {
            return Err(error!(StackUnderflow; "operand stack"));
        }
        match self.data.get(len - 1 - depth) {
            Some(v) => Ok(*v),
            None => Err(error!(StackUnderflow; "operand stack")),
        }
    }

    pub(crate) fn poke(&mut self, depth: usize, v: Val) -> Result<()> {
        let len = self.data.len();
        if depth >= len {
            return Err(error!(StackUnderflow; "operand stack"));
        }
        match self.data.get_mut(len - 1 - depth) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(error!(StackUnderflow; "operand stack")),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.data.len()
    }

    // ------------------------------------------------------- reclamation

    /// Reclaims a value nothing points at any more. Strings and objects
    /// are the only owning variants; everything else is inert. A value
    /// still referenced by a property or a live stack slot is kept.
    /// Function sources are never reclaimed.
    pub(crate) fn abandon(&mut self, v: Val) {
        match v {
            Val::Str(_) | Val::Obj(_) => {}
            _ => return,
        }
        for prop in &self.props {
            if prop.is_allocated() && (prop.key == v || prop.val == v) {
                return;
            }
        }
        for slot in self.data.iter() {
            if *slot == v {
                return;
            }
        }
        for slot in self.scopes.iter() {
            if *slot == v {
                return;
            }
        }
        trace!("abandon {:?}", v);
        match v {
            Val::Obj(oi) => {
                let mut pi = self.objs[oi as usize].props;
                self.objs[oi as usize] = Obj::free();
                while pi != INVALID_INDEX {
                    let prop = self.props[pi as usize];
                    self.props[pi as usize] = Prop::free();
                    debug_assert!(matches!(prop.key, Val::Str(_)));
                    self.abandon_pair(prop.key, prop.val);
                    pi = prop.next;
                }
            }
            Val::Str(ind) => self.remove_str(ind),
            _ => {}
        }
    }

    /// Abandons two values held outside the stacks. Strings go first,
    /// higher offsets first, so neither reclamation moves the other
    /// before it is looked at.
    pub(crate) fn abandon_pair(&mut self, a: Val, b: Val) {
        if a == b {
            self.abandon(a);
            return;
        }
        let (first, second) = match (a, b) {
            (Val::Str(x), Val::Str(y)) if x < y => (b, a),
            (_, Val::Str(_)) if !matches!(a, Val::Str(_)) => (b, a),
            _ => (a, b),
        };
        self.abandon(first);
        self.abandon(second);
    }

    /// Cuts a dead string out of the buffer and patches every stored
    /// offset above the hole: property keys and values, and live
    /// operand stack slots. Function values are offsets too.
    fn remove_str(&mut self, ind: Ind) {
        let removed = self.strings.remove(ind) as Ind;
        trace!("remove_str {} (-{} bytes)", ind, removed);
        for prop in self.props.iter_mut() {
            if !prop.is_allocated() {
                continue;
            }
            patch(&mut prop.key, ind, removed);
            patch(&mut prop.val, ind, removed);
        }
        for slot in self.data.iter_mut() {
            patch(slot, ind, removed);
        }
    }
}

fn patch(v: &mut Val, hole: Ind, shift: Ind) {
    if let Val::Str(i) | Val::Func(i) = v {
        if *i > hole {
            *i -= shift;
        }
    }
}

fn format_num(n: f32) -> String {
    if n.is_finite() && n == (n as i64) as f32 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_vm_has_global_scope() {
        let vm = Vm::new();
        let stats = vm.stats();
        assert_eq!(stats.objs, 1);
        assert_eq!(stats.scopes, 1);
        assert_eq!(stats.props, 0);
        assert_eq!(stats.str_bytes, 0);
    }

    #[test]
    fn test_set_and_get_global() {
        let mut vm = Vm::new();
        vm.set_global("answer", Val::Num(42.0)).unwrap();
        assert_eq!(vm.get_global("answer"), Some(Val::Num(42.0)));
        assert_eq!(vm.get_global("missing"), None);
        // overwriting reclaims the duplicate key string
        let used = vm.stats().str_bytes;
        vm.set_global("answer", Val::Num(1.0)).unwrap();
        assert_eq!(vm.stats().str_bytes, used);
        assert_eq!(vm.get_global("answer"), Some(Val::Num(1.0)));
    }

    #[test]
    fn test_abandon_keeps_referenced_strings() {
        let mut vm = Vm::new();
        let v = vm.mk_str(b"keep").unwrap();
        vm.set_global("s", v).unwrap();
        vm.abandon(v);
        assert_eq!(vm.get_str(vm.get_global("s").unwrap()), Some("keep"));
    }

    #[test]
    fn test_abandon_relocates_and_patches() {
        let mut vm = Vm::new();
        let a = vm.mk_str(b"aaaa").unwrap();
        let b = vm.mk_str(b"bbbb").unwrap();
        vm.set_global("b", b).unwrap();
        let before = vm.stats().str_bytes;
        vm.abandon(a);
        // a is gone, b moved down, and the stored value still reads right
        assert_eq!(vm.stats().str_bytes, before - 6);
        assert_eq!(vm.get_str(vm.get_global("b").unwrap()), Some("bbbb"));
    }

    #[test]
    fn test_abandon_object_frees_properties() {
        let mut vm = Vm::new();
        let obj = vm.mk_obj(0).unwrap();
        let key = vm.mk_str(b"k").unwrap();
        let val = vm.mk_str(b"v").unwrap();
        vm.set_prop(obj, key, val).unwrap();
        assert_eq!(vm.stats().props, 1);
        vm.abandon(obj);
        let stats = vm.stats();
        assert_eq!(stats.objs, 1);
        assert_eq!(stats.props, 0);
        assert_eq!(stats.str_bytes, 0);
    }

    #[test]
    fn test_object_pool_exhaustion() {
        let mut vm = Vm::new();
        let mut last = Ok(Val::Undefined);
        for _ in 0..limits::OBJ_POOL_SIZE {
            last = vm.mk_obj(0);
        }
        assert!(last.is_err());
        assert_eq!(
            last.unwrap_err().code(),
            crate::lang::ErrorCode::OutOfMemory
        );
    }

    #[test]
    fn test_stringify_numbers() {
        let vm = Vm::new();
        assert_eq!(vm.stringify(Val::Num(7.0)), "7");
        assert_eq!(vm.stringify(Val::Num(-3.0)), "-3");
        assert_eq!(vm.stringify(Val::Num(1.25)), "1.25");
        assert_eq!(vm.stringify(Val::Undefined), "undefined");
        assert_eq!(vm.stringify(Val::True), "true");
    }

    #[test]
    fn test_stringify_object_lists_keys() {
        let mut vm = Vm::new();
        let obj = vm.mk_obj(0).unwrap();
        let k1 = vm.mk_str(b"a").unwrap();
        let k2 = vm.mk_str(b"b").unwrap();
        vm.set_prop(obj, k1, Val::Num(1.0)).unwrap();
        vm.set_prop(obj, k2, Val::Num(2.0)).unwrap();
        // newest property first, matching the chain order
        assert_eq!(vm.stringify(obj), "obj(b,a)");
    }

    #[test]
    fn test_is_true() {
        let mut vm = Vm::new();
        assert!(vm.is_true(Val::True));
        assert!(!vm.is_true(Val::False));
        assert!(!vm.is_true(Val::Undefined));
        assert!(!vm.is_true(Val::Null));
        assert!(vm.is_true(Val::Num(0.5)));
        assert!(!vm.is_true(Val::Num(0.0)));
        let empty = vm.mk_str(b"").unwrap();
        let full = vm.mk_str(b"x").unwrap();
        assert!(!vm.is_true(empty));
        assert!(vm.is_true(full));
    }
}
