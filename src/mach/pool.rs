/*!
## Pool Module

Slot types for the object, property and native-function pools, plus
the compacting string buffer. Allocation policy (linear scans, index
reuse) lives with the [`Vm`](super::Vm); this module owns the slot
layout and the string framing.

*/

use super::ffi::NativeFn;
use super::limits;
use super::{Ind, Val, INVALID_INDEX};
use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

pub const OBJ_ALLOCATED: u8 = 1 << 0;
/// Set on scope objects created for a function call.
pub const OBJ_CALL_SCOPE: u8 = 1 << 1;
pub const PROP_ALLOCATED: u8 = 1 << 0;

/// Object pool slot: allocation flags and the head of its property
/// chain.
#[derive(Debug, Clone, Copy)]
pub struct Obj {
    pub flags: u8,
    pub props: Ind,
}

impl Obj {
    pub fn free() -> Obj {
        Obj {
            flags: 0,
            props: INVALID_INDEX,
        }
    }
    pub fn is_allocated(&self) -> bool {
        self.flags & OBJ_ALLOCATED != 0
    }
}

/// Property pool slot: a key/value pair and the index of the next
/// property of the same object. Keys are always string values.
#[derive(Debug, Clone, Copy)]
pub struct Prop {
    pub flags: u8,
    pub key: Val,
    pub val: Val,
    pub next: Ind,
}

impl Prop {
    pub fn free() -> Prop {
        Prop {
            flags: 0,
            key: Val::Undefined,
            val: Val::Undefined,
            next: INVALID_INDEX,
        }
    }
    pub fn is_allocated(&self) -> bool {
        self.flags & PROP_ALLOCATED != 0
    }
}

/// Native function descriptor: the Rust function and its declared
/// signature.
#[derive(Clone)]
pub struct NativeDesc {
    pub func: NativeFn,
    pub sig: String,
}

impl std::fmt::Debug for NativeDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeDesc({:?})", self.sig)
    }
}

/// ## Compacting string buffer
///
/// Every string value is an offset into this buffer. The framing is a
/// single length byte, the string bytes, and a trailing zero byte, so
/// a string costs its length plus two. Strings append at the tail;
/// removing one shifts everything above it down, and the caller is
/// responsible for patching offsets held elsewhere.
pub struct StrPool {
    capacity: usize,
    buf: Vec<u8>,
}

impl std::fmt::Debug for StrPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StrPool({}/{})", self.buf.len(), self.capacity)
    }
}

impl StrPool {
    pub fn new(capacity: usize) -> StrPool {
        StrPool {
            capacity,
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes currently occupied, framing included.
    pub fn used(&self) -> usize {
        self.buf.len()
    }

    pub fn length(&self, ind: Ind) -> usize {
        self.buf[ind as usize] as usize
    }

    /// Occupied size of one string: length byte, bytes, zero byte.
    pub fn size_at(&self, ind: Ind) -> usize {
        self.length(ind) + 2
    }

    pub fn bytes(&self, ind: Ind) -> &[u8] {
        let start = ind as usize + 1;
        &self.buf[start..start + self.length(ind)]
    }

    fn check_fit(&self, len: usize) -> Result<()> {
        if len > limits::STR_MAX_LEN {
            return Err(error!(OutOfMemory; "string too long"));
        }
        if self.buf.len() + len + 2 > self.capacity {
            return Err(error!(OutOfMemory; "string pool full"));
        }
        Ok(())
    }

    /// Appends a new string at the tail, returning its offset.
    pub fn append(&mut self, bytes: &[u8]) -> Result<Ind> {
        self.check_fit(bytes.len())?;
        let ind = self.buf.len() as Ind;
        self.buf.push(bytes.len() as u8);
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
        Ok(ind)
    }

    /// Appends the concatenation of two stored strings.
    pub fn append_pair(&mut self, a: Ind, b: Ind) -> Result<Ind> {
        let (na, nb) = (self.length(a), self.length(b));
        self.check_fit(na + nb)?;
        let ind = self.buf.len() as Ind;
        self.buf.push((na + nb) as u8);
        let start = a as usize + 1;
        self.buf.extend_from_within(start..start + na);
        let start = b as usize + 1;
        self.buf.extend_from_within(start..start + nb);
        self.buf.push(0);
        Ok(ind)
    }

    /// Removes a string, shifting every byte above it down. Returns
    /// the removed size so the caller can patch offsets beyond `ind`.
    pub fn remove(&mut self, ind: Ind) -> usize {
        let size = self.size_at(ind);
        let start = ind as usize;
        self.buf.drain(start..start + size);
        size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_append_and_read() {
        let mut pool = StrPool::new(64);
        let a = pool.append(b"hello").unwrap();
        let b = pool.append(b"").unwrap();
        assert_eq!(pool.bytes(a), b"hello");
        assert_eq!(pool.bytes(b), b"");
        assert_eq!(pool.size_at(a), 7);
        assert_eq!(pool.size_at(b), 2);
        assert_eq!(pool.used(), 9);
    }

    #[test]
    fn test_remove_middle_shifts_tail() {
        let mut pool = StrPool::new(64);
        let a = pool.append(b"aa").unwrap();
        let b = pool.append(b"bbb").unwrap();
        let c = pool.append(b"cc").unwrap();
        let removed = pool.remove(b);
        assert_eq!(removed, 5);
        assert_eq!(pool.bytes(a), b"aa");
        // c moved down by the removed size
        assert_eq!(pool.bytes(c - removed as Ind), b"cc");
        assert_eq!(pool.used(), 8);
    }

    #[test]
    fn test_remove_tail_shrinks() {
        let mut pool = StrPool::new(64);
        let a = pool.append(b"aa").unwrap();
        let b = pool.append(b"bb").unwrap();
        pool.remove(b);
        assert_eq!(pool.used(), 4);
        assert_eq!(pool.bytes(a), b"aa");
    }

    #[test]
    fn test_concat() {
        let mut pool = StrPool::new(64);
        let a = pool.append(b"foo").unwrap();
        let b = pool.append(b"bar").unwrap();
        let c = pool.append_pair(a, b).unwrap();
        assert_eq!(pool.bytes(c), b"foobar");
    }

    #[test]
    fn test_capacity_errors() {
        let mut pool = StrPool::new(8);
        let err = pool.append(&[b'x'; 300]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::OutOfMemory);
        assert!(err.to_string().contains("too long"));
        pool.append(b"abcd").unwrap();
        let err = pool.append(b"efgh").unwrap_err();
        assert!(err.to_string().contains("pool full"));
    }

    #[test]
    fn test_prop_slot_defaults() {
        let prop = Prop::free();
        assert!(!prop.is_allocated());
        assert_eq!(prop.next, INVALID_INDEX);
        let obj = Obj::free();
        assert!(!obj.is_allocated());
        assert_eq!(obj.props, INVALID_INDEX);
    }
}
