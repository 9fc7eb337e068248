use crate::error;
use crate::lang::Error;

type Result<T> = std::result::Result<T, Error>;

/// ## Fixed-capacity stack
///
/// Both the operand stack and the scope stack are one of these. The
/// capacity is set at construction and never grows; overflow reports
/// the configured message so each stack fails with its own diagnostic.

pub struct Stack<T> {
    capacity: usize,
    overflow_message: &'static str,
    vec: Vec<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.vec)
    }
}

impl<T> Stack<T> {
    pub fn new(capacity: usize, overflow_message: &'static str) -> Stack<T> {
        Stack {
            capacity,
            overflow_message,
            vec: Vec::with_capacity(capacity),
        }
    }
    fn underflow_error(&self) -> Error {
        error!(StackUnderflow; "{}", self.overflow_message)
    }
    pub fn len(&self) -> usize {
        self.vec.len()
    }
    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
    pub fn last(&self) -> Option<&T> {
        self.vec.last()
    }
    pub fn get(&self, index: usize) -> Option<&T> {
        self.vec.get(index)
    }
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.vec.get_mut(index)
    }
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.vec.iter()
    }
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.vec.iter_mut()
    }
    pub fn push(&mut self, val: T) -> Result<()> {
        if self.vec.len() >= self.capacity {
            return Err(error!(StackOverflow; "{}", self.overflow_message));
        }
        self.vec.push(val);
        Ok(())
    }
    pub fn pop(&mut self) -> Result<T> {
        match self.vec.pop() {
            Some(v) => Ok(v),
            None => Err(self.underflow_error()),
        }
    }
    pub fn pop_2(&mut self) -> Result<(T, T)> {
        let two = self.pop()?;
        let one = self.pop()?;
        Ok((one, two))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    #[test]
    fn test_push_pop() {
        let mut stack: Stack<i32> = Stack::new(4, "test stack");
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.last(), Some(&2));
        let (a, b) = stack.pop_2().unwrap();
        assert_eq!((a, b), (1, 2));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_overflow() {
        let mut stack: Stack<i32> = Stack::new(2, "tiny stack");
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        let err = stack.push(3).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StackOverflow);
        assert!(err.to_string().contains("tiny stack"));
    }

    #[test]
    fn test_underflow() {
        let mut stack: Stack<i32> = Stack::new(2, "tiny stack");
        let err = stack.pop().unwrap_err();
        assert_eq!(err.code(), ErrorCode::StackUnderflow);
    }
}
