pub struct Error {
    code: ErrorCode,
    line: Option<u32>,
    message: String,
}

#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($err:ident) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
    };
    ($err:ident, $line:expr) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).at_line($line)
    };
    ($err:ident; $($arg:tt)*) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err).message(format!($($arg)*))
    };
    ($err:ident, $line:expr; $($arg:tt)*) => {
        $crate::lang::Error::new($crate::lang::ErrorCode::$err)
            .at_line($line)
            .message(format!($($arg)*))
    };
}

impl Error {
    pub fn new(code: ErrorCode) -> Error {
        Error {
            code,
            line: None,
            message: String::new(),
        }
    }

    pub fn at_line(self, line: u32) -> Error {
        debug_assert!(self.line.is_none());
        Error {
            code: self.code,
            line: Some(line),
            message: self.message,
        }
    }

    pub fn message(self, message: String) -> Error {
        debug_assert!(self.message.is_empty());
        Error {
            code: self.code,
            line: self.line,
            message,
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn text(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SyntaxError,
    TypeMismatch,
    UndefinedVariable,
    AlreadyDeclared,
    StackOverflow,
    StackUnderflow,
    OutOfMemory,
    NotCallable,
    BadSignature,
    FfiCall,
    NotImplemented,
    InternalError,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Error {{ {} }}", self.to_string())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let code_str = match self.code {
            ErrorCode::SyntaxError => "syntax error",
            ErrorCode::TypeMismatch => "type mismatch",
            ErrorCode::UndefinedVariable => "undefined variable",
            ErrorCode::AlreadyDeclared => "already declared",
            ErrorCode::StackOverflow => "stack overflow",
            ErrorCode::StackUnderflow => "stack underflow",
            ErrorCode::OutOfMemory => "out of memory",
            ErrorCode::NotCallable => "not callable",
            ErrorCode::BadSignature => "bad ffi signature",
            ErrorCode::FfiCall => "ffi call error",
            ErrorCode::NotImplemented => "not implemented",
            ErrorCode::InternalError => "internal error",
        };
        if !self.message.is_empty() {
            write!(f, "{}: {}", code_str, self.message)?;
        } else {
            write!(f, "{}", code_str)?;
        }
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = error!(SyntaxError; "expecting ')'").at_line(3);
        assert_eq!(error.to_string(), "syntax error: expecting ')' (line 3)");
        let error = error!(StackOverflow);
        assert_eq!(error.to_string(), "stack overflow");
        let error = error!(UndefinedVariable; "[{}]", "foo");
        assert_eq!(error.to_string(), "undefined variable: [foo]");
    }
}
