use super::Ind;

/// A script value. One tag plus at most a pool index or the number
/// itself, so values copy freely and the pools stay the single owner
/// of all heap data. `Ref` is internal to the evaluator: it addresses
/// a property slot for assignment and never escapes an expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Val {
    Undefined,
    Null,
    True,
    False,
    Num(f32),
    Str(Ind),
    Func(Ind),
    Obj(Ind),
    Native(Ind),
    Err,
    Ref(Ind),
}

/// Value classification, one tag per `Val` variant. `Arr` is reserved;
/// nothing constructs it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Undefined,
    Null,
    Bool,
    Num,
    Str,
    Obj,
    Arr,
    Func,
    Native,
    Err,
    Ref,
}

impl Val {
    pub fn from_bool(b: bool) -> Val {
        if b {
            Val::True
        } else {
            Val::False
        }
    }

    pub fn classify(&self) -> Type {
        match self {
            Val::Undefined => Type::Undefined,
            Val::Null => Type::Null,
            Val::True | Val::False => Type::Bool,
            Val::Num(_) => Type::Num,
            Val::Str(_) => Type::Str,
            Val::Func(_) => Type::Func,
            Val::Obj(_) => Type::Obj,
            Val::Native(_) => Type::Native,
            Val::Err => Type::Err,
            Val::Ref(_) => Type::Ref,
        }
    }

    pub fn as_num(&self) -> Option<f32> {
        match self {
            Val::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Name the `typeof` operator yields for this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Null => "null",
            Val::True | Val::False => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Func(_) => "function",
            Val::Obj(_) => "object",
            Val::Native(_) => "cfunc",
            Val::Err => "error",
            Val::Ref(_) => "reference",
        }
    }
}
