/// A lexical token. Numbers, strings, and identifiers carry their
/// decoded payload on the `Lexer` so the token itself stays `Copy`.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Token {
    Eof,
    Unknown,
    Num,
    StrLit,
    Ident,
    Word(Word),
    Op(Op),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Question,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Token::*;
        match self {
            Eof => write!(f, "end of input"),
            Unknown => write!(f, "unknown token"),
            Num => write!(f, "number"),
            StrLit => write!(f, "string"),
            Ident => write!(f, "identifier"),
            Word(w) => write!(f, "{}", w),
            Op(o) => write!(f, "{}", o),
            LParen => write!(f, "("),
            RParen => write!(f, ")"),
            LBrace => write!(f, "{{"),
            RBrace => write!(f, "}}"),
            LBracket => write!(f, "["),
            RBracket => write!(f, "]"),
            Comma => write!(f, ","),
            Dot => write!(f, "."),
            Colon => write!(f, ":"),
            Semicolon => write!(f, ";"),
            Question => write!(f, "?"),
        }
    }
}

/// Reserved words. The whole JavaScript set is reserved even though
/// only a few are implemented; the rest report "not implemented"
/// instead of being usable as identifiers.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Word {
    Break,
    Case,
    Catch,
    Class,
    Const,
    Continue,
    Default,
    Delete,
    Do,
    Else,
    False,
    Finally,
    For,
    Function,
    If,
    In,
    Instanceof,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Let,
    Undefined,
}

impl Word {
    pub fn from_str(s: &str) -> Option<Word> {
        use Word::*;
        let word = match s {
            "break" => Break,
            "case" => Case,
            "catch" => Catch,
            "class" => Class,
            "const" => Const,
            "continue" => Continue,
            "default" => Default,
            "delete" => Delete,
            "do" => Do,
            "else" => Else,
            "false" => False,
            "finally" => Finally,
            "for" => For,
            "function" => Function,
            "if" => If,
            "in" => In,
            "instanceof" => Instanceof,
            "new" => New,
            "null" => Null,
            "return" => Return,
            "switch" => Switch,
            "this" => This,
            "throw" => Throw,
            "true" => True,
            "try" => Try,
            "typeof" => Typeof,
            "var" => Var,
            "void" => Void,
            "while" => While,
            "with" => With,
            "let" => Let,
            "undefined" => Undefined,
            _ => return None,
        };
        Some(word)
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Word::*;
        let s = match self {
            Break => "break",
            Case => "case",
            Catch => "catch",
            Class => "class",
            Const => "const",
            Continue => "continue",
            Default => "default",
            Delete => "delete",
            Do => "do",
            Else => "else",
            False => "false",
            Finally => "finally",
            For => "for",
            Function => "function",
            If => "if",
            In => "in",
            Instanceof => "instanceof",
            New => "new",
            Null => "null",
            Return => "return",
            Switch => "switch",
            This => "this",
            Throw => "throw",
            True => "true",
            Try => "try",
            Typeof => "typeof",
            Var => "var",
            Void => "void",
            While => "while",
            With => "with",
            Let => "let",
            Undefined => "undefined",
        };
        write!(f, "{}", s)
    }
}

/// Operators. The last five variants are synthesized by the evaluator
/// to distinguish unary and postfix forms; the lexer never emits them.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Op {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
    AndAssign,
    XorAssign,
    OrAssign,
    LogOr,
    LogAnd,
    Or,
    Xor,
    And,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Ushr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Not,
    BitNot,
    Inc,
    Dec,
    Typeof,
    UnaryMinus,
    UnaryPlus,
    PostInc,
    PostDec,
}

impl Op {
    pub fn is_assign(&self) -> bool {
        use Op::*;
        match self {
            Assign | AddAssign | SubAssign | MulAssign | DivAssign | RemAssign | ShlAssign
            | ShrAssign | UshrAssign | AndAssign | XorAssign | OrAssign => true,
            _ => false,
        }
    }

    pub fn is_postfix(&self) -> bool {
        match self {
            Op::Inc | Op::Dec => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use Op::*;
        let s = match self {
            Assign => "=",
            AddAssign => "+=",
            SubAssign => "-=",
            MulAssign => "*=",
            DivAssign => "/=",
            RemAssign => "%=",
            ShlAssign => "<<=",
            ShrAssign => ">>=",
            UshrAssign => ">>>=",
            AndAssign => "&=",
            XorAssign => "^=",
            OrAssign => "|=",
            LogOr => "||",
            LogAnd => "&&",
            Or => "|",
            Xor => "^",
            And => "&",
            Eq => "==",
            Ne => "!=",
            StrictEq => "===",
            StrictNe => "!==",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            Shl => "<<",
            Shr => ">>",
            Ushr => ">>>",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Rem => "%",
            Not => "!",
            BitNot => "~",
            Inc => "++",
            Dec => "--",
            Typeof => "typeof",
            UnaryMinus => "-",
            UnaryPlus => "+",
            PostInc => "++",
            PostDec => "--",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(Word::from_str("while"), Some(Word::While));
        assert_eq!(Word::from_str("typeof"), Some(Word::Typeof));
        assert_eq!(Word::from_str("pickles"), None);
        assert_eq!(Word::from_str("While"), None);
    }

    #[test]
    fn test_assign_set() {
        assert!(Op::UshrAssign.is_assign());
        assert!(Op::Assign.is_assign());
        assert!(!Op::StrictEq.is_assign());
        assert!(!Op::Shr.is_assign());
    }
}
