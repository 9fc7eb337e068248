/*!
## Eval Module

Single-pass evaluator. There is no syntax tree and no bytecode: each
expression production executes as it is recognized, leaving its value
on the operand stack. Constructs that must be scanned without running
(untaken branches, function bodies at definition, the dry pass of a
call) raise the `noexec` counter, under which every production keeps
parsing but touches neither the stacks nor the pools.

Loops re-run their condition and body by restoring a saved copy of the
lexer. Function values are source spans; a call re-enters the evaluator
over a copy of the span with a fresh scope holding the bound arguments.
*/

use super::ffi;
use super::limits;
use super::pool::OBJ_CALL_SCOPE;
use super::val::Val;
use super::vm::Vm;
use super::Ind;
use crate::error;
use crate::lang::{unescape, Error, Lexer, Op, Token, Word};
use log::trace;

type Result<T> = std::result::Result<T, Error>;

/// Expression levels receive the operator still pending on their left,
/// applied after the first operand parses. Threading it this way makes
/// binary chains associate left without a tree.
type ParseFn<'a, 'v> = fn(&mut Parser<'a, 'v>, Option<Op>) -> Result<()>;

const ASSIGN_OPS: [Op; 12] = [
    Op::Assign,
    Op::AddAssign,
    Op::SubAssign,
    Op::MulAssign,
    Op::DivAssign,
    Op::RemAssign,
    Op::ShlAssign,
    Op::ShrAssign,
    Op::UshrAssign,
    Op::AndAssign,
    Op::XorAssign,
    Op::OrAssign,
];
const LOGICAL_OR_OPS: [Op; 1] = [Op::LogOr];
const LOGICAL_AND_OPS: [Op; 1] = [Op::LogAnd];
const BITWISE_OR_OPS: [Op; 1] = [Op::Or];
const BITWISE_XOR_OPS: [Op; 1] = [Op::Xor];
const BITWISE_AND_OPS: [Op; 1] = [Op::And];
const EQUALITY_OPS: [Op; 4] = [Op::Eq, Op::Ne, Op::StrictEq, Op::StrictNe];
const COMPARISON_OPS: [Op; 4] = [Op::Lt, Op::Le, Op::Gt, Op::Ge];
const SHIFT_OPS: [Op; 3] = [Op::Shl, Op::Shr, Op::Ushr];
const ADDITIVE_OPS: [Op; 2] = [Op::Add, Op::Sub];
const MULTIPLICATIVE_OPS: [Op; 3] = [Op::Mul, Op::Div, Op::Rem];

/// Evaluates a source buffer as a statement list, leaving the value of
/// the last statement on the operand stack and returning it.
pub(crate) fn run(vm: &mut Vm, src: &str) -> Result<Val> {
    let mut p = Parser::new(vm, src);
    p.parse_statement_list(Token::Eof)?;
    p.vm.top()
}

/// Re-enters the evaluator for a callback: parses `args_src` as a
/// comma-separated argument list, then applies the stored function.
pub(crate) fn run_call(vm: &mut Vm, body: &str, args_src: &str, depth: u32) -> Result<Val> {
    let base = vm.depth();
    {
        let mut p = Parser::new(vm, args_src);
        p.depth = depth;
        p.lex.advance();
        while p.lex.tok() != Token::Eof {
            p.parse_expr()?;
            if p.lex.tok() == Token::Comma {
                p.lex.advance();
            }
        }
    }
    let nargs = vm.depth() - base;
    exec_function(vm, body, nargs, depth)
}

/// Applies a function source span to the top `nargs` operand stack
/// slots. A call scope is created and each declared parameter bound
/// positionally; missing arguments bind as `undefined`, extra ones are
/// reclaimed. The body runs over a copy of the span, so string pool
/// compaction while it executes cannot move the text under the lexer.
/// Returns the body's resulting value, popped but not yet re-pushed;
/// callers must root it promptly.
fn exec_function(vm: &mut Vm, body: &str, nargs: usize, depth: u32) -> Result<Val> {
    trace!("call at depth {} with {} args", depth, nargs);
    let entry_scopes = vm.scopes.len();
    let scope = vm.create_scope(OBJ_CALL_SCOPE)?;

    let mut lex = Lexer::new(body);
    lex.advance(); // `function`
    lex.advance();
    if lex.tok() == Token::Ident {
        // a name on a function literal binds nothing
        lex.advance();
    }
    debug_assert_eq!(lex.tok(), Token::LParen);
    lex.advance();
    let mut argi = 0;
    while lex.tok() == Token::Ident {
        let key = vm.mk_str(lex.text().as_bytes())?;
        // read the slot each time: binding may compact the pool
        let val = if argi < nargs {
            vm.peek(nargs - 1 - argi)?
        } else {
            Val::Undefined
        };
        vm.set_prop(scope, key, val)?;
        argi += 1;
        lex.advance();
        if lex.tok() == Token::Comma {
            lex.advance();
        }
    }
    while lex.tok() != Token::LBrace && lex.tok() != Token::Eof {
        lex.advance();
    }

    // arguments are rooted in the call scope now
    for _ in 0..nargs {
        vm.drop_top()?;
    }

    {
        let mut p = Parser {
            lex,
            vm,
            noexec: 0,
            depth,
            returning: false,
        };
        p.parse_block(false)?;
    }

    while vm.scopes.len() > entry_scopes {
        vm.delete_scope()?;
    }
    vm.pop_raw()
}

struct Parser<'a, 'v> {
    lex: Lexer<'a>,
    vm: &'v mut Vm,
    /// Dry-run counter. Non-zero while scanning code that must not
    /// execute; productions keep consuming tokens but skip all stack
    /// and pool effects.
    noexec: u32,
    /// Recursion guard, counting expression nesting and calls.
    depth: u32,
    /// Set by an executed `return`; every enclosing statement list in
    /// this activation stops consuming, leaving the value on top.
    returning: bool,
}

impl<'a, 'v> Parser<'a, 'v> {
    fn new(vm: &'v mut Vm, src: &'a str) -> Parser<'a, 'v> {
        Parser {
            lex: Lexer::new(src),
            vm,
            noexec: 0,
            depth: 0,
            returning: false,
        }
    }

    fn exec(&self) -> bool {
        self.noexec == 0
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= limits::MAX_NEST_DEPTH {
            return Err(error!(StackOverflow, self.lex.line(); "expression too deeply nested"));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn expect(&self, t: Token) -> Result<()> {
        if self.lex.tok() != t {
            return Err(
                error!(SyntaxError, self.lex.line(); "expecting {} near [{}]", t, self.lex.text()),
            );
        }
        Ok(())
    }

    /// Peeks one token ahead without disturbing the current position.
    fn lookahead(&mut self) -> Token {
        let saved = self.lex;
        self.lex.advance();
        let tok = self.lex.tok();
        self.lex = saved;
        tok
    }

    // ----- statements -----

    /// Parses statements until `end` or end of input. Each statement's
    /// value replaces the previous one; an empty list yields
    /// `undefined`. The base is recorded on entry so a list never
    /// drops values it does not own.
    fn parse_statement_list(&mut self, end: Token) -> Result<()> {
        let base = self.vm.depth();
        self.lex.advance();
        while !self.returning && self.lex.tok() != Token::Eof && self.lex.tok() != end {
            if self.exec() && self.vm.depth() > base {
                self.vm.drop_top()?;
            }
            self.parse_statement()?;
            while self.lex.tok() == Token::Semicolon {
                self.lex.advance();
            }
        }
        if self.exec() && self.vm.depth() == base {
            self.vm.push(Val::Undefined)?;
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<()> {
        match self.lex.tok() {
            Token::Semicolon => Ok(()),
            Token::LBrace => {
                self.parse_block(true)?;
                if !self.returning {
                    self.lex.advance();
                }
                Ok(())
            }
            Token::Word(Word::Let) => self.parse_let(),
            Token::Word(Word::Return) => self.parse_return(),
            Token::Word(Word::While) => self.parse_while(),
            Token::Word(Word::If) => self.parse_if(),
            Token::Word(w) if is_unimplemented(w) => {
                Err(error!(NotImplemented, self.lex.line(); "[{}]", w))
            }
            _ => {
                self.parse_expr()?;
                while self.lex.tok() == Token::Comma {
                    self.lex.advance();
                    if self.exec() {
                        self.vm.drop_top()?;
                    }
                    self.parse_expr()?;
                }
                Ok(())
            }
        }
    }

    /// A braced statement list. `mkscope` opens a fresh scope so `let`
    /// bindings die with the block; function bodies pass false and
    /// share the call scope with their parameters.
    fn parse_block(&mut self, mkscope: bool) -> Result<()> {
        let scoped = mkscope && self.exec();
        if scoped {
            self.vm.create_scope(0)?;
        }
        self.parse_statement_list(Token::RBrace)?;
        if !self.returning {
            self.expect(Token::RBrace)?;
        }
        if scoped {
            self.vm.delete_scope()?;
        }
        Ok(())
    }

    fn parse_block_or_stmt(&mut self, mkscope: bool) -> Result<()> {
        if self.lex.tok() == Token::LBrace {
            self.parse_block(mkscope)?;
            if !self.returning {
                self.lex.advance();
            }
            Ok(())
        } else {
            self.parse_statement()
        }
    }

    fn parse_let(&mut self) -> Result<()> {
        self.lex.advance();
        loop {
            self.expect(Token::Ident)?;
            let name = self.lex.text();
            if self.exec() {
                let scope = self.vm.current_scope();
                if self.vm.find_prop(scope, name.as_bytes()).is_some() {
                    return Err(error!(AlreadyDeclared, self.lex.line(); "[{}]", name));
                }
            }
            self.lex.advance();
            if self.lex.tok() == Token::Op(Op::Assign) {
                self.lex.advance();
                self.parse_expr()?;
            } else if self.exec() {
                self.vm.push(Val::Undefined)?;
            }
            if self.exec() {
                let val = self.vm.top()?;
                let key = self.vm.mk_str(name.as_bytes())?;
                let scope = self.vm.current_scope();
                self.vm.set_prop(scope, key, val)?;
            }
            // the bound value stays as the statement value
            if self.lex.tok() != Token::Comma {
                break;
            }
            if self.exec() {
                self.vm.drop_top()?;
            }
            self.lex.advance();
        }
        Ok(())
    }

    fn parse_return(&mut self) -> Result<()> {
        self.lex.advance();
        let bare = matches!(
            self.lex.tok(),
            Token::Semicolon | Token::RBrace | Token::Eof
        );
        if bare {
            if self.exec() {
                self.vm.push(Val::Undefined)?;
            }
        } else {
            self.parse_expr()?;
        }
        if self.exec() {
            self.returning = true;
        }
        Ok(())
    }

    /// The condition is re-parsed before every pass by rewinding to a
    /// saved lexer. Once it turns falsy the body is scanned one last
    /// time under `noexec`, and the condition's value is left as the
    /// statement value.
    fn parse_while(&mut self) -> Result<()> {
        self.lex.advance();
        self.expect(Token::LParen)?;
        self.lex.advance();
        let cond = self.lex;
        let entry_noexec = self.noexec;
        loop {
            self.lex = cond;
            self.noexec = entry_noexec;
            self.parse_expr()?;
            self.expect(Token::RParen)?;
            self.lex.advance();
            let looping = self.exec() && {
                let c = self.vm.top()?;
                self.vm.is_true(c)
            };
            if looping {
                self.vm.drop_top()?;
            } else if self.exec() {
                self.noexec += 1;
            }
            let body_base = self.vm.depth();
            self.parse_block_or_stmt(true)?;
            if self.returning {
                break;
            }
            if !self.exec() {
                break;
            }
            if self.vm.depth() > body_base {
                self.vm.drop_top()?;
            }
        }
        self.noexec = entry_noexec;
        Ok(())
    }

    /// The untaken branch is scanned under `noexec`. When the condition
    /// is falsy and no `else` follows, the statement's value is
    /// `undefined`.
    fn parse_if(&mut self) -> Result<()> {
        self.lex.advance();
        self.expect(Token::LParen)?;
        self.lex.advance();
        self.parse_expr()?;
        self.expect(Token::RParen)?;
        self.lex.advance();
        let entry_noexec = self.noexec;
        let mut taken = true;
        if self.exec() {
            let c = self.vm.top()?;
            taken = self.vm.is_true(c);
            self.vm.drop_top()?;
            if !taken {
                self.vm.push(Val::Undefined)?;
                self.noexec += 1;
            }
        }
        self.parse_block_or_stmt(true)?;
        self.noexec = entry_noexec;
        // `if (c) stmt; else ...` hides the else behind the statement's
        // semicolon
        if self.lex.tok() == Token::Semicolon && self.lookahead() == Token::Word(Word::Else) {
            self.lex.advance();
        }
        if self.lex.tok() == Token::Word(Word::Else) {
            self.lex.advance();
            if !self.exec() {
                self.parse_block_or_stmt(true)?;
            } else if taken {
                self.noexec += 1;
                self.parse_block_or_stmt(true)?;
                self.noexec = entry_noexec;
            } else {
                // replace the placeholder pushed for the untaken branch
                self.vm.drop_top()?;
                self.parse_block_or_stmt(true)?;
            }
        }
        Ok(())
    }

    // ----- expressions -----

    fn parse_expr(&mut self) -> Result<()> {
        self.enter()?;
        let res = self.parse_assignment(None);
        self.leave();
        res
    }

    fn parse_ltr_binop(
        &mut self,
        f1: ParseFn<'a, 'v>,
        f2: ParseFn<'a, 'v>,
        ops: &[Op],
        prev: Option<Op>,
    ) -> Result<()> {
        f1(self, None)?;
        if let Some(op) = prev {
            self.do_op(op)?;
        }
        if let Token::Op(op) = self.lex.tok() {
            if ops.contains(&op) {
                self.lex.advance();
                self.enter()?;
                let res = f2(self, Some(op));
                self.leave();
                res?;
            }
        }
        Ok(())
    }

    fn parse_rtl_binop(&mut self, f1: ParseFn<'a, 'v>, f2: ParseFn<'a, 'v>, ops: &[Op]) -> Result<()> {
        f1(self, None)?;
        if let Token::Op(op) = self.lex.tok() {
            if ops.contains(&op) {
                self.lex.advance();
                self.enter()?;
                let res = f2(self, None);
                self.leave();
                res?;
                self.do_op(op)?;
            }
        }
        Ok(())
    }

    fn parse_assignment(&mut self, _prev: Option<Op>) -> Result<()> {
        self.parse_rtl_binop(Self::parse_ternary, Self::parse_assignment, &ASSIGN_OPS)
    }

    fn parse_ternary(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_logical_or(prev)?;
        if self.lex.tok() != Token::Question {
            return Ok(());
        }
        self.lex.advance();
        if !self.exec() {
            self.parse_ternary(None)?;
            self.expect(Token::Colon)?;
            self.lex.advance();
            return self.parse_ternary(None);
        }
        let c = self.vm.top()?;
        let truthy = self.vm.is_true(c);
        self.vm.drop_top()?;
        if truthy {
            self.parse_ternary(None)?;
            self.expect(Token::Colon)?;
            self.lex.advance();
            self.noexec += 1;
            let res = self.parse_ternary(None);
            self.noexec -= 1;
            res
        } else {
            self.noexec += 1;
            let res = self.parse_ternary(None);
            self.noexec -= 1;
            res?;
            self.expect(Token::Colon)?;
            self.lex.advance();
            self.parse_ternary(None)
        }
    }

    fn parse_logical_or(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_logical_and,
            Self::parse_logical_or,
            &LOGICAL_OR_OPS,
            prev,
        )
    }

    fn parse_logical_and(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_bitwise_or,
            Self::parse_logical_and,
            &LOGICAL_AND_OPS,
            prev,
        )
    }

    fn parse_bitwise_or(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_bitwise_xor,
            Self::parse_bitwise_or,
            &BITWISE_OR_OPS,
            prev,
        )
    }

    fn parse_bitwise_xor(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_bitwise_and,
            Self::parse_bitwise_xor,
            &BITWISE_XOR_OPS,
            prev,
        )
    }

    fn parse_bitwise_and(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_equality,
            Self::parse_bitwise_and,
            &BITWISE_AND_OPS,
            prev,
        )
    }

    fn parse_equality(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_comparison,
            Self::parse_equality,
            &EQUALITY_OPS,
            prev,
        )
    }

    fn parse_comparison(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_shifts,
            Self::parse_comparison,
            &COMPARISON_OPS,
            prev,
        )
    }

    fn parse_shifts(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(Self::parse_additive, Self::parse_shifts, &SHIFT_OPS, prev)
    }

    fn parse_additive(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_multiplicative,
            Self::parse_additive,
            &ADDITIVE_OPS,
            prev,
        )
    }

    fn parse_multiplicative(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_ltr_binop(
            Self::parse_unary,
            Self::parse_multiplicative,
            &MULTIPLICATIVE_OPS,
            prev,
        )
    }

    fn parse_unary(&mut self, prev: Option<Op>) -> Result<()> {
        let op = match self.lex.tok() {
            Token::Op(Op::Not) => Some(Op::Not),
            Token::Op(Op::BitNot) => Some(Op::BitNot),
            Token::Op(Op::Inc) => Some(Op::Inc),
            Token::Op(Op::Dec) => Some(Op::Dec),
            Token::Op(Op::Sub) => Some(Op::UnaryMinus),
            Token::Op(Op::Add) => Some(Op::UnaryPlus),
            Token::Word(Word::Typeof) => Some(Op::Typeof),
            _ => None,
        };
        if op.is_some() {
            self.lex.advance();
        }
        let chained = matches!(
            self.lex.tok(),
            Token::Op(Op::Not)
                | Token::Op(Op::BitNot)
                | Token::Op(Op::Inc)
                | Token::Op(Op::Dec)
                | Token::Op(Op::Sub)
                | Token::Op(Op::Add)
                | Token::Word(Word::Typeof)
        );
        if chained {
            self.enter()?;
            let res = self.parse_unary(prev);
            self.leave();
            res?;
        } else {
            self.parse_postfix(prev)?;
        }
        if let Some(op) = op {
            self.do_op(op)?;
        }
        Ok(())
    }

    fn parse_postfix(&mut self, prev: Option<Op>) -> Result<()> {
        self.parse_call_dot_mem(prev)?;
        match self.lex.tok() {
            Token::Op(Op::Inc) => {
                self.do_op(Op::PostInc)?;
                self.lex.advance();
            }
            Token::Op(Op::Dec) => {
                self.do_op(Op::PostDec)?;
                self.lex.advance();
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_call_dot_mem(&mut self, prev: Option<Op>) -> Result<()> {
        let _ = prev;
        self.parse_literal()?;
        loop {
            match self.lex.tok() {
                Token::Dot => {
                    self.lex.advance();
                    self.expect(Token::Ident)?;
                    if self.exec() {
                        self.member_read()?;
                    }
                    self.lex.advance();
                }
                Token::LBracket => {
                    self.lex.advance();
                    self.parse_expr()?;
                    self.expect(Token::RBracket)?;
                    self.lex.advance();
                    if self.exec() {
                        self.index_read()?;
                    }
                }
                Token::LParen => self.parse_call()?,
                _ => break,
            }
        }
        Ok(())
    }

    // ----- literals -----

    fn parse_literal(&mut self) -> Result<()> {
        match self.lex.tok() {
            Token::Num => {
                if self.exec() {
                    self.vm.push(Val::Num(self.lex.num()))?;
                }
            }
            Token::StrLit => {
                if self.exec() {
                    let mut buf = Vec::new();
                    unescape(self.lex.text(), &mut buf);
                    let s = self.vm.mk_str(&buf)?;
                    self.vm.push(s)?;
                }
            }
            Token::Ident => {
                if self.exec() {
                    self.ident_value()?;
                }
            }
            Token::LBrace => self.parse_object_literal()?,
            Token::LParen => {
                self.lex.advance();
                self.parse_expr()?;
                self.expect(Token::RParen)?;
            }
            Token::Word(Word::Function) => self.parse_function()?,
            Token::Word(Word::True) => {
                if self.exec() {
                    self.vm.push(Val::True)?;
                }
            }
            Token::Word(Word::False) => {
                if self.exec() {
                    self.vm.push(Val::False)?;
                }
            }
            Token::Word(Word::Null) => {
                if self.exec() {
                    self.vm.push(Val::Null)?;
                }
            }
            Token::Word(Word::Undefined) => {
                if self.exec() {
                    self.vm.push(Val::Undefined)?;
                }
            }
            _ => {
                return Err(
                    error!(SyntaxError, self.lex.line(); "bad literal [{}]", self.lex.text()),
                );
            }
        }
        self.lex.advance();
        Ok(())
    }

    /// An identifier in value position. When the next token assigns or
    /// the previous one was a prefix increment, the variable's property
    /// reference is pushed instead of its value so the operator can
    /// write through it.
    fn ident_value(&mut self) -> Result<()> {
        let name = self.lex.text();
        let wants_ref = matches!(
            self.lookahead(),
            Token::Op(op) if op.is_assign() || op.is_postfix()
        ) || matches!(self.lex.prev(), Token::Op(Op::Inc) | Token::Op(Op::Dec));
        match self.vm.lookup(name.as_bytes()) {
            Some(pi) if wants_ref => self.vm.push(Val::Ref(pi)),
            Some(pi) => {
                let v = self.vm.prop_val(pi);
                self.vm.push(v)
            }
            None => Err(error!(UndefinedVariable, self.lex.line(); "[{}]", name)),
        }
    }

    fn parse_object_literal(&mut self) -> Result<()> {
        let obj = if self.exec() {
            let obj = self.vm.mk_obj(0)?;
            self.vm.push(obj)?;
            obj
        } else {
            Val::Undefined
        };
        self.lex.advance();
        while self.lex.tok() != Token::RBrace {
            let key_text = match self.lex.tok() {
                Token::Ident | Token::StrLit => self.lex.text(),
                _ => {
                    return Err(
                        error!(SyntaxError, self.lex.line(); "bad object key [{}]", self.lex.text()),
                    );
                }
            };
            self.lex.advance();
            self.expect(Token::Colon)?;
            self.lex.advance();
            self.parse_expr()?;
            if self.exec() {
                // the value is rooted on the stack while the key
                // allocates
                let val = self.vm.top()?;
                let mut buf = Vec::new();
                unescape(key_text, &mut buf);
                let key = self.vm.mk_str(&buf)?;
                self.vm.set_prop(obj, key, val)?;
                self.vm.drop_top()?;
            }
            if self.lex.tok() == Token::Comma {
                self.lex.advance();
            } else if self.lex.tok() != Token::RBrace {
                return Err(
                    error!(SyntaxError, self.lex.line(); "expecting , or }} in object near [{}]", self.lex.text()),
                );
            }
        }
        Ok(())
    }

    /// A function literal. The body is scanned under `noexec` and the
    /// whole span, keyword through closing brace, is stored as the
    /// function's value.
    fn parse_function(&mut self) -> Result<()> {
        let start = self.lex.tok_start();
        let live = self.exec();
        self.noexec += 1;
        self.lex.advance();
        if self.lex.tok() == Token::Ident {
            self.lex.advance();
        }
        self.expect(Token::LParen)?;
        self.lex.advance();
        while self.lex.tok() != Token::RParen {
            self.expect(Token::Ident)?;
            self.lex.advance();
            if self.lex.tok() == Token::Comma {
                self.lex.advance();
            }
        }
        self.lex.advance();
        self.expect(Token::LBrace)?;
        self.parse_block(false)?;
        self.noexec -= 1;
        if live {
            let span = &self.lex.src()[start..self.lex.tok_end()];
            let f = self.vm.mk_func(span)?;
            self.vm.push(f)?;
        }
        Ok(())
    }

    // ----- member access and calls -----

    fn member_read(&mut self) -> Result<()> {
        let obj = self.vm.top()?;
        let name = self.lex.text();
        match obj {
            Val::Str(s) if name == "length" => {
                let len = self.vm.str_bytes(s).len();
                self.vm.poke(0, Val::Num(len as f32))?;
                self.vm.abandon(obj);
                Ok(())
            }
            Val::Obj(_) => {
                let val = match self.vm.find_prop(obj, name.as_bytes()) {
                    Some(pi) => self.vm.prop_val(pi),
                    None => Val::Undefined,
                };
                self.vm.poke(0, val)?;
                self.vm.abandon(obj);
                Ok(())
            }
            _ => Err(
                error!(TypeMismatch, self.lex.line(); "cannot read [{}] of {}", name, obj.type_name()),
            ),
        }
    }

    fn index_read(&mut self) -> Result<()> {
        let idx = self.vm.top()?;
        let obj = self.vm.peek(1)?;
        let key = match idx {
            Val::Str(s) => s,
            _ => return Err(error!(TypeMismatch, self.lex.line(); "index must be a string")),
        };
        match obj {
            Val::Obj(_) => {
                let val = {
                    let name = self.vm.str_bytes(key);
                    match self.vm.find_prop(obj, name) {
                        Some(pi) => self.vm.prop_val(pi),
                        None => Val::Undefined,
                    }
                };
                self.vm.poke(1, val)?;
                self.vm.drop_top()?;
                self.vm.abandon(obj);
                Ok(())
            }
            _ => Err(error!(TypeMismatch, self.lex.line(); "indexing a {}", obj.type_name())),
        }
    }

    /// A call expression. The callee is on top of the stack; arguments
    /// parse in the caller's scope, left to right, and the result
    /// replaces the callee.
    fn parse_call(&mut self) -> Result<()> {
        self.lex.advance();
        if !self.exec() {
            while self.lex.tok() != Token::RParen && self.lex.tok() != Token::Eof {
                self.parse_expr()?;
                if self.lex.tok() == Token::Comma {
                    self.lex.advance();
                }
            }
            self.expect(Token::RParen)?;
            self.lex.advance();
            return Ok(());
        }
        let callee = self.vm.top()?;
        if !matches!(callee, Val::Func(_) | Val::Native(_)) {
            return Err(
                error!(NotCallable, self.lex.line(); "calling {} [{}]", callee.type_name(), self.vm.stringify(callee)),
            );
        }
        let base = self.vm.depth();
        while self.lex.tok() != Token::RParen && self.lex.tok() != Token::Eof {
            self.parse_expr()?;
            if self.lex.tok() == Token::Comma {
                self.lex.advance();
            }
        }
        self.expect(Token::RParen)?;
        let nargs = self.vm.depth() - base;
        if let Val::Native(ni) = callee {
            self.call_c_function(ni, nargs)?;
        } else {
            self.call_js_function(callee, nargs)?;
        }
        self.lex.advance();
        Ok(())
    }

    fn call_js_function(&mut self, func: Val, nargs: usize) -> Result<()> {
        self.enter()?;
        // the span is copied out so pool compaction during the call
        // cannot move it
        let body = self.vm.func_source(func)?.to_string();
        let res = exec_function(self.vm, &body, nargs, self.depth);
        self.leave();
        let result = res?;
        self.vm.drop_top()?; // the callee
        self.vm.push(result)
    }

    fn call_c_function(&mut self, native: Ind, nargs: usize) -> Result<()> {
        self.enter()?;
        let desc = self.vm.native(native)?;
        let res = ffi::dispatch(self.vm, &desc, nargs, self.depth);
        self.leave();
        let ret = res?;
        for _ in 0..nargs {
            self.vm.drop_top()?;
        }
        self.vm.drop_top()?; // the callee
        let v = ffi::ret_to_val(self.vm, &desc, ret)?;
        self.vm.push(v)
    }

    // ----- operators -----

    fn do_op(&mut self, op: Op) -> Result<()> {
        if !self.exec() {
            return Ok(());
        }
        trace!("do_op {:?}", op);
        match op {
            Op::Assign => self.op_assign(),
            Op::AddAssign => self.op_assign_arith(Op::Add),
            Op::SubAssign => self.op_assign_arith(Op::Sub),
            Op::MulAssign => self.op_assign_arith(Op::Mul),
            Op::DivAssign => self.op_assign_arith(Op::Div),
            Op::RemAssign => self.op_assign_arith(Op::Rem),
            Op::ShlAssign => self.op_assign_arith(Op::Shl),
            Op::ShrAssign => self.op_assign_arith(Op::Shr),
            Op::UshrAssign => self.op_assign_arith(Op::Ushr),
            Op::AndAssign => self.op_assign_arith(Op::And),
            Op::XorAssign => self.op_assign_arith(Op::Xor),
            Op::OrAssign => self.op_assign_arith(Op::Or),
            Op::LogOr | Op::LogAnd => self.op_logical(op),
            Op::Add => self.op_add(),
            Op::Sub | Op::Mul | Op::Div | Op::Rem => self.op_arith(op),
            Op::Or | Op::Xor | Op::And | Op::Shl | Op::Shr | Op::Ushr => self.op_arith(op),
            Op::Eq | Op::StrictEq => self.op_equality(false),
            Op::Ne | Op::StrictNe => self.op_equality(true),
            Op::Lt | Op::Le | Op::Gt | Op::Ge => self.op_compare(op),
            Op::Not => {
                let v = self.vm.top()?;
                let inverted = Val::from_bool(!self.vm.is_true(v));
                self.vm.poke(0, inverted)?;
                self.vm.abandon(v);
                Ok(())
            }
            Op::BitNot => {
                let n = self.num_top()?;
                self.vm.poke(0, Val::Num(!(n as i64) as f32))
            }
            Op::UnaryMinus => {
                let n = self.num_top()?;
                self.vm.poke(0, Val::Num(-n))
            }
            // unary plus is the identity, whatever the operand
            Op::UnaryPlus => Ok(()),
            Op::Typeof => {
                let v = self.vm.top()?;
                let name = self.vm.mk_str(v.type_name().as_bytes())?;
                self.vm.poke(0, name)?;
                self.vm.abandon(v);
                Ok(())
            }
            Op::Inc | Op::Dec | Op::PostInc | Op::PostDec => self.op_incdec(op),
        }
    }

    fn num_top(&self) -> Result<f32> {
        match self.vm.top()?.as_num() {
            Some(n) => Ok(n),
            None => Err(error!(TypeMismatch, self.lex.line(); "operand must be a number")),
        }
    }

    fn num_pair(&self) -> Result<(f32, f32)> {
        let b = self.vm.peek(0)?;
        let a = self.vm.peek(1)?;
        match (a.as_num(), b.as_num()) {
            (Some(x), Some(y)) => Ok((x, y)),
            _ => Err(error!(TypeMismatch, self.lex.line(); "operands must be numbers")),
        }
    }

    fn ref_of(&self, v: Val) -> Result<Ind> {
        match v {
            Val::Ref(pi) => Ok(pi),
            _ => Err(error!(TypeMismatch, self.lex.line(); "invalid assignment target")),
        }
    }

    fn op_arith(&mut self, op: Op) -> Result<()> {
        let (x, y) = self.num_pair()?;
        self.vm.poke(1, Val::Num(arith(x, y, op)))?;
        self.vm.drop_top()
    }

    /// `+` concatenates when both sides are strings, otherwise it adds.
    /// Both operands come off the stack before either is reclaimed, so
    /// compaction cannot move one while the other is still pending.
    fn op_add(&mut self) -> Result<()> {
        let b = self.vm.peek(0)?;
        let a = self.vm.peek(1)?;
        if let (Val::Str(x), Val::Str(y)) = (a, b) {
            let joined = self.vm.concat(x, y)?;
            self.vm.pop_raw()?;
            self.vm.pop_raw()?;
            self.vm.push(joined)?;
            self.vm.abandon_pair(a, b);
            return Ok(());
        }
        self.op_arith(Op::Add)
    }

    /// Equality never coerces: mismatched types compare unequal, string
    /// contents compare by bytes, objects and functions by identity.
    /// `==` and `===` are therefore the same operation.
    fn op_equality(&mut self, negate: bool) -> Result<()> {
        let b = self.vm.peek(0)?;
        let a = self.vm.peek(1)?;
        let eq = match (a, b) {
            (Val::Num(x), Val::Num(y)) => x == y,
            (Val::Str(x), Val::Str(y)) => self.vm.str_eq(x, y),
            _ => a == b,
        };
        self.vm.pop_raw()?;
        self.vm.pop_raw()?;
        self.vm.push(Val::from_bool(eq != negate))?;
        self.vm.abandon_pair(a, b);
        Ok(())
    }

    fn op_compare(&mut self, op: Op) -> Result<()> {
        let (x, y) = self.num_pair()?;
        let r = match op {
            Op::Lt => x < y,
            Op::Le => x <= y,
            Op::Gt => x > y,
            _ => x >= y,
        };
        self.vm.poke(1, Val::from_bool(r))?;
        self.vm.drop_top()
    }

    /// `&&` and `||` yield one of their operands; the other is
    /// reclaimed. Both sides are already evaluated by the time the
    /// operator applies.
    fn op_logical(&mut self, op: Op) -> Result<()> {
        let b = self.vm.peek(0)?;
        let a = self.vm.peek(1)?;
        let take_second = match op {
            Op::LogAnd => self.vm.is_true(a),
            _ => !self.vm.is_true(a),
        };
        let keep = if take_second { b } else { a };
        let lose = if take_second { a } else { b };
        self.vm.pop_raw()?;
        self.vm.pop_raw()?;
        self.vm.push(keep)?;
        self.vm.abandon(lose);
        Ok(())
    }

    fn op_assign(&mut self) -> Result<()> {
        let b = self.vm.peek(0)?;
        let target = self.vm.peek(1)?;
        let pi = self.ref_of(target)?;
        self.vm.poke(1, b)?;
        self.vm.assign_prop(pi, b);
        self.vm.drop_top()
    }

    fn op_assign_arith(&mut self, op: Op) -> Result<()> {
        let b = self.vm.peek(0)?;
        let target = self.vm.peek(1)?;
        let pi = self.ref_of(target)?;
        let old = self.vm.prop_val(pi);
        let (x, y) = match (old.as_num(), b.as_num()) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(error!(TypeMismatch, self.lex.line(); "operands must be numbers")),
        };
        let r = Val::Num(arith(x, y, op));
        self.vm.assign_prop(pi, r);
        self.vm.poke(1, r)?;
        self.vm.drop_top()
    }

    fn op_incdec(&mut self, op: Op) -> Result<()> {
        let target = self.vm.top()?;
        let pi = match target {
            Val::Ref(pi) => Ok(pi),
            _ => Err(error!(TypeMismatch, self.lex.line(); "increment needs a variable")),
        }?;
        let old = match self.vm.prop_val(pi).as_num() {
            Some(n) => n,
            None => {
                return Err(error!(TypeMismatch, self.lex.line(); "increment on a non-number"));
            }
        };
        let new = match op {
            Op::Inc | Op::PostInc => old + 1.0,
            _ => old - 1.0,
        };
        self.vm.assign_prop(pi, Val::Num(new));
        let result = match op {
            Op::PostInc | Op::PostDec => old,
            _ => new,
        };
        self.vm.poke(0, Val::Num(result))
    }
}

/// Numeric operator table. Bitwise operators work on the value
/// truncated to 64-bit integers; `>>>` is unsigned. Shift counts are
/// masked. `%` is integer remainder, yielding NaN for a zero divisor
/// like the float operators do.
fn arith(x: f32, y: f32, op: Op) -> f32 {
    match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Rem => {
            let d = y as i64;
            if d == 0 {
                f32::NAN
            } else {
                ((x as i64) % d) as f32
            }
        }
        Op::And => ((x as i64) & (y as i64)) as f32,
        Op::Or => ((x as i64) | (y as i64)) as f32,
        Op::Xor => ((x as i64) ^ (y as i64)) as f32,
        Op::Shl => ((x as i64) << ((y as i64) & 63)) as f32,
        Op::Shr => ((x as i64) >> ((y as i64) & 63)) as f32,
        Op::Ushr => (((x as i64) as u64) >> ((y as i64) as u64 & 63)) as f32,
        _ => f32::NAN,
    }
}

fn is_unimplemented(w: Word) -> bool {
    matches!(
        w,
        Word::Break
            | Word::Case
            | Word::Catch
            | Word::Class
            | Word::Const
            | Word::Continue
            | Word::Default
            | Word::Delete
            | Word::Do
            | Word::Finally
            | Word::For
            | Word::Instanceof
            | Word::New
            | Word::Switch
            | Word::Throw
            | Word::Try
            | Word::Var
            | Word::Void
            | Word::With
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::ErrorCode;

    fn num(vm: &mut Vm, src: &str) -> f32 {
        match vm.eval(src).unwrap() {
            Val::Num(n) => n,
            v => panic!("expected a number, got {:?}", v),
        }
    }

    #[test]
    fn test_precedence_and_associativity() {
        let vm = &mut Vm::new();
        assert_eq!(num(vm, "1 + 2 * 3"), 7.0);
        assert_eq!(num(vm, "(1 + 2) * 3"), 9.0);
        assert_eq!(num(vm, "8 - 4 - 2"), 2.0);
        assert_eq!(num(vm, "100 / 10 / 5"), 2.0);
        assert_eq!(num(vm, "7 % 4"), 3.0);
        assert_eq!(num(vm, "1 + 2 < 4 == true ? 10 : 20"), 10.0);
    }

    #[test]
    fn test_arith_table() {
        assert_eq!(arith(7.0, 2.0, Op::Rem), 1.0);
        assert!(arith(7.0, 0.0, Op::Rem).is_nan());
        assert_eq!(arith(6.0, 3.0, Op::And), 2.0);
        assert_eq!(arith(6.0, 3.0, Op::Or), 7.0);
        assert_eq!(arith(6.0, 3.0, Op::Xor), 5.0);
        assert_eq!(arith(1.0, 4.0, Op::Shl), 16.0);
        assert_eq!(arith(-8.0, 1.0, Op::Shr), -4.0);
        assert_eq!(arith(8.0, 1.0, Op::Ushr), 4.0);
        assert_eq!(arith(-1.0, 60.0, Op::Ushr), 15.0);
    }

    #[test]
    fn test_statement_values() {
        let vm = &mut Vm::new();
        assert_eq!(vm.eval("").unwrap(), Val::Undefined);
        assert_eq!(vm.eval(";;;").unwrap(), Val::Undefined);
        assert_eq!(vm.eval("let a = 5;").unwrap(), Val::Num(5.0));
        assert_eq!(vm.eval("1, 2, 3").unwrap(), Val::Num(3.0));
        assert_eq!(vm.eval("if (false) 1;").unwrap(), Val::Undefined);
        assert_eq!(vm.eval("if (true) 1; else 2;").unwrap(), Val::Num(1.0));
        assert_eq!(vm.eval("if (false) 1; else 2;").unwrap(), Val::Num(2.0));
        // a falsy condition's value is the while statement's value
        assert_eq!(vm.eval("while (false) 1;").unwrap(), Val::False);
    }

    #[test]
    fn test_dry_run_has_no_effects() {
        let vm = &mut Vm::new();
        vm.eval("let x = 1;").unwrap();
        let before = vm.stats();
        vm.eval("if (false) { let y = 'yyyy'; y = y + y; } 0")
            .unwrap();
        let after = vm.stats();
        assert_eq!(before.props, after.props);
        assert_eq!(before.str_bytes, after.str_bytes);
        assert_eq!(before.objs, after.objs);
    }

    #[test]
    fn test_untaken_ternary_arm() {
        let vm = &mut Vm::new();
        vm.eval("let a = 1; let b = true ? 2 : (a = 99);").unwrap();
        assert_eq!(vm.get_global("a"), Some(Val::Num(1.0)));
        assert_eq!(vm.get_global("b"), Some(Val::Num(2.0)));
        vm.eval("let c = false ? (a = 77) : 3;").unwrap();
        assert_eq!(vm.get_global("a"), Some(Val::Num(1.0)));
        assert_eq!(vm.get_global("c"), Some(Val::Num(3.0)));
    }

    #[test]
    fn test_while_loop() {
        let vm = &mut Vm::new();
        assert_eq!(
            num(vm, "let i = 0; let s = 0; while (i < 5) { s = s + i; i = i + 1; } s"),
            10.0
        );
    }

    #[test]
    fn test_return_from_nested_block() {
        let vm = &mut Vm::new();
        let src = "let f = function(n) { if (n > 1) { return 7; } return 8; }; f(2)";
        assert_eq!(num(vm, src), 7.0);
        assert_eq!(num(vm, "f(0)"), 8.0);
    }

    #[test]
    fn test_block_scope_reclaimed() {
        let vm = &mut Vm::new();
        vm.eval("0").unwrap();
        let before = vm.stats();
        vm.eval("{ let s = 'reclaim me'; s.length; } 0").unwrap();
        let after = vm.stats();
        assert_eq!(before.str_bytes, after.str_bytes);
        assert_eq!(before.props, after.props);
    }

    #[test]
    fn test_error_positions_and_codes() {
        let vm = &mut Vm::new();
        let e = vm.eval("nope").unwrap_err();
        assert_eq!(e.code(), ErrorCode::UndefinedVariable);
        let e = vm.eval("let q = 1; let q = 2;").unwrap_err();
        assert_eq!(e.code(), ErrorCode::AlreadyDeclared);
        let e = vm.eval("1 + 'x'").unwrap_err();
        assert_eq!(e.code(), ErrorCode::TypeMismatch);
        let e = vm.eval("for (;;) {}").unwrap_err();
        assert_eq!(e.code(), ErrorCode::NotImplemented);
        let e = vm.eval("\n\n1 +").unwrap_err();
        assert_eq!(e.line(), Some(3));
    }

    #[test]
    fn test_deep_nesting_is_limited() {
        let vm = &mut Vm::new();
        let mut src = String::new();
        for _ in 0..400 {
            src.push('(');
        }
        src.push('1');
        for _ in 0..400 {
            src.push(')');
        }
        let e = vm.eval(&src).unwrap_err();
        assert_eq!(e.code(), ErrorCode::StackOverflow);
    }
}
