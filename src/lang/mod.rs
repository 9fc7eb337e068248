/*!
# Language Module

This module provides lexical analysis of NanoJS source text and the
error type shared by the whole engine. There is no separate parse
step: the `mach` module's evaluator drives the `Lexer` directly and
executes what it recognizes.

*/

#[macro_use]
mod error;
mod lex;
mod token;

pub use error::Error;
pub use error::ErrorCode;
pub use lex::unescape;
pub use lex::Lexer;
pub use token::Op;
pub use token::Token;
pub use token::Word;
