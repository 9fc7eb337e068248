mod common;
use common::*;
use nanojs::mach::Vm;

#[test]
fn test_precedence() {
    assert_eq!(run("1 + 2 * 3"), "7");
    assert_eq!(run("(1 + 2) * 3"), "9");
    assert_eq!(run("2 + 3 < 6 == true"), "true");
    assert_eq!(run("1 | 2 & 3"), "3");
}

#[test]
fn test_left_assoc() {
    assert_eq!(run("8 - 4 - 2"), "2");
    assert_eq!(run("100 / 10 / 5"), "2");
    assert_eq!(run("1.5 / 2 * 3"), "2.25");
}

#[test]
fn test_arithmetic() {
    assert_eq!(run("7 / 2"), "3.5");
    assert_eq!(run("10 % 3"), "1");
    assert_eq!(run("-7 % 3"), "-1");
    assert_eq!(run("5 % 0"), "NaN");
    assert_eq!(run("1 / 0"), "inf");
}

#[test]
fn test_bitwise() {
    assert_eq!(run("6 & 3"), "2");
    assert_eq!(run("6 | 3"), "7");
    assert_eq!(run("6 ^ 3"), "5");
    assert_eq!(run("1 << 4"), "16");
    assert_eq!(run("-8 >> 1"), "-4");
    assert_eq!(run("-1 >>> 60"), "15");
    assert_eq!(run("~0"), "-1");
}

#[test]
fn test_comparison() {
    assert_eq!(run("1 < 2"), "true");
    assert_eq!(run("2 <= 1"), "false");
    assert_eq!(run("3 > 2"), "true");
    assert_eq!(run("2 >= 3"), "false");
    assert_eq!(
        run("'a' < 'b'"),
        "type mismatch: operands must be numbers (line 1)"
    );
}

#[test]
fn test_equality_never_coerces() {
    assert_eq!(run("1 == 1"), "true");
    assert_eq!(run("1 != 2"), "true");
    assert_eq!(run("1 === 1"), "true");
    assert_eq!(run("2 !== 2"), "false");
    assert_eq!(run("'ab' == 'a' + 'b'"), "true");
    // mismatched types are simply unequal
    assert_eq!(run("1 == '1'"), "false");
    assert_eq!(run("true == 1"), "false");
    assert_eq!(run("null == undefined"), "false");
}

#[test]
fn test_logical() {
    assert_eq!(run("true && false"), "false");
    assert_eq!(run("true || false"), "true");
    assert_eq!(run("1 && 2"), "2");
    assert_eq!(run("0 || 'x'"), "x");
    assert_eq!(run("!0"), "true");
    assert_eq!(run("!!'x'"), "true");
}

#[test]
fn test_ternary() {
    assert_eq!(run("true ? 'yes' : 'no'"), "yes");
    assert_eq!(run("false ? 'yes' : 'no'"), "no");
    assert_eq!(run("1 < 2 ? 2 < 3 ? 'a' : 'b' : 'c'"), "a");
}

#[test]
fn test_strings() {
    assert_eq!(run("'foo' + 'bar'"), "foobar");
    assert_eq!(run("('foo' + 'bar').length"), "6");
    // lengths count bytes, not characters
    assert_eq!(run("'µ'.length"), "2");
    assert_eq!(run(r#""a\n\tb""#), "a\n\tb");
    assert_eq!(
        run("1 + '2'"),
        "type mismatch: operands must be numbers (line 1)"
    );
}

#[test]
fn test_typeof() {
    assert_eq!(run("typeof 1"), "number");
    assert_eq!(run("typeof 'x'"), "string");
    assert_eq!(run("typeof true"), "boolean");
    assert_eq!(run("typeof null"), "null");
    assert_eq!(run("typeof undefined"), "undefined");
    assert_eq!(run("typeof function() {}"), "function");
    assert_eq!(run("let o = {}; typeof o"), "object");
}

#[test]
fn test_assignment_operators() {
    let vm = &mut Vm::new();
    assert_eq!(eval(vm, "let a = 10;"), "10");
    assert_eq!(eval(vm, "a += 5"), "15");
    assert_eq!(eval(vm, "a -= 1"), "14");
    assert_eq!(eval(vm, "a *= 2"), "28");
    assert_eq!(eval(vm, "a /= 4"), "7");
    assert_eq!(eval(vm, "a %= 4"), "3");
    assert_eq!(eval(vm, "a <<= 2"), "12");
    assert_eq!(eval(vm, "a >>= 1"), "6");
    assert_eq!(eval(vm, "a |= 1"), "7");
    assert_eq!(eval(vm, "a ^= 2"), "5");
    assert_eq!(eval(vm, "a &= 6"), "4");
    assert_eq!(eval(vm, "a >>>= 1"), "2");
}

#[test]
fn test_assignment_chains() {
    let vm = &mut Vm::new();
    eval(vm, "let a = 0; let b = 0;");
    assert_eq!(eval(vm, "a = b = 9"), "9");
    assert_eq!(eval(vm, "a"), "9");
    assert_eq!(eval(vm, "b"), "9");
    assert_eq!(
        eval(vm, "5 = 1"),
        "type mismatch: invalid assignment target (line 1)"
    );
}

#[test]
fn test_inc_dec() {
    let vm = &mut Vm::new();
    eval(vm, "let i = 5;");
    assert_eq!(eval(vm, "i++"), "5");
    assert_eq!(eval(vm, "i"), "6");
    assert_eq!(eval(vm, "++i"), "7");
    assert_eq!(eval(vm, "i--"), "7");
    assert_eq!(eval(vm, "--i"), "5");
    assert_eq!(
        eval(vm, "5++"),
        "type mismatch: increment needs a variable (line 1)"
    );
}

#[test]
fn test_unary() {
    assert_eq!(run("-5 + 3"), "-2");
    assert_eq!(run("+5"), "5");
    assert_eq!(run("- -5"), "5");
    assert_eq!(
        run("-'x'"),
        "type mismatch: operand must be a number (line 1)"
    );
}
