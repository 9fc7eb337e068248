/*!
# NanoJS Language Guide

NanoJS is a strict subset of JavaScript built to run in a few kilobytes
of memory. If you know JavaScript you already know the syntax; this
guide is mostly about what is *missing* and about the places where a
tiny engine behaves differently than a browser.

Start the REPL by running the executable with no arguments. Type an
expression and its value prints. CTRL-D exits, and `.stats` shows how
much of the machine a session has used.

```text
NanoJS 0.3.1
> let greeting = 'hello';
hello
> greeting + ' world'
hello world
```

Run a file by passing its path, or a one-liner with `-e`:

```text
$ nanojs startup.js
$ nanojs -e "1 << 10"
1024
```

## Values

There are seven kinds of value: `undefined`, `null`, booleans, numbers,
strings, objects, and functions. Host functions registered by the
embedder are a value too, reported by `typeof` as `"cfunc"`.

Numbers are 32-bit floats. That is enough for sensor readings, timers,
and loop counters, but it is not a JavaScript `Number`: above 2^24,
integers lose precision. Bitwise operators truncate to integers before
they work, so masks and shifts behave as expected in that range.

Strings are byte strings kept in a small compacting pool. Literals may
use single or double quotes, and the usual escapes (`\n`, `\t`, `\\`,
and friends) are decoded. A string answers `.length` with its size in
bytes.

Object literals work the way you expect, with identifier or string
keys:

```text
> let sensor = { name: 'bme280', addr: 0x76 };
> sensor.name
bme280
> sensor['addr']
118
```

There are no arrays, no prototypes, and no methods on values. Member
access reads properties; assignment into members is not supported.

## Statements

`let` declares variables; re-declaring a name in the same scope is an
error. Blocks scope their declarations, and a variable's string or
object is reclaimed when its scope ends. `if`/`else` and `while` are
the control flow. `for`, `switch`, `try`, and the rest of the keyword
set are reserved and report "not implemented" rather than misparse.

Everything is an expression statement underneath: a statement leaves a
value, and the REPL prints the value of the last one. A quirk worth
knowing: `while` leaves the final, falsy value of its condition as its
statement value.

## Operators

The full C-style expression grammar is here: arithmetic, comparisons,
equality, bitwise operators, shifts (including `>>>`), logical `&&` and
`||` (which yield one of their operands), the ternary, assignment, and
compound assignment. `+` concatenates two strings, and `typeof`,
prefix/postfix `++`/`--`, `!`, `~`, and unary minus all work.

Two deliberate differences from JavaScript:

 * There is no type coercion. `1 + '2'` is a type error, not `"12"`.
   Comparing values of different types with `==` is simply `false`, and
   `===` is the same operation as `==`.
 * Comparison and arithmetic demand numbers; strings only support `+`,
   `==`, and `.length`.

## Functions

Functions are literals, stored as their source text, and they close
over nothing. Name lookup walks the scopes live at the moment of the
call (parameters first, then the caller's variables, then globals),
not the scopes where the function was written, so a function that
escapes its defining scope loses access to it. Arguments beyond the parameter list are
dropped, missing ones arrive as `undefined`. A function returns its
`return` value, or the value of the last statement the body ran.

```text
> let fib = function(n) { return n < 2 ? n : fib(n - 2) + fib(n - 1); };
> fib(10)
55
```

## Host functions

The embedder can register Rust functions with a one-line type
signature: the first character is the return type, the rest are the
arguments (`i` word, `b` bool, `f`/`F` float/double, `s` string, `u`
ignored, `[...]` a script callback). Calls are checked strictly against
the signature, both arity and types.

The REPL registers three as a demonstration: `print(s)`, `now()`
returning milliseconds, and `random(lo, hi)`.

## Limits

Everything is fixed-size: 32 operand stack slots, 16 nested scopes, 32
objects, 128 properties, a 4 KB string pool, and at most 255 bytes per
string. Exceeding any of them is a clean error, never a reallocation.
Objects are reclaimed by liveness scanning when abandoned, but an
object that references itself is leaked until the machine is dropped;
keep object graphs simple.
*/
