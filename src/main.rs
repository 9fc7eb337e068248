//! # NanoJS
//!
//! A tiny JavaScript-ish interpreter in a fixed memory footprint.
//!

fn main() {
    nanojs::term::main()
}
