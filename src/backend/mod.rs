//! The backend of the compiler deals with machine concerns: abstract
//! concepts like loops and conditionals are simplified to labels and jumps,
//! expression DAGs are flattened into ordered post-order operations over a
//! small pool of scratch registers, and the result is NASM-flavored x86-64
//! assembly text.

pub mod regalloc;
pub mod x86_64;
