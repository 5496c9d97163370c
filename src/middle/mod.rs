//! The middle of the compiler: names are bound to symbols, storage is laid
//! out, the tree is type checked, and expressions are canonicalized into a
//! shared DAG (with constant folding) before being handed to the backend.

pub mod dag;
pub mod resolve;
pub mod symbols;
pub mod ty;
pub mod type_check;
