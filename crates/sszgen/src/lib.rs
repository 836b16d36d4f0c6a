//! SSZ methodset generation works in three steps:
//! 1. Parse the Rust input with `syn` into an AST representation.
//! 2. Convert the AST into an intermediate representation describing the
//!    records and fields as SSZ values.
//! 3. Use the IR to print the encoding, decoding and hashing methods.

pub mod builder;
pub mod emit;
pub mod emit_hash;
pub mod emit_marshal;
pub mod emit_size;
pub mod emit_unmarshal;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod ir;
pub mod output;
pub mod tags;

pub const SSZGEN_VERSION: &str = env!("CARGO_PKG_VERSION");
