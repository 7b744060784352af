// src/codec/mod.rs

//! Argument codec.
//!
//! The host flattens a structured parameter set into an argv vector
//! (`encode`); the launched process parses it back (`decode`) against the
//! same [`ArgSchema`]. Values travel as plain argv entries: there is no
//! shell quoting, so multi-word values stay single tokens.
//!
//! - [`schema`] describes recognised flags, required flags and defaults.
//! - [`encode`] is the host side.
//! - [`decode`] is the child side, including [`decode_or_exit`].

pub mod decode;
pub mod encode;
pub mod schema;

pub use decode::{DecodedArgs, USAGE_EXIT_CODE, decode, decode_or_exit};
pub use encode::{Parameters, encode};
pub use schema::{ArgSchema, FlagSpec};
