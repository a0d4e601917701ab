//! Runtime memory subsystem for a term-rewriting interpreter: bump-
//! allocated semispace arenas, a generational copying collector, and the
//! migration kernel for the fixed value kinds the interpreter's heap
//! holds (generic blocks, strings, string buffers, big integers, big
//! floats, persistent collection nodes).
//!
//! This crate has no mutator, no parser and no CLI: per the external
//! interfaces this subsystem exposes, it is a library a host interpreter
//! embeds, constructing one [`collector::Collector`] and routing every
//! allocation and collection through it.

pub mod addr;
pub mod alloc;
pub mod arena;
pub mod collector;
pub mod config;
pub mod error;
pub mod header;
pub mod layout;
pub mod logging;
pub mod migrate;
pub mod numeric;
pub mod persistent;
pub mod strbuf;
pub mod value;

pub use addr::Address;
pub use collector::Collector;
pub use config::Config;
pub use error::AllocError;
