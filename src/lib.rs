//! Load-order and dependency resolution engine for strategy-game mod
//! managers.
//!
//! The sequence of mods and separators lives in a [`session::Session`],
//! which applies drag gestures, cascades activation, re-sorts on request and
//! writes every mutated slice back through a debounced [`sync::ChangeSync`].

pub mod activation;
pub mod auto_sort;
pub mod config;
pub mod conflicts;
pub mod error;
pub mod game;
pub mod graph;
pub mod reorder;
pub mod sequence;
pub mod session;
pub mod store;
pub mod sync;
pub mod violations;

pub use error::{Error, Result};
pub use sequence::{Entry, ModEntry, OrderRecord, SeparatorEntry};
pub use session::{Session, SessionOptions};
