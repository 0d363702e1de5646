pub mod bus;
pub mod config;
pub mod index;
pub mod memory;
pub mod navigation;
pub mod paths;
pub mod search;
pub mod service;
pub mod tokenizer;
pub mod tree;

pub use index::{DetailedItem, ItemIndex, SharedItemIndex};
pub use paths::{CanonicalForm, CanonicalPath, PathConventions};
pub use tree::{AncestorChain, AncestorSlot, TreeResolver};
