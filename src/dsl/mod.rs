//! The update DSL: typed command model, parser, and semantic state applier.

pub mod parser;
pub mod state;
pub mod types;

pub use parser::parse_document;
pub use state::DslState;
pub use types::{
    AliasCommand, Command, DateFilterKind, Selector, SelectorDateFilter, SelectorStrategy,
    SplitCommand, TagRef, TreeRef, UpdateCommand,
};
