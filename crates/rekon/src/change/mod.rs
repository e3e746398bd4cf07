//! Change computation: turns actual and desired resource sets into changes.

pub mod computer;
pub mod mapper;

pub use computer::ChangeComputer;
pub use mapper::{key_fn, value_fn, KeyMapper, NameKeyMapper, SpecValueMapper, ValueMapper};
