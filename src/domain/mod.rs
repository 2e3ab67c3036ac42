//! Domain layer types and invariants.

pub mod blocks;
pub mod dates;
pub mod entities;
pub mod properties;
pub mod rich_text;
pub mod slug;
