//! Self-contained helpers behind the informational builtins.

pub mod iman;
pub mod neonate;
pub mod proclore;
pub mod prompt;
pub mod reveal;
pub mod seek;
