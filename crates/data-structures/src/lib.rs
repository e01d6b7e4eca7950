pub mod bitset;
pub mod identifier;

pub use bitset::GrowableBitSet;
pub use identifier::{CaseFolding, Identifier};
