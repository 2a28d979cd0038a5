//! Code signature data shared with the signature embedder

pub mod slots;

pub use slots::SpecialSlots;
