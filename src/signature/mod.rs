//! Signature sets: wire model, merge/replace policy and remote store.

pub mod model;
pub mod policy;
pub mod store;

pub use model::{SignatureEntry, SignatureSet, SlotKey};
pub use policy::{SignatureChange, SignaturePolicy, convert_newlines};
pub use store::SignatureStore;
