//! Shared types for the Chord ring: the identifier-space arithmetic
//! (`id`), the plain-value node reference (`noderef`), the hand-rolled
//! wire protocol (`wire`), its optional authenticated encryption
//! (`security`), and the error type threaded through all of them (`error`).

pub mod error;
pub mod id;
pub mod noderef;
pub mod security;
pub mod wire;

pub use error::ChordError;
pub use id::{in_arc, Id};
pub use noderef::NodeInfo;
