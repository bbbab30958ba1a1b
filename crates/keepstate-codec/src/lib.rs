//! Serialization strategies for keepstate.
//!
//! Turns state snapshots into the single text record a storage backend
//! holds, and back again.
//!
//! # Key Types
//!
//! - [`Serializer`] / [`AsyncSerializer`]: the strategy contracts
//! - [`Serialization`]: a strategy tagged as sync or async
//! - [`JsonEnvelopeSerializer`]: default strategy for [`keepstate_types::Value`] states
//! - [`SerdeJsonSerializer`]: plain JSON for statically typed states
//! - [`HookedSerializer`] / [`CodecHook`]: compression and encryption around a serializer

pub mod envelope;
pub mod error;
pub mod hooks;
pub mod traits;
pub mod typed;

pub use envelope::{from_envelope, to_envelope, JsonEnvelopeSerializer};
pub use error::{CodecError, CodecResult};
pub use hooks::{ChaChaHook, CodecHook, HookedSerializer, ZstdHook};
pub use traits::{AsyncSerializer, Serialization, Serializer};
pub use typed::SerdeJsonSerializer;
