//! Foundation types for keepstate.
//!
//! Every other keepstate crate depends on `keepstate-types`. The types here
//! describe *what* gets persisted; they carry no I/O.
//!
//! # Key Types
//!
//! - [`Value`]: dynamic state tree, including values JSON cannot express
//!   natively (dates, maps, sets, symbols, functions, class instances, errors,
//!   element references)
//! - [`TypeMarker`]: the tag naming one of those special types on the wire
//! - [`ElementRef`]: best-effort, selector-addressable element reference
//! - [`Snapshot`]: immutable, cheaply cloned point-in-time copy of a state
//! - [`StoreKey`]: validated namespace key for one persisted record

pub mod element;
pub mod error;
pub mod marker;
pub mod snapshot;
pub mod value;

pub use element::ElementRef;
pub use error::TypeError;
pub use marker::TypeMarker;
pub use snapshot::{Snapshot, StoreKey};
pub use value::{ClassInstance, ErrorValue, FunctionRef, Value};
