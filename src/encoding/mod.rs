//! Value encoding/decoding for the host store
//!
//! Mirror entries keep their native shape; the host store only ever sees
//! strings. This module owns the conversion in both directions.

pub mod value;

pub use value::{Value, json_kind, resolve};
