//! XML serialization.
//!
//! This module serializes a `Document` tree back to XML text. The
//! serializer handles escaping, the XML declaration, and replacing the
//! DOCTYPE's external subset reference.

pub mod xml;

pub use xml::{serialize, serialize_with_options, SerializeOptions};
