//! Vendor wire format types
//!
//! Pure serde types, one module per API family. Conversion to and from the
//! canonical model lives in [`crate::convert`].

pub mod anthropic;
pub mod cohere;
pub mod google;
pub mod huggingface;
pub mod openai;
pub mod replicate;
pub mod voyage;
