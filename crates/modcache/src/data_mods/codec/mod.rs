//! Data-mod codecs.

pub mod json;
