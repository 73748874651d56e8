//! Hugging Face `tokenizers` backend.
//!
//! Loads a `tokenizer.json`, disables any padding or truncation baked into
//! it, and exposes the library through the parity backend trait.

pub mod adapter_impl;
pub mod backend;

pub use adapter_impl::HuggingFaceBackend;
pub use backend::{open_from_assets, HF_LIBRARY_NAME, TOKENIZER_FILE};
