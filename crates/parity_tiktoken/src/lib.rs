//! tiktoken backend.
//!
//! Encodings are rebuilt from files next to the manifest: the BPE ranks in
//! `mergeable_ranks.tiktoken` and the regex pattern plus special-token
//! table recorded in the manifest itself. Nothing is fetched or hardcoded.

pub mod adapter_impl;
pub mod backend;

pub use adapter_impl::TiktokenBackend;
pub use backend::{
    open_from_assets, parse_mergeable_ranks, EncodingDefinition, MERGEABLE_RANKS_FILE,
    TIKTOKEN_LIBRARY_NAME,
};
