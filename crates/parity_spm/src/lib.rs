//! SentencePiece backend.
//!
//! Opens a `.model` file through the `sentencepiece` bindings. Pieces are
//! reported as tokens; the library has no offsets, word ids or type ids, so
//! those fields take fixed values.

pub mod adapter_impl;
pub mod backend;

pub use adapter_impl::{pieces_to_sequence, SentencePieceBackend};
pub use backend::{detect_model_file, open_from_assets, MODEL_FILE_CANDIDATES, SPM_LIBRARY_NAME};
