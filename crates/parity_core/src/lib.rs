//! Tokenizer parity substrate.
//!
//! Independent tokenizer backends are compared through canonical SHA-256
//! fingerprints instead of raw token dumps. A shared contract pins the
//! inputs, each backend's results are folded into a per-model manifest, and
//! full benchmark fixtures (plus chat-template renderings) are regenerated
//! for external parity suites.

pub mod assets;
pub mod backend;
pub mod chat;
pub mod config;
pub mod contract;
pub mod error;
pub mod files;
pub mod fixture;
pub mod hash;
pub mod manifest;
pub mod materialize;
pub mod pipeline;
pub mod runner;
pub mod summary;

pub use assets::{AssetProvider, LocalAssetStore, ResolvedAssets};
pub use backend::{BackendDescriptor, BackendError, BackendKind, TokenizerBackend};
pub use chat::{ChatScenarioSet, ChatTemplate};
pub use config::{ModelSpec, ParityConfig};
pub use contract::{
    applies_to_target, load_contract, parse_contract, CaseOptions, LoadedContract,
    TokenizationCase, TruncationWindow,
};
pub use error::ParityError;
pub use fixture::{build_fixture, format_timestamp, write_fixture, BenchmarkFixture};
pub use hash::{
    hash_offsets, hash_optional_int32_sequence, hash_int32_sequence, hash_string,
    hash_string_sequence, hash_uint32_sequence, sha256_hex,
};
pub use manifest::{
    compare_snapshots, reconcile, CaseSnapshot, CompareReport, ManifestFile, ReconcileReport,
    ValidationManifest, MANIFEST_VERSION, OWNED_FIELDS,
};
pub use materialize::{materialize, materialize_all, MaterializedCase};
pub use pipeline::{compare_models, process_models, BackendOpener, BatchReport, ModelStatus, RunMode};
pub use runner::{run_case, run_cases, CaseOutcome};
pub use summary::{EncodingSummary, TokenSequence};
