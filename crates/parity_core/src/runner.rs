use tracing::debug;

use crate::backend::{BackendError, TokenizerBackend};
use crate::contract::CaseOptions;
use crate::error::ParityError;
use crate::hash::{hash_string, hash_string_sequence};
use crate::materialize::MaterializedCase;
use crate::summary::{EncodingSummary, TokenSequence};

/// Everything one backend produced for one case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub id: String,
    pub length: String,
    pub description: String,
    pub options: CaseOptions,
    pub single: SingleOutcome,
    pub batch: BatchOutcome,
}

#[derive(Debug, Clone)]
pub struct SingleOutcome {
    pub text: String,
    pub text_hash: String,
    pub pair_text: Option<String>,
    pub pair_text_hash: Option<String>,
    pub sequence: TokenSequence,
    pub encoding: EncodingSummary,
    pub decoded: String,
    pub decoded_hash: String,
    /// Backend-specific fingerprints, e.g. SentencePiece piece decoding.
    pub extra: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub texts: Vec<String>,
    pub texts_hash: String,
    pub pair_texts: Option<Vec<String>>,
    pub pair_texts_hash: Option<String>,
    pub encodings: Vec<EncodingSummary>,
    pub decoded: Vec<String>,
    pub decoded_hash: String,
}

struct RawOutcome {
    single: TokenSequence,
    single_summary: EncodingSummary,
    single_decoded: String,
    single_extra: Vec<(&'static str, String)>,
    batch_summaries: Vec<EncodingSummary>,
    batch_decoded: Vec<String>,
}

/// Runs one case against `backend`.
///
/// The case's truncation window applies to both the single and the batch
/// encode and is cleared before returning, on success and on failure.
pub fn run_case<B>(
    backend: &mut B,
    model: &str,
    case: &MaterializedCase,
) -> Result<CaseOutcome, ParityError>
where
    B: TokenizerBackend + ?Sized,
{
    debug!(model, case = %case.id, truncation = ?case.options.truncation, "running case");
    let result = backend
        .set_truncation(case.options.truncation)
        .map_err(|err| ("set_truncation", err))
        .and_then(|()| encode_and_decode(&*backend, case));
    let cleared = backend.set_truncation(None);

    let raw = result.map_err(|(operation, err)| backend_error(model, &case.id, operation, err))?;
    cleared.map_err(|err| backend_error(model, &case.id, "clear_truncation", err))?;

    Ok(CaseOutcome {
        id: case.id.clone(),
        length: case.length.clone(),
        description: case.description.clone(),
        options: case.options.clone(),
        single: SingleOutcome {
            text: case.single.text.clone(),
            text_hash: hash_string(&case.single.text),
            pair_text: case.single.pair_text.clone(),
            pair_text_hash: case.single.pair_text.as_deref().map(hash_string),
            sequence: raw.single,
            encoding: raw.single_summary,
            decoded_hash: hash_string(&raw.single_decoded),
            decoded: raw.single_decoded,
            extra: raw.single_extra,
        },
        batch: BatchOutcome {
            texts: case.batch.texts.clone(),
            texts_hash: hash_string_sequence(&case.batch.texts),
            pair_texts: case.batch.pair_texts.clone(),
            pair_texts_hash: case
                .batch
                .pair_texts
                .as_ref()
                .map(|pairs| hash_string_sequence(pairs)),
            encodings: raw.batch_summaries,
            decoded_hash: hash_string_sequence(&raw.batch_decoded),
            decoded: raw.batch_decoded,
        },
    })
}

fn encode_and_decode<B>(
    backend: &B,
    case: &MaterializedCase,
) -> Result<RawOutcome, (&'static str, BackendError)>
where
    B: TokenizerBackend + ?Sized,
{
    let options = &case.options;
    let single = backend
        .encode(&case.single.text, case.single.pair_text.as_deref(), options)
        .map_err(|err| ("encode", err))?;
    let batch = backend
        .encode_batch(&case.batch.inputs(), options)
        .map_err(|err| ("encode_batch", err))?;
    if batch.len() != case.batch.count() {
        return Err((
            "encode_batch",
            BackendError(format!(
                "returned {} encodings for {} inputs",
                batch.len(),
                case.batch.count()
            )),
        ));
    }

    let single_decoded = backend
        .decode(&single.ids, options.decode_skip_special_tokens)
        .map_err(|err| ("decode", err))?;
    let batch_ids: Vec<&[u32]> = batch.iter().map(|seq| seq.ids.as_slice()).collect();
    let batch_decoded = backend
        .decode_batch(&batch_ids, options.decode_skip_special_tokens)
        .map_err(|err| ("decode_batch", err))?;

    let single_summary = backend
        .summarize(&single)
        .map_err(|err| ("summarize", err))?;
    let single_extra = backend
        .extra_fingerprints(&single, &single_decoded)
        .map_err(|err| ("extra_fingerprints", err))?;
    let batch_summaries = batch
        .iter()
        .map(|seq| backend.summarize(seq))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ("summarize", err))?;

    Ok(RawOutcome {
        single,
        single_summary,
        single_decoded,
        single_extra,
        batch_summaries,
        batch_decoded,
    })
}

fn backend_error(model: &str, case_id: &str, operation: &str, err: BackendError) -> ParityError {
    ParityError::BackendEncoding {
        model: model.to_string(),
        case_id: case_id.to_string(),
        operation: operation.to_string(),
        message: err.0,
    }
}

/// Runs every case in order, stopping at the first failure.
pub fn run_cases<B>(
    backend: &mut B,
    model: &str,
    cases: &[MaterializedCase],
) -> Result<Vec<CaseOutcome>, ParityError>
where
    B: TokenizerBackend + ?Sized,
{
    cases
        .iter()
        .map(|case| run_case(&mut *backend, model, case))
        .collect()
}
