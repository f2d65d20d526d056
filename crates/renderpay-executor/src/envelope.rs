//! Wire types for the executor protocol.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use renderpay_core::catalog::ParamValue;

/// One staged input: the blob's kind plus a time-boxed readable URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedInput {
    /// Input kind (e.g. "image").
    pub kind: String,
    /// Signed, time-boxed read URL the executor fetches the input from.
    pub signed_url: String,
}

/// The signed request body sent to the generation executor.
///
/// Field order is the serialization order; the signature is computed over
/// exactly these bytes, so the envelope is serialized once and reused for
/// both signing and sending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    /// Job id (ULID string).
    pub job_id: String,
    /// External identity of the requesting user.
    pub telegram_id: String,
    /// Catalog model id.
    pub model: String,
    /// The user's prompt.
    pub prompt: String,
    /// Validated parameters in canonical form.
    pub params: BTreeMap<String, ParamValue>,
    /// Staged inputs, in declaration order.
    pub inputs: Vec<StagedInput>,
    /// Optional style preset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Number of output units requested.
    pub counter: u32,
    /// Whether the prompt was machine-enhanced before submission.
    pub prompt_ai: bool,
}

/// A successful executor result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSuccess {
    /// URL of the generated output.
    pub output_url: String,
    /// Backend-specific metadata, passed through untouched.
    pub meta: Option<serde_json::Value>,
}

/// Raw response body from the executor, before discriminator checking.
#[derive(Debug, Deserialize)]
pub(crate) struct RawResponse {
    /// Success/failure discriminator. Required.
    pub ok: Option<bool>,
    pub output_url: Option<String>,
    pub meta: Option<serde_json::Value>,
    pub error: Option<RawError>,
}

/// Embedded failure detail from the executor.
#[derive(Debug, Deserialize)]
pub(crate) struct RawError {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_serializes_in_field_order() {
        let envelope = JobEnvelope {
            job_id: "01J0000000000000000000TEST".into(),
            telegram_id: "tg:42".into(),
            model: "flux-image".into(),
            prompt: "a fox".into(),
            params: BTreeMap::from([(
                "aspect_ratio".to_string(),
                ParamValue::Str("1:1".into()),
            )]),
            inputs: vec![StagedInput {
                kind: "image".into(),
                signed_url: "https://blobs.example/signed/a".into(),
            }],
            style: None,
            counter: 2,
            prompt_ai: false,
        };

        let json = serde_json::to_string(&envelope).unwrap();
        let job_pos = json.find("job_id").unwrap();
        let model_pos = json.find("\"model\"").unwrap();
        let counter_pos = json.find("counter").unwrap();
        assert!(job_pos < model_pos && model_pos < counter_pos);
        // Absent style is omitted entirely, keeping the signed bytes stable.
        assert!(!json.contains("style"));
    }
}
