//! Backend configuration for TTS synthesis requests.
//!
//! The upstream service exposes several near-identical synthesis endpoints
//! that differ only in path, request body shape and one numeric tuning
//! parameter. Rather than one client type per endpoint, a single
//! [`BackendConfig`] record captures the differences: base URL, synthesis
//! path, the name and valid range of the tuning parameter, and a request-body
//! builder closure.

use std::ops::RangeInclusive;
use std::sync::Arc;

use url::Url;

use crate::error::{SessionError, SessionResult};

/// Default description used when the caller leaves the voice unspecified.
pub const DEFAULT_VOICE_DESCRIPTION: &str = "a natural and clear voice";

/// Default per-request text limit, matching the upstream service.
pub const DEFAULT_MAX_TEXT_CHARS: usize = 500;

/// One synthesis request.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_description: String,
    pub language: String,
    /// Backend-specific tuning knob; its name and range come from the
    /// [`BackendConfig`]. Clamped to the backend's range when serialized.
    pub parameter: Option<f64>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_description: DEFAULT_VOICE_DESCRIPTION.to_string(),
            language: "en".to_string(),
            parameter: None,
        }
    }

    pub fn with_voice_description(mut self, description: impl Into<String>) -> Self {
        self.voice_description = description.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_parameter(mut self, value: f64) -> Self {
        self.parameter = Some(value);
        self
    }
}

/// Builds the JSON body for a given request.
pub type RequestBodyBuilder =
    Arc<dyn Fn(&BackendConfig, &SynthesisRequest) -> serde_json::Value + Send + Sync>;

/// Configuration-driven description of one synthesis backend.
#[derive(Clone)]
pub struct BackendConfig {
    base_url: Url,
    synthesis_path: String,
    parameter_name: String,
    parameter_range: RangeInclusive<f64>,
    max_text_chars: usize,
    body_builder: RequestBodyBuilder,
}

impl BackendConfig {
    pub fn new(
        base_url: Url,
        synthesis_path: impl Into<String>,
        parameter_name: impl Into<String>,
        parameter_range: RangeInclusive<f64>,
        body_builder: RequestBodyBuilder,
    ) -> Self {
        Self {
            base_url,
            synthesis_path: synthesis_path.into(),
            parameter_name: parameter_name.into(),
            parameter_range,
            max_text_chars: DEFAULT_MAX_TEXT_CHARS,
            body_builder,
        }
    }

    /// The voice-design backend: posts `{text, voice_description, language}`
    /// to `/synthesize/design`, with a guidance-scale tuning parameter.
    pub fn design(base_url: Url) -> Self {
        Self::new(
            base_url,
            "/synthesize/design",
            "guidance_scale",
            0.5..=5.0,
            Arc::new(|cfg, req| {
                let mut body = serde_json::json!({
                    "text": req.text,
                    "voice_description": req.voice_description,
                    "language": req.language,
                });
                if let Some(value) = req.parameter {
                    body[cfg.parameter_name.as_str()] =
                        serde_json::json!(cfg.clamp_parameter(value));
                }
                body
            }),
        )
    }

    pub fn with_max_text_chars(mut self, max: usize) -> Self {
        self.max_text_chars = max;
        self
    }

    pub fn parameter_name(&self) -> &str {
        &self.parameter_name
    }

    pub fn parameter_range(&self) -> &RangeInclusive<f64> {
        &self.parameter_range
    }

    pub fn clamp_parameter(&self, value: f64) -> f64 {
        value.clamp(*self.parameter_range.start(), *self.parameter_range.end())
    }

    /// Full URL of the synthesis endpoint.
    pub fn synthesis_url(&self) -> SessionResult<Url> {
        self.base_url
            .join(&self.synthesis_path)
            .map_err(|e| SessionError::InvalidRequest(format!("bad synthesis url: {e}")))
    }

    /// Reject malformed requests before any network activity.
    pub fn validate(&self, request: &SynthesisRequest) -> SessionResult<()> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidRequest("text is empty".into()));
        }
        let chars = text.chars().count();
        if chars > self.max_text_chars {
            return Err(SessionError::InvalidRequest(format!(
                "text has {chars} characters, limit is {}",
                self.max_text_chars
            )));
        }
        Ok(())
    }

    /// Build the JSON request body for `request`.
    pub fn build_body(&self, request: &SynthesisRequest) -> serde_json::Value {
        (self.body_builder)(self, request)
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url.as_str())
            .field("synthesis_path", &self.synthesis_path)
            .field("parameter_name", &self.parameter_name)
            .field("parameter_range", &self.parameter_range)
            .field("max_text_chars", &self.max_text_chars)
            .finish_non_exhaustive()
    }
}
