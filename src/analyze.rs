//! Card metadata extraction via a vision language model.
//!
//! [`CardAnalyzer`] is the seam: the pipeline only needs "image bytes in,
//! structured fields out", so the HTTP client behind it is swappable and
//! tests can run against a mock. [`GeminiClient`] is the production
//! implementation, speaking the Gemini `generateContent` API with an inline
//! base64 image and a JSON response type.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::core::errors::{ScanError, ScanResult};

/// Structured fields read off a card's face. Every field is optional; the
/// model returns null for anything it cannot read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFields {
    /// The athlete's name as printed.
    pub player_name: Option<String>,
    /// The team name as printed.
    pub team_name: Option<String>,
    /// Set name and year, e.g. "2023 Topps Chrome".
    pub card_set_year: Option<String>,
    /// The card number within its set.
    pub card_number: Option<String>,
    /// Serial numbering such as "23/99", if present.
    pub serial_number: Option<String>,
    /// Parallel, insert, rookie, autograph, relic, or base.
    pub card_type: Option<String>,
    /// Anything else notable on the card.
    pub other: Option<String>,
}

/// Extracts structured card fields from an image.
pub trait CardAnalyzer {
    /// Analyzes one card image.
    ///
    /// # Arguments
    ///
    /// * `image` - The encoded image bytes.
    /// * `mime` - The image's MIME type, e.g. `image/jpeg`.
    ///
    /// # Returns
    ///
    /// The fields read off the card face; absent fields are `None`.
    fn analyze(&self, image: &[u8], mime: &str) -> ScanResult<CardFields>;
}

const EXTRACTION_PROMPT: &str = "You are looking at a photo of a single sports trading card. \
Extract the following fields and respond with a JSON object only, no prose: \
player_name (the athlete's full name), \
team_name, \
card_set_year (manufacturer set and year, e.g. \"2023 Topps Chrome\"), \
card_number (the number printed on the card, often prefixed with #), \
serial_number (limited-print numbering like \"23/99\", or null), \
card_type (e.g. base, rookie, insert, parallel, autograph, relic), \
other (any other notable text or features, or null). \
Use null for any field you cannot read with confidence.";

const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini-backed [`CardAnalyzer`].
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Creates a client for the default model.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::blocking::Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Overrides the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/{}:generateContent", self.model)
    }
}

impl CardAnalyzer for GeminiClient {
    #[instrument(skip(self, image), fields(bytes = image.len()))]
    fn analyze(&self, image: &[u8], mime: &str) -> ScanResult<CardFields> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: EXTRACTION_PROMPT.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: mime.to_string(),
                            data: BASE64.encode(image),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Api {
                code: status.as_u16(),
                message: response.text().unwrap_or_default(),
            });
        }

        let body: GenerateContentResponse = response.json()?;
        let text = body.first_text().ok_or_else(|| ScanError::Api {
            code: status.as_u16(),
            message: "response contained no candidate text".to_string(),
        })?;
        debug!(chars = text.len(), "model returned field payload");
        let fields: CardFields = serde_json::from_str(text)?;
        Ok(fields)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

impl GenerateContentResponse {
    fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .parts
            .iter()
            .find_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
    }
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_fields_parse_with_nulls() {
        let payload = r#"{
            "player_name": "Jane Doe",
            "team_name": null,
            "card_set_year": "2021 Prizm",
            "card_number": "#147",
            "serial_number": null,
            "card_type": "rookie",
            "other": null
        }"#;
        let fields: CardFields = serde_json::from_str(payload).expect("parse");
        assert_eq!(fields.player_name.as_deref(), Some("Jane Doe"));
        assert_eq!(fields.team_name, None);
        assert_eq!(fields.card_type.as_deref(), Some("rookie"));
    }

    #[test]
    fn test_response_first_text_extraction() {
        let raw = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"player_name\": \"A\"}"}]}}
            ]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).expect("parse");
        let fields: CardFields =
            serde_json::from_str(response.first_text().expect("text")).expect("fields");
        assert_eq!(fields.player_name.as_deref(), Some("A"));
    }

    #[test]
    fn test_empty_response_has_no_text() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates": []}"#).expect("parse");
        assert!(response.first_text().is_none());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::InlineData {
                    inline_data: InlineData {
                        mime_type: "image/png".to_string(),
                        data: "QUJD".to_string(),
                    },
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(json.contains("\"inlineData\""));
        assert!(json.contains("\"mimeType\""));
        assert!(json.contains("\"responseMimeType\""));
    }
}
