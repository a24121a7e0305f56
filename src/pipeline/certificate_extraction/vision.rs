//! Certificate extraction backed by a local Ollama vision model.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ExtractorError;
use super::traits::DocumentExtractor;
use crate::models::enums::EntityType;

pub const DEFAULT_VISION_MODEL: &str = "llama3.2-vision";

const SHARED_FIELDS: &str = r#"Return one JSON object with these keys (null when absent):
"document_type": the document's title as printed,
"document_number": registration or certificate number,
"holder_name": person or company the document is issued to,
"issued_by": issuing authority,
"issue_date": "YYYY-MM-DD",
"expiry_date": "YYYY-MM-DD"."#;

/// Prompt for the entity the certificate belongs to.
pub fn extraction_prompt(entity_type: EntityType) -> String {
    let (subject, extra) = match entity_type {
        EntityType::Organization => (
            "a transporter authorisation or certificate of competence issued to a horse transport company or its staff",
            r#"Also include "authorisation": {"type": "Type 1" or "Type 2", "number": string}."#,
        ),
        EntityType::Vehicle => (
            "a vehicle registration certificate (vognkort), approval certificate or toll document for a horse transport vehicle",
            r#"Also include "registration_number" and "vehicle_type"."#,
        ),
        EntityType::Horse => (
            "an equine passport (hestepass) or health certificate for a horse",
            r#"Also include "horse_name", "ueln" and "microchip"."#,
        ),
    };
    format!(
        "You are reading {subject}. Extract the printed fields exactly as written. \
         Do not guess values that are not visible.\n\n{SHARED_FIELDS}\n{extra}"
    )
}

pub struct OllamaVisionExtractor {
    base_url: String,
    model: String,
    storage_dir: PathBuf,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaVisionExtractor {
    pub fn new(
        base_url: &str,
        model: &str,
        storage_dir: PathBuf,
        timeout_secs: u64,
    ) -> Result<Self, ExtractorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExtractorError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            storage_dir,
            client,
            timeout_secs,
        })
    }

    /// Resolves an image reference inside the storage directory.
    /// References that would escape it are rejected.
    fn image_path(&self, image_ref: &str) -> Result<PathBuf, ExtractorError> {
        let relative = Path::new(image_ref);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if image_ref.trim().is_empty() || escapes {
            return Err(ExtractorError::ImageRead {
                path: image_ref.to_string(),
                reason: "reference must be a relative path inside the storage directory".into(),
            });
        }
        Ok(self.storage_dir.join(relative))
    }

    fn read_image(&self, image_ref: &str) -> Result<String, ExtractorError> {
        let path = self.image_path(image_ref)?;
        let bytes = std::fs::read(&path).map_err(|e| ExtractorError::ImageRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl DocumentExtractor for OllamaVisionExtractor {
    fn extract(&self, image_ref: &str, entity_type: EntityType) -> Result<Value, ExtractorError> {
        let image = self.read_image(image_ref)?;
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: extraction_prompt(entity_type),
                images: vec![image],
            }],
            stream: false,
            format: "json",
        };

        tracing::debug!(model = %self.model, entity_type = %entity_type, "Sending certificate to vision model");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ExtractorError::OllamaConnection(self.base_url.clone())
                } else if e.is_timeout() {
                    ExtractorError::HttpClient(format!("Request timed out after {}s", self.timeout_secs))
                } else {
                    ExtractorError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractorError::OllamaError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| ExtractorError::ResponseParsing(e.to_string()))?;

        parse_json_object(&parsed.message.content)
    }
}

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

/// Parses a model reply as a JSON object, tolerating markdown code fences.
pub fn parse_json_object(reply: &str) -> Result<Value, ExtractorError> {
    let trimmed = reply.trim();
    let body = CODE_FENCE
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());

    let value: Value = serde_json::from_str(body)
        .map_err(|e| ExtractorError::ResponseParsing(format!("invalid JSON: {e}")))?;

    if !value.is_object() {
        return Err(ExtractorError::ResponseParsing("expected a JSON object".into()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_reply_parses() {
        let value = parse_json_object(r#"{"document_type": "Hestepass", "expiry_date": null}"#).unwrap();
        assert_eq!(value["document_type"], "Hestepass");
    }

    #[test]
    fn fenced_json_reply_parses() {
        let reply = "Here you go:\n```json\n{\"document_type\": \"Vognkort\"}\n```\n";
        let value = parse_json_object(reply).unwrap();
        assert_eq!(value["document_type"], "Vognkort");
    }

    #[test]
    fn non_object_reply_is_rejected() {
        assert!(matches!(
            parse_json_object("[1, 2, 3]"),
            Err(ExtractorError::ResponseParsing(_))
        ));
        assert!(matches!(
            parse_json_object("I could not read this image."),
            Err(ExtractorError::ResponseParsing(_))
        ));
    }

    #[test]
    fn prompts_are_entity_specific() {
        assert!(extraction_prompt(EntityType::Horse).contains("equine passport"));
        assert!(extraction_prompt(EntityType::Vehicle).contains("vognkort"));
        assert!(extraction_prompt(EntityType::Organization).contains("authorisation"));
        for entity in [EntityType::Horse, EntityType::Vehicle, EntityType::Organization] {
            assert!(extraction_prompt(entity).contains("expiry_date"));
        }
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let extractor =
            OllamaVisionExtractor::new("http://localhost:11434/", DEFAULT_VISION_MODEL, PathBuf::from("."), 30).unwrap();
        assert_eq!(extractor.base_url, "http://localhost:11434");
    }

    #[test]
    fn escaping_image_refs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let extractor =
            OllamaVisionExtractor::new("http://localhost:11434", DEFAULT_VISION_MODEL, dir.path().to_path_buf(), 30)
                .unwrap();

        for bad in ["../secret.jpg", "/etc/passwd", "", "a/../../b.jpg"] {
            assert!(
                matches!(extractor.extract(bad, EntityType::Horse), Err(ExtractorError::ImageRead { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn missing_image_is_an_image_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor =
            OllamaVisionExtractor::new("http://localhost:11434", DEFAULT_VISION_MODEL, dir.path().to_path_buf(), 30)
                .unwrap();
        let err = extractor.extract("uploads/none.jpg", EntityType::Vehicle).unwrap_err();
        assert!(err.to_string().contains("none.jpg"));
    }

    #[test]
    fn unreachable_server_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pass.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        let extractor =
            OllamaVisionExtractor::new("http://127.0.0.1:9", DEFAULT_VISION_MODEL, dir.path().to_path_buf(), 5)
                .unwrap();

        assert!(matches!(
            extractor.extract("pass.jpg", EntityType::Horse),
            Err(ExtractorError::OllamaConnection(_)) | Err(ExtractorError::HttpClient(_))
        ));
    }
}
