use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::models::error::LabError;

/// One piece of a one-shot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

/// A one-shot generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    /// Response-format hint, e.g. `application/json`.
    pub response_mime_type: Option<String>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            parts: Vec::new(),
            response_mime_type: None,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(ContentPart::Text(text.into()));
        self
    }

    pub fn inline_data(mut self, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        self.parts.push(ContentPart::InlineData {
            mime_type: mime_type.into(),
            data,
        });
        self
    }

    pub fn jpeg(self, data: Vec<u8>) -> Self {
        self.inline_data("image/jpeg", data)
    }

    pub fn expect_json(mut self) -> Self {
        self.response_mime_type = Some("application/json".into());
        self
    }

    /// Request body in the service's JSON shape. Inline data is base64-encoded.
    pub fn to_body(&self) -> Value {
        let parts: Vec<Value> = self
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({ "text": text }),
                ContentPart::InlineData { mime_type, data } => json!({
                    "inlineData": { "mimeType": mime_type, "data": STANDARD.encode(data) }
                }),
            })
            .collect();

        let mut body = json!({ "contents": [{ "parts": parts }] });
        if let Some(mime) = &self.response_mime_type {
            body["generationConfig"] = json!({ "responseMimeType": mime });
        }
        body
    }
}

/// Strip markdown code fences the model sometimes wraps JSON in.
pub fn strip_json_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a reply as JSON after stripping fences. An empty reply reads as `{}`.
pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T, LabError> {
    let cleaned = strip_json_fences(text);
    let cleaned = if cleaned.is_empty() { "{}" } else { cleaned.as_str() };
    Ok(serde_json::from_str(cleaned)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        organism: String,
    }

    #[test]
    fn strips_fenced_json() {
        let text = "```json\n{\"organism\": \"E. coli\"}\n```";
        assert_eq!(strip_json_fences(text), "{\"organism\": \"E. coli\"}");
        let reply: Reply = parse_json_reply(text).unwrap();
        assert_eq!(reply.organism, "E. coli");
    }

    #[test]
    fn plain_json_parses() {
        let reply: Reply = parse_json_reply("  {\"organism\": \"S. aureus\"} ").unwrap();
        assert_eq!(reply.organism, "S. aureus");
    }

    #[test]
    fn garbage_is_transient() {
        let err = parse_json_reply::<Reply>("I could not analyze this image").unwrap_err();
        assert!(matches!(err, LabError::Transient(_)));
    }

    #[test]
    fn empty_reply_reads_as_empty_object() {
        let value: Value = parse_json_reply("").unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn body_encodes_inline_data() {
        let request = GenerateRequest::new("gemini-2.5-flash")
            .jpeg(vec![1, 2, 3])
            .text("describe")
            .expect_json();
        let body = request.to_body();

        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(body["contents"][0]["parts"][0]["inlineData"]["data"], "AQID");
        assert_eq!(body["contents"][0]["parts"][1]["text"], "describe");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }
}
