//! Payloads exchanged with the live streaming service.
//!
//! Transports own the socket; these types own the JSON shape so every
//! transport agrees on it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::error::LabError;

/// What the model answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Audio,
    Text,
}

/// Session setup sent when the channel opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConnectConfig {
    pub model: String,
    pub response_modalities: Vec<Modality>,
    pub system_instruction: String,
    pub input_audio_transcription: bool,
    pub output_audio_transcription: bool,
    pub voice_name: String,
}

impl LiveConnectConfig {
    /// The setup message in the service's JSON shape.
    pub fn to_setup_message(&self) -> Value {
        let model = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };

        let mut setup = json!({
            "model": model,
            "generationConfig": {
                "responseModalities": self.response_modalities,
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice_name } }
                }
            },
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] }
        });
        if self.input_audio_transcription {
            setup["inputAudioTranscription"] = json!({});
        }
        if self.output_audio_transcription {
            setup["outputAudioTranscription"] = json!({});
        }
        json!({ "setup": setup })
    }
}

/// One outbound chunk of realtime input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

impl MediaChunk {
    /// Wrap 16-bit little-endian mono PCM captured at `sample_rate`.
    pub fn pcm(bytes: &[u8], sample_rate: u32) -> Self {
        Self {
            mime_type: format!("audio/pcm;rate={}", sample_rate),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, LabError> {
        STANDARD
            .decode(&self.data)
            .map_err(|e| LabError::Channel(format!("invalid base64 payload: {}", e)))
    }

    pub fn to_realtime_input(&self) -> Value {
        json!({ "realtimeInput": { "mediaChunks": [self] } })
    }
}

/// A demultiplexed inbound message. Any combination of fields may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerMessage {
    pub interrupted: bool,
    pub input_transcript: Option<String>,
    pub output_transcript: Option<String>,
    /// Decoded 16-bit PCM model audio.
    pub audio: Option<Vec<u8>>,
    pub turn_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(default)]
    server_content: Option<RawServerContent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerContent {
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
    input_transcription: Option<RawTranscription>,
    output_transcription: Option<RawTranscription>,
    model_turn: Option<RawTurn>,
}

#[derive(Debug, Deserialize)]
struct RawTranscription {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    inline_data: Option<MediaChunk>,
}

impl ServerMessage {
    /// Parse one inbound frame. Frames without server content (setup
    /// acknowledgements, usage reports) parse to an empty message.
    pub fn from_json(text: &str) -> Result<Self, LabError> {
        let raw: RawMessage =
            serde_json::from_str(text).map_err(|e| LabError::Channel(format!("malformed frame: {}", e)))?;
        let Some(content) = raw.server_content else {
            return Ok(Self::default());
        };

        let non_empty = |t: Option<RawTranscription>| t.and_then(|t| t.text).filter(|s| !s.is_empty());

        let audio = content
            .model_turn
            .and_then(|turn| turn.parts.into_iter().find_map(|p| p.inline_data))
            .map(|chunk| chunk.decode())
            .transpose()?;

        Ok(Self {
            interrupted: content.interrupted,
            input_transcript: non_empty(content.input_transcription),
            output_transcript: non_empty(content.output_transcription),
            audio,
            turn_complete: content.turn_complete,
        })
    }

    pub fn is_empty(&self) -> bool {
        !self.interrupted
            && self.input_transcript.is_none()
            && self.output_transcript.is_none()
            && self.audio.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_field_of_a_combined_frame() {
        let frame = r#"{"serverContent": {
            "interrupted": true,
            "inputTranscription": {"text": "wait"},
            "outputTranscription": {"text": "Sure"},
            "modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "AAEC"}}]}
        }}"#;
        let msg = ServerMessage::from_json(frame).unwrap();

        assert!(msg.interrupted);
        assert_eq!(msg.input_transcript.as_deref(), Some("wait"));
        assert_eq!(msg.output_transcript.as_deref(), Some("Sure"));
        assert_eq!(msg.audio, Some(vec![0, 1, 2]));
    }

    #[test]
    fn frames_without_content_are_empty() {
        let msg = ServerMessage::from_json(r#"{"setupComplete": {}}"#).unwrap();
        assert!(msg.is_empty());
    }

    #[test]
    fn blank_transcripts_are_dropped() {
        let msg = ServerMessage::from_json(r#"{"serverContent": {"outputTranscription": {"text": ""}}}"#).unwrap();
        assert!(msg.output_transcript.is_none());
    }

    #[test]
    fn bad_audio_is_a_channel_error() {
        let frame = r#"{"serverContent": {"modelTurn": {"parts": [{"inlineData": {"mimeType": "audio/pcm", "data": "!!"}}]}}}"#;
        assert!(matches!(ServerMessage::from_json(frame), Err(LabError::Channel(_))));
    }

    #[test]
    fn media_chunk_encodes_rate_and_payload() {
        let chunk = MediaChunk::pcm(&[0, 1, 2], 16_000);
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert_eq!(chunk.decode().unwrap(), vec![0, 1, 2]);

        let input = chunk.to_realtime_input();
        assert_eq!(input["realtimeInput"]["mediaChunks"][0]["mimeType"], "audio/pcm;rate=16000");
        assert_eq!(input["realtimeInput"]["mediaChunks"][0]["data"], "AAEC");
    }

    #[test]
    fn setup_message_shape() {
        let config = LiveConnectConfig {
            model: "gemini-live".into(),
            response_modalities: vec![Modality::Audio],
            system_instruction: "be brief".into(),
            input_audio_transcription: true,
            output_audio_transcription: false,
            voice_name: "Kore".into(),
        };
        let setup = config.to_setup_message();

        assert_eq!(setup["setup"]["model"], "models/gemini-live");
        assert_eq!(setup["setup"]["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            setup["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
        assert_eq!(setup["setup"]["systemInstruction"]["parts"][0]["text"], "be brief");
        assert!(setup["setup"].get("inputAudioTranscription").is_some());
        assert!(setup["setup"].get("outputAudioTranscription").is_none());
    }
}
