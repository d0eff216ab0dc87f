//! Client for the multimodal shot-analysis model.
//!
//! Uploads a video to the model's file API, polls the uploaded file until it
//! reaches a terminal state, then asks the model to enumerate shot events.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{info, instrument, warn};

use hoop_models::RawShotEvent;

use crate::error::{AnalyzerError, AnalyzerResult};
use crate::prompt::build_prompt;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const RETRY_BASE: Duration = Duration::from_secs(5);
const RETRY_FACTOR: u32 = 2;
const MAX_RETRIES: u32 = 2;

#[derive(Debug, Deserialize)]
struct UploadedFile {
    name: String,
    uri: String,
    state: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
struct FileData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    #[serde(rename = "fileUri")]
    file_uri: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Client for the external multimodal shot-analysis model.
pub struct AnalyzerClient {
    api_key: String,
    model: String,
    client: Client,
}

impl AnalyzerClient {
    pub fn new() -> AnalyzerResult<Self> {
        let api_key = std::env::var("ANALYZER_API_KEY")
            .map_err(|_| AnalyzerError::Config("ANALYZER_API_KEY not set".into()))?;
        let model = std::env::var("ANALYZER_MODEL")
            .unwrap_or_else(|_| "gemini-2.5-flash".to_string());

        Ok(Self {
            api_key,
            model,
            client: Client::new(),
        })
    }

    /// Upload a video, wait for the file to become ready, then request the
    /// shot-event list for a video of `duration_sec` seconds.
    #[instrument(skip(self), fields(model = %self.model))]
    pub async fn analyze(
        &self,
        video_path: &Path,
        mime_type: &str,
        duration_sec: u64,
    ) -> AnalyzerResult<Vec<RawShotEvent>> {
        let uploaded = self.upload_file(video_path, mime_type).await?;
        self.wait_until_ready(&uploaded.name, uploaded.state, uploaded.uri.clone())
            .await?;

        let prompt = build_prompt(duration_sec);
        self.generate_with_retry(&prompt, &uploaded.uri, mime_type)
            .await
    }

    async fn upload_file(&self, path: &Path, mime_type: &str) -> AnalyzerResult<UploadedFile> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| AnalyzerError::UploadFailed(e.to_string()))?;

        let url = format!(
            "https://generativelanguage.googleapis.com/upload/v1beta/files?key={}",
            self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AnalyzerError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::UpstreamError { status, body });
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::UploadFailed(e.to_string()))?;
        Ok(parsed.file)
    }

    async fn wait_until_ready(
        &self,
        file_name: &str,
        mut state: String,
        uri: String,
    ) -> AnalyzerResult<()> {
        loop {
            match state.as_str() {
                "ACTIVE" => return Ok(()),
                "FAILED" => return Err(AnalyzerError::FileProcessingFailed),
                _ => {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    state = self.poll_file_state(file_name).await?;
                    let _ = &uri;
                }
            }
        }
    }

    async fn poll_file_state(&self, file_name: &str) -> AnalyzerResult<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/{}?key={}",
            file_name, self.api_key
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalyzerError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::UpstreamError { status, body });
        }

        let file: UploadedFile = response
            .json()
            .await
            .map_err(|e| AnalyzerError::RequestFailed(e.to_string()))?;
        Ok(file.state)
    }

    /// Retry exponential backoff (base 5s, factor 2) up to 2 retries, 3
    /// attempts total. Malformed JSON and non-429/503 4xx fail fast.
    async fn generate_with_retry(
        &self,
        prompt: &str,
        file_uri: &str,
        mime_type: &str,
    ) -> AnalyzerResult<Vec<RawShotEvent>> {
        let mut delay = RETRY_BASE;
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            match self.generate_content(prompt, file_uri, mime_type).await {
                Ok(events) => return Ok(events),
                Err(e) if e.is_retryable() && attempt < MAX_RETRIES => {
                    warn!(attempt = attempt + 1, delay_secs = delay.as_secs(), error = %e, "analyzer call failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= RETRY_FACTOR;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(AnalyzerError::RequestFailed("exhausted retries".into())))
    }

    async fn generate_content(
        &self,
        prompt: &str,
        file_uri: &str,
        mime_type: &str,
    ) -> AnalyzerResult<Vec<RawShotEvent>> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::FileData {
                        file_data: FileData {
                            mime_type: mime_type.to_string(),
                            file_uri: file_uri.to_string(),
                        },
                    },
                    Part::Text {
                        text: prompt.to_string(),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalyzerError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::UpstreamError { status, body });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnalyzerError::RequestFailed(e.to_string()))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| AnalyzerError::RequestFailed("no content in analyzer response".into()))?;

        info!(response_len = text.len(), "analyzer returned a response");
        parse_events(text)
    }
}

/// Strip Markdown code fences (```json ... ``` or ``` ... ```) before parsing.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn parse_events(text: &str) -> AnalyzerResult<Vec<RawShotEvent>> {
    let stripped = strip_code_fences(text);
    let events: Vec<RawShotEvent> = serde_json::from_str(stripped)?;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_code_fences_removes_json_fence() {
        let text = "```json\n[{\"TimeStamp\": 1, \"Outcome\": \"make\"}]\n```";
        assert_eq!(
            strip_code_fences(text),
            "[{\"TimeStamp\": 1, \"Outcome\": \"make\"}]"
        );
    }

    #[test]
    fn strip_code_fences_is_noop_without_fence() {
        let text = "[{\"TimeStamp\": 1, \"Outcome\": \"make\"}]";
        assert_eq!(strip_code_fences(text), text);
    }

    #[test]
    fn parse_events_accepts_minimal_schema() {
        let text = r#"[{"TimeStamp": 12, "Outcome": "make"}, {"TimeStamp": 40, "Outcome": "miss"}]"#;
        let events = parse_events(text).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp_start.into_seconds().unwrap(), 12);
    }

    #[test]
    fn parse_events_rejects_malformed_json() {
        let text = "not json at all";
        assert!(parse_events(text).is_err());
    }
}
