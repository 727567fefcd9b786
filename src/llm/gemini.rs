//! Google Gemini `generateContent` client.
//!
//! Gemini splits system instructions out of the message list and calls the
//! assistant role `model`:
//!
//! ```json
//! {
//!   "systemInstruction": { "parts": [{ "text": "You are a storyteller" }] },
//!   "contents": [{ "role": "user", "parts": [{ "text": "..." }] }],
//!   "generationConfig": { "temperature": 0.7 }
//! }
//! ```

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GeneratorConfig, API_KEY_VAR};
use crate::llm::{ChatMessage, LlmClient, LlmError, Role};
use crate::StoryError;

const API_KEY_HEADER: &str = "x-goog-api-key";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Map chat messages onto Gemini's request shape. Multiple system messages are
/// joined into one instruction block.
pub fn build_request(messages: &[ChatMessage], temperature: f32) -> GenerateRequest {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let system_instruction = if system.is_empty() {
        None
    } else {
        Some(Content {
            role: None,
            parts: vec![Part {
                text: Some(system.join("\n\n")),
            }],
        })
    };

    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| Content {
            role: Some(
                match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                }
                .into(),
            ),
            parts: vec![Part {
                text: Some(m.content.clone()),
            }],
        })
        .collect();

    GenerateRequest {
        system_instruction,
        contents,
        generation_config: GenerationConfig { temperature },
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GeminiClient {
    client: Client,
    /// Always `None`: the call blocks until the model answers.
    request_timeout: Option<Duration>,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    /// reqwest's blocking client defaults to a 30s timeout, which a full story
    /// tree can exceed, so it is switched off here.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, LlmError> {
        let request_timeout: Option<Duration> = None;
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            request_timeout,
            api_key: api_key.into(),
            base_url: crate::config::DEFAULT_GEMINI_BASE_URL.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Refuses to build without a credential so no request is ever attempted.
    pub fn from_config(config: &GeneratorConfig) -> Result<Self, StoryError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingCredential(API_KEY_VAR).into());
        }
        Ok(Self::new(&config.api_key, &config.model, config.temperature)?
            .with_base_url(&config.base_url))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// The key travels in the `x-goog-api-key` header, never in the URL, so
    /// transport errors that print the URL cannot leak it.
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl LlmClient for GeminiClient {
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        info!(
            "=== GEMINI CALL: model={} messages={} temperature={} ===",
            self.model,
            messages.len(),
            self.temperature
        );
        for (i, msg) in messages.iter().enumerate() {
            debug!("  msg[{i}] {msg}");
        }

        let request = build_request(messages, self.temperature);
        let response = self
            .client
            .post(self.endpoint())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| e.without_url())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().map_err(|e| e.without_url())?;
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(LlmError::Auth(format!("HTTP {status}: {body}")));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response.json().map_err(|e| e.without_url())?;
        if let Some(reason) = parsed
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            debug!("Finish reason: {reason}");
        }
        let text = parsed.text().ok_or(LlmError::EmptyResponse)?;

        info!("Gemini returned {} chars", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    #[test]
    fn test_build_request_splits_system() {
        let req = build_request(
            &[
                ChatMessage::system("be a storyteller"),
                ChatMessage::user("Create the story with this theme: pirates"),
            ],
            0.7,
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "be a storyteller"
        );
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"].as_array().unwrap().len(), 1);
        assert_eq!(json["contents"][0]["role"], "user");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_assistant_maps_to_model() {
        let req = build_request(&[ChatMessage::assistant("earlier")], 1.0);
        assert!(req.system_instruction.is_none());
        assert_eq!(req.contents[0].role.as_deref(), Some("model"));
    }

    #[test]
    fn test_response_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"title\":"},{"text":"\"x\"}"}]},"finishReason":"STOP"}]}"#;
        let resp: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.text().as_deref(), Some(r#"{"title":"x"}"#));
        assert_eq!(resp.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_response_without_candidates() {
        let resp: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.text().is_none());
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = GeneratorConfig {
            backend: crate::config::Backend::Gemini,
            model: "m".into(),
            api_key: String::new(),
            temperature: 0.7,
            base_url: "http://localhost".into(),
        };
        assert!(matches!(
            GeminiClient::from_config(&config),
            Err(StoryError::Config(ConfigError::MissingCredential(_)))
        ));
    }

    #[test]
    fn test_endpoint_has_no_key() {
        let client = GeminiClient::new("secret", "gemini-1.5-flash-latest", 0.7)
            .unwrap()
            .with_base_url("http://localhost:9000/v1beta/");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
        assert_eq!(client.model(), "gemini-1.5-flash-latest");
    }

    #[test]
    fn test_no_request_timeout() {
        let client = GeminiClient::new("k", "m", 0.7).unwrap();
        assert_eq!(client.request_timeout(), None);
    }

    /// Accept one connection, capture the request, wait `delay`, then reply.
    fn serve_once(delay: Duration, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).unwrap();

            thread::sleep(delay);
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            stream.flush().unwrap();
            head
        });
        (base_url, handle)
    }

    const STORY_BODY: &str =
        r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{}"}]}}]}"#;

    #[test]
    fn test_key_sent_as_header() {
        let (base_url, server) = serve_once(Duration::from_millis(0), STORY_BODY);
        let mut client = GeminiClient::new("header-key", "m", 0.7)
            .unwrap()
            .with_base_url(base_url);
        let text = client.complete(&[ChatMessage::user("hi")]).unwrap();
        assert_eq!(text, "{}");

        let head = server.join().unwrap();
        let request_line = head.lines().next().unwrap();
        assert_eq!(request_line, "POST /models/m:generateContent HTTP/1.1");
        assert!(head.to_lowercase().contains("x-goog-api-key: header-key"));
    }

    #[test]
    #[ignore = "waits past reqwest's 30s default timeout"]
    fn test_slow_model_is_not_cut_off() {
        let (base_url, server) = serve_once(Duration::from_secs(35), STORY_BODY);
        let mut client = GeminiClient::new("k", "m", 0.7)
            .unwrap()
            .with_base_url(base_url);
        assert_eq!(client.complete(&[ChatMessage::user("hi")]).unwrap(), "{}");
        server.join().unwrap();
    }

    #[test]
    fn test_transport_error_does_not_leak_key() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut client = GeminiClient::new("SUPERSECRETKEY", "m", 0.7)
            .unwrap()
            .with_base_url(format!("http://127.0.0.1:{port}"));
        let err = client.complete(&[ChatMessage::user("hi")]).unwrap_err();
        assert!(matches!(err, LlmError::Http(_)));
        let debug = format!("{err:?}");
        let shown = StoryError::from(err).to_string();
        assert!(!shown.contains("SUPERSECRETKEY"), "{shown}");
        assert!(!debug.contains("SUPERSECRETKEY"), "{debug}");
    }
}
