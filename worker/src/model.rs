use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use youtube::{RefLink, YoutubeClient, YoutubeError};

use crate::config::ModelConfig;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL_TIMEOUT: Duration = Duration::from_secs(120);
const QUESTION_COUNT: u32 = 5;
const OPTION_COUNT: u32 = 4;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Youtube(#[from] YoutubeError),
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("model API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("unexpected model response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// What the model produced for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedVideo {
    pub summary: String,
    pub questions: Vec<QuizQuestion>,
    pub references: Vec<RefLink>,
}

#[derive(Debug, Deserialize)]
struct GeneratedContent {
    summary: String,
    questions: Vec<QuizQuestion>,
}

#[derive(Debug, Deserialize)]
struct RemoteResult {
    summary: String,
    #[serde(default)]
    mcqs: Vec<QuizQuestion>,
}

pub enum ModelBackend {
    Gemini {
        http: reqwest::Client,
        base_url: String,
        api_key: String,
        model: String,
    },
    Remote {
        http: reqwest::Client,
        api_url: String,
    },
}

impl ModelBackend {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder().timeout(MODEL_TIMEOUT).build()?;

        Ok(match config {
            ModelConfig::Gemini { api_key, model } => ModelBackend::Gemini {
                http,
                base_url: GEMINI_API_URL.to_string(),
                api_key: api_key.clone(),
                model: model.clone(),
            },
            ModelConfig::Remote { api_url } => ModelBackend::Remote {
                http,
                api_url: api_url.clone(),
            },
        })
    }

    pub fn name(&self) -> &str {
        match self {
            ModelBackend::Gemini { model, .. } => model,
            ModelBackend::Remote { .. } => "remote",
        }
    }

    /// Summarise a video and write its quiz.
    ///
    /// The Gemini backend works from the transcript and takes reference
    /// links from the video description; the remote backend does all of it
    /// server side and returns no links.
    pub async fn process(&self, youtube_client: &YoutubeClient, video_url: &str) -> Result<ProcessedVideo, ModelError> {
        match self {
            ModelBackend::Gemini { http, base_url, api_key, model } => {
                let video_id = youtube::video_id_from_input(video_url);

                let transcript = youtube::transcript::fetch_transcript(youtube_client.http(), &video_id).await?;
                let description = youtube_client.video_description(&video_id).await;
                let references = youtube::extract_links(&description);

                tracing::debug!(
                    "Transcript for {}: {} characters, {} reference links",
                    video_id,
                    transcript.len(),
                    references.len()
                );

                let response = http
                    .post(format!("{}/models/{}:generateContent", base_url, model))
                    .header("x-goog-api-key", api_key.as_str())
                    .json(&gemini_request(&transcript))
                    .send()
                    .await?;

                let body = api_response(response).await?;
                let generated = parse_gemini_response(&body)?;

                Ok(ProcessedVideo {
                    summary: generated.summary,
                    questions: generated.questions,
                    references,
                })
            }
            ModelBackend::Remote { http, api_url } => {
                let response = http
                    .get(format!("{}/transcript", api_url))
                    .query(&[("yt_link", video_url)])
                    .send()
                    .await?;

                let body = api_response(response).await?;
                let result = parse_remote_response(body)?;

                Ok(ProcessedVideo {
                    summary: result.summary,
                    questions: result.mcqs,
                    references: Vec::new(),
                })
            }
        }
    }
}

async fn api_response(response: reqwest::Response) -> Result<Value, ModelError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ModelError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

fn prompt(transcript: &str) -> String {
    format!(
        "Based on this YouTube video transcript, please generate a summary and {} quiz questions with {} options each, correct answers, and explanations:\n\n{}",
        QUESTION_COUNT, OPTION_COUNT, transcript
    )
}

// JSON mode with a response schema, so the reply text is the object itself
fn gemini_request(transcript: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt(transcript) }]
        }],
        "generationConfig": {
            "temperature": 1,
            "topP": 0.95,
            "topK": 40,
            "maxOutputTokens": 8192,
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "summary": { "type": "STRING" },
                    "questions": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "question": { "type": "STRING" },
                                "options": {
                                    "type": "ARRAY",
                                    "items": { "type": "STRING" },
                                    "minItems": OPTION_COUNT,
                                    "maxItems": OPTION_COUNT
                                },
                                "answer": { "type": "STRING" },
                                "explanation": { "type": "STRING" }
                            },
                            "required": ["question", "options", "answer", "explanation"]
                        },
                        "minItems": QUESTION_COUNT,
                        "maxItems": QUESTION_COUNT
                    },
                    "links": {
                        "type": "ARRAY",
                        "items": {
                            "type": "OBJECT",
                            "properties": {
                                "url": { "type": "STRING" },
                                "title": { "type": "STRING" }
                            },
                            "required": ["url"]
                        }
                    }
                },
                "required": ["summary", "questions", "links"]
            }
        }
    })
}

fn parse_gemini_response(body: &Value) -> Result<GeneratedContent, ModelError> {
    let text = body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidResponse("no candidate text in response".to_string()))?;

    serde_json::from_str(text).map_err(|err| ModelError::InvalidResponse(format!("candidate is not the expected JSON: {}", err)))
}

// the model service answers either with the object or with the object serialised into a JSON string
fn parse_remote_response(body: Value) -> Result<RemoteResult, ModelError> {
    let body = match body {
        Value::String(text) => serde_json::from_str(&text)
            .map_err(|err| ModelError::InvalidResponse(format!("response string is not JSON: {}", err)))?,
        body => body,
    };

    serde_json::from_value(body).map_err(|err| ModelError::InvalidResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Answers a single connection with the canned status and body.
    async fn serve_once(status: u16, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16384];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {} STATUS\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn questions() -> Value {
        json!([
            { "question": "What does the borrow checker enforce?", "options": ["a", "b", "c", "d"], "answer": "a", "explanation": "aliasing xor mutation" },
            { "question": "Q2", "options": ["a", "b", "c", "d"], "answer": "b", "explanation": "e2" },
            { "question": "Q3", "options": ["a", "b", "c", "d"], "answer": "c", "explanation": "e3" },
            { "question": "Q4", "options": ["a", "b", "c", "d"], "answer": "d", "explanation": "e4" },
            { "question": "Q5", "options": ["a", "b", "c", "d"], "answer": "a", "explanation": "e5" }
        ])
    }

    #[test]
    fn request_asks_for_five_questions_of_four_options() {
        let request = gemini_request("ownership and borrowing");

        let schema = &request["generationConfig"]["responseSchema"];
        assert_eq!(schema["properties"]["questions"]["minItems"], 5);
        assert_eq!(schema["properties"]["questions"]["maxItems"], 5);
        assert_eq!(schema["properties"]["questions"]["items"]["properties"]["options"]["maxItems"], 4);
        assert_eq!(request["generationConfig"]["responseMimeType"], "application/json");

        let text = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Based on this YouTube video transcript"));
        assert!(text.ends_with("ownership and borrowing"));
    }

    #[test]
    fn gemini_candidate_text_is_parsed() {
        let generated = json!({
            "summary": "Ownership in Rust",
            "questions": questions(),
            "links": [{ "url": "https://made.up/by/the/model" }]
        });
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": generated.to_string() }] } }]
        });

        let parsed = parse_gemini_response(&body).unwrap();
        assert_eq!(parsed.summary, "Ownership in Rust");
        assert_eq!(parsed.questions.len(), 5);
        assert_eq!(parsed.questions[0].explanation, "aliasing xor mutation");
    }

    #[test]
    fn gemini_text_that_is_not_json_is_an_error() {
        let body = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Sure! Here is your quiz:" }] } }]
        });

        assert!(matches!(parse_gemini_response(&body), Err(ModelError::InvalidResponse(_))));
        assert!(matches!(parse_gemini_response(&json!({})), Err(ModelError::InvalidResponse(_))));
    }

    #[test]
    fn remote_response_as_object_or_string() {
        let object = json!({ "summary": "s", "mcqs": questions() });

        let parsed = parse_remote_response(object.clone()).unwrap();
        assert_eq!(parsed.mcqs.len(), 5);

        let parsed = parse_remote_response(Value::String(object.to_string())).unwrap();
        assert_eq!(parsed.summary, "s");
    }

    #[tokio::test]
    async fn remote_backend_round_trip() {
        let body = json!({ "summary": "Traits", "mcqs": questions() }).to_string();
        let api_url = serve_once(200, body).await;

        let backend = ModelBackend::new(&ModelConfig::Remote { api_url }).unwrap();
        let youtube = YoutubeClient::new(None).unwrap();

        let processed = backend
            .process(&youtube, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap();

        assert_eq!(processed.summary, "Traits");
        assert_eq!(processed.questions.len(), 5);
        assert!(processed.references.is_empty());
    }

    #[tokio::test]
    async fn remote_backend_error_status() {
        let api_url = serve_once(500, r#"{"detail":"transcript disabled"}"#.to_string()).await;

        let backend = ModelBackend::new(&ModelConfig::Remote { api_url }).unwrap();
        let youtube = YoutubeClient::new(None).unwrap();

        let err = backend
            .process(&youtube, "https://www.youtube.com/watch?v=dQw4w9WgXcQ")
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Api { status: 500, .. }));
    }
}
