use std::{pin::Pin, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use log::debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::image_model::{GenerationError, Image};

/// How much of an error body is kept for diagnostics
pub const BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<Modality>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

impl RequestBody {
    /// A single-turn request that allows the model to answer with text and an image.
    pub fn for_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![TextPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec![Modality::Text, Modality::Image],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub text: Option<String>,
    #[serde(alias = "inline_data")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(alias = "mime_type")]
    pub mime_type: Option<String>,
    /// base64
    #[serde(default)]
    pub data: String,
}

#[derive(Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// The HTTP side of a `generateContent` call. Implemented by `reqwest::Client`;
/// tests plug in scripted responses.
pub trait Transport {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        api_key: &'a str,
        body: &'a RequestBody,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, GenerationError>> + Send + 'a>>;
}

impl Transport for reqwest::Client {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        api_key: &'a str,
        body: &'a RequestBody,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<RawResponse, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let resp = self
                .post(url)
                .timeout(timeout)
                .header("x-goog-api-key", api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| request_error(e, timeout))?;

            let status = resp.status();
            let body = resp.bytes().await.map_err(|e| request_error(e, timeout))?;
            Ok(RawResponse { status, body })
        })
    }
}

fn request_error(err: reqwest::Error, timeout: Duration) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(timeout)
    } else {
        GenerationError::Network(err.to_string())
    }
}

/// Turns a `generateContent` response into the first inline image it carries.
pub fn parse_response(response: RawResponse) -> Result<Image, GenerationError> {
    if !response.status.is_success() {
        let body = String::from_utf8_lossy(&response.body);
        return Err(GenerationError::Http {
            status: response.status.as_u16(),
            body: body.chars().take(BODY_PREVIEW_CHARS).collect(),
        });
    }

    let parsed: GenerateResponse = serde_json::from_slice(&response.body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or(GenerationError::NoCandidates)?;
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    for text in parts.iter().filter_map(|p| p.text.as_deref()) {
        debug!("Model text: {text}");
    }

    let inline = parts
        .into_iter()
        .filter_map(|p| p.inline_data)
        .find(|d| !d.data.is_empty())
        .ok_or(GenerationError::NoImageData)?;

    let data = STANDARD
        .decode(inline.data.as_bytes())
        .map_err(|e| GenerationError::InvalidImageData(e.to_string()))?;

    Ok(Image {
        data,
        mime_type: inline.mime_type,
    })
}

#[cfg(test)]
mod test {
    use expect_test::expect;
    use serde_json::json;
    use tokio::{io::AsyncReadExt, net::TcpListener, sync::oneshot};

    use crate::image_model::ErrorKind;

    use super::*;

    fn ok(body: serde_json::Value) -> RawResponse {
        RawResponse {
            status: StatusCode::OK,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn request_serialization() {
        let body = RequestBody::for_prompt("A lighthouse at dusk");
        let expect = expect![[
            r#"{"contents":[{"parts":[{"text":"A lighthouse at dusk"}]}],"generationConfig":{"responseModalities":["TEXT","IMAGE"]}}"#
        ]];
        expect.assert_eq(&serde_json::to_string(&body).unwrap());
    }

    #[test]
    fn decodes_first_inline_image() {
        let resp = ok(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}},
                        {"inlineData": {"mimeType": "image/png", "data": "d29ybGQ="}}
                    ]
                }
            }]
        }));

        let image = parse_response(resp).unwrap();
        assert_eq!(image.data, b"hello");
        assert_eq!(image.mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn skips_inline_parts_without_data() {
        let resp = ok(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"inlineData": {"mimeType": "image/png", "data": ""}},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                    ]
                }
            }]
        }));

        assert_eq!(parse_response(resp).unwrap().data, b"hello");
    }

    #[test]
    fn empty_candidates() {
        let err = parse_response(ok(json!({"candidates": []}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoCandidates);

        let err = parse_response(ok(json!({}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoCandidates);
    }

    #[test]
    fn text_only_candidate() {
        let resp = ok(json!({
            "candidates": [{"content": {"parts": [{"text": "I can't draw that"}]}}]
        }));
        assert_eq!(parse_response(resp).unwrap_err().kind(), ErrorKind::NoImageData);

        let resp = ok(json!({"candidates": [{"finishReason": "SAFETY"}]}));
        assert_eq!(parse_response(resp).unwrap_err().kind(), ErrorKind::NoImageData);
    }

    #[test]
    fn only_first_candidate_is_searched() {
        let resp = ok(json!({
            "candidates": [
                {"content": {"parts": [{"text": "nothing"}]}},
                {"content": {"parts": [{"inlineData": {"data": "aGVsbG8="}}]}}
            ]
        }));
        assert_eq!(parse_response(resp).unwrap_err().kind(), ErrorKind::NoImageData);
    }

    #[test]
    fn error_status_keeps_truncated_body() {
        let resp = RawResponse {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: Bytes::from("x".repeat(1000)),
        };

        match parse_response(resp).unwrap_err() {
            GenerationError::Http { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body.len(), BODY_PREVIEW_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn garbage_body() {
        let resp = RawResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(b"<html>oops</html>"),
        };
        assert_eq!(
            parse_response(resp).unwrap_err().kind(),
            ErrorKind::MalformedResponse
        );
    }

    #[test]
    fn invalid_base64() {
        let resp = ok(json!({
            "candidates": [{"content": {"parts": [{"inlineData": {"data": "not base64!"}}]}}]
        }));
        assert_eq!(
            parse_response(resp).unwrap_err().kind(),
            ErrorKind::InvalidImageData
        );
    }

    #[tokio::test]
    async fn reqwest_transport_times_out_and_sends_headers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (head_tx, head_rx) = oneshot::channel();

        // accepts, reads the request head and then never answers
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let _ = head_tx.send(String::from_utf8_lossy(&request).to_lowercase());
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let url = format!("http://{addr}/models/image-model:generateContent");
        let body = RequestBody::for_prompt("A lighthouse");
        let err = client
            .post_json(&url, "secret-key", &body, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let head = head_rx.await.unwrap();
        assert!(head.starts_with("post /models/image-model:generatecontent http/1.1"));
        assert!(head.contains("x-goog-api-key: secret-key"));
        assert!(head.contains("content-type: application/json"));

        server.abort();
    }
}
