use std::{pin::Pin, time::Duration};

use log::debug;

use crate::{
    config::GeneratorConfig,
    image_model::{GenerationError, Image, ImageModel},
};

pub mod gemini_api;
use gemini_api::{RequestBody, Transport};

/// Gemini native image generation through `generateContent`.
#[derive(Clone)]
pub struct Gemini<T = reqwest::Client> {
    transport: T,
    endpoint_base: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl Gemini {
    pub fn new(config: &GeneratorConfig) -> Self {
        Self::with_transport(reqwest::Client::new(), config)
    }
}

impl<T> Gemini<T> {
    pub fn with_transport(transport: T, config: &GeneratorConfig) -> Self {
        Self {
            transport,
            endpoint_base: config.endpoint_base.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/{}:generateContent",
            self.endpoint_base.trim_end_matches('/'),
            self.model
        )
    }
}

impl<T: Transport + Sync> ImageModel for Gemini<T> {
    fn get_image<'a>(
        &'a self,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Image, GenerationError>> + Send + 'a>> {
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or(GenerationError::MissingCredential)?;

            let url = self.url();
            let body = RequestBody::for_prompt(prompt);
            debug!("POST {url}");
            let response = self
                .transport
                .post_json(&url, api_key, &body, self.timeout)
                .await?;
            debug!("Response status: {}", response.status);

            gemini_api::parse_response(response)
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}


#[cfg(test)]
mod test {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::testing::*;
    use super::*;
    use crate::image_model::ErrorKind;

    #[tokio::test]
    async fn sends_prompt_with_key_header() {
        let transport = ScriptedTransport::default();
        transport.push_image("aGVsbG8=");
        let gemini = Gemini::with_transport(transport, &config_with_key(Some("secret")));

        let image = gemini.get_image("A red fox").await.unwrap();
        assert_eq!(image.data, b"hello");

        let sent = gemini.transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].url,
            "https://example.test/v1beta/models/image-model:generateContent"
        );
        assert_eq!(sent[0].api_key, "secret");
        assert_eq!(sent[0].timeout, Duration::from_secs(7));
        assert!(sent[0].body.contains(r#""text":"A red fox""#));
    }

    #[tokio::test]
    async fn missing_key_never_hits_the_network() {
        for key in [None, Some(""), Some("  \t")] {
            let gemini = Gemini::with_transport(ScriptedTransport::default(), &config_with_key(key));
            let err = gemini.get_image("anything").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingCredential);
            assert_eq!(gemini.transport.calls(), 0);
        }
    }

    #[tokio::test]
    async fn rate_limited() {
        let transport = ScriptedTransport::default();
        transport.push_json(
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": {"code": 429, "message": "Resource exhausted"}}),
        );
        let gemini = Gemini::with_transport(transport, &config_with_key(Some("k")));

        match gemini.get_image("p").await.unwrap_err() {
            GenerationError::Http { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("Resource exhausted"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_passes_through() {
        let transport = ScriptedTransport::default();
        transport.push(Err(GenerationError::Timeout(Duration::from_secs(7))));
        let gemini = Gemini::with_transport(transport, &config_with_key(Some("k")));

        let err = gemini.get_image("p").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
