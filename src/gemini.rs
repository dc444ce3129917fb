//! Gemini REST client.
//!
//! Both operations go through `models/{model}:generateContent`. Text uses a
//! plain single-part request; image generation asks for mixed TEXT+IMAGE
//! output with fixed safety thresholds and picks the first inline image out
//! of the multi-part reply.

use crate::credential_store::Credential;
use crate::error::ProviderError;
use crate::generation_client::{GeneratedImage, GenerationClient};
use crate::http_client::{HttpClient, HttpResponse, ReqwestHttpClient};
use crate::prompts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const API_VERSION: &str = "v1beta";
pub const TEXT_MODEL_ID: &str = "gemini-1.5-flash-latest";
pub const IMAGE_MODEL_ID: &str = "gemini-2.0-flash-preview-image-generation";

const INVALID_RESPONSE: &str = "Invalid response structure from Gemini API.";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];
const SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

pub struct GeminiClient<H: HttpClient = ReqwestHttpClient> {
    http: H,
    api_base: String,
}

impl GeminiClient<ReqwestHttpClient> {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self::with_http_client(ReqwestHttpClient::new(), api_base)
    }
}

impl<H: HttpClient> GeminiClient<H> {
    pub fn with_http_client(http: H, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, model: &str, credential: &Credential) -> String {
        let key: String =
            url::form_urlencoded::byte_serialize(credential.expose().as_bytes()).collect();
        format!(
            "{}/{}/models/{}:generateContent?key={}",
            self.api_base, API_VERSION, model, key
        )
    }

    async fn post(
        &self,
        model: &str,
        credential: &Credential,
        body: &(impl Serialize + Sync),
    ) -> Result<GenerateContentResponse, ProviderError> {
        let body = serde_json::to_value(body).map_err(|e| ProviderError::transport(e.to_string()))?;
        let url = self.endpoint(model, credential);

        debug!("POST generateContent for model {}", model);
        let response = self
            .http
            .post_json(&url, &[("Content-Type", "application/json")], &body)
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        if !response.is_success() {
            let err = error_from_response(&response);
            warn!("Gemini {} returned {}: {}", model, response.status, err);
            return Err(err);
        }

        serde_json::from_str(&response.body).map_err(|e| {
            warn!("Failed to parse Gemini response: {}", e);
            ProviderError::api(Some(response.status), INVALID_RESPONSE)
        })
    }
}

/// Prefers the provider's `error.message` over a generic status message.
fn error_from_response(response: &HttpResponse) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(&response.body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP error! status: {}", response.status));
    ProviderError::api(Some(response.status), message)
}

#[async_trait]
impl<H: HttpClient> GenerationClient for GeminiClient<H> {
    async fn generate_text(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = TextRequest {
            contents: vec![Content::text(prompt)],
        };
        let response = self.post(TEXT_MODEL_ID, credential, &request).await?;
        let text = response.into_text()?;
        info!("Generated {} characters of text", text.chars().count());
        Ok(text)
    }

    async fn generate_image(
        &self,
        credential: &Credential,
        prompt: &str,
    ) -> Result<GeneratedImage, ProviderError> {
        let request = ImageRequest::new(&prompts::image_prompt(prompt));
        let response = self.post(IMAGE_MODEL_ID, credential, &request).await?;
        let image = response.into_first_image()?;
        info!("Generated {} image ({} base64 bytes)", image.mime_type, image.data.len());
        Ok(image)
    }
}

// Request types

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<RequestPart>,
}

impl Content {
    fn text(text: &str) -> Self {
        Self {
            parts: vec![RequestPart {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct TextRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    contents: Vec<Content>,
    generation_config: ImageGenerationConfig,
    #[serde(rename = "safetySettings")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize)]
struct ImageGenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

impl ImageRequest {
    fn new(prompt: &str) -> Self {
        Self {
            contents: vec![Content::text(prompt)],
            generation_config: ImageGenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
            safety_settings: SAFETY_CATEGORIES
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: SAFETY_THRESHOLD,
                })
                .collect(),
        }
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Option<Vec<ResponsePart>>,
}

/// One part of a multi-part reply.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Image {
        #[serde(rename = "inlineData", alias = "inline_data")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

impl GenerateContentResponse {
    fn into_parts(self) -> Result<Vec<ResponsePart>, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ProviderError::api(
                None,
                format!("Response was blocked due to {}", reason),
            ));
        }
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts)
            .ok_or_else(|| ProviderError::api(None, INVALID_RESPONSE))
    }

    fn into_text(self) -> Result<String, ProviderError> {
        let text: String = self
            .into_parts()?
            .into_iter()
            .filter_map(|part| match part {
                ResponsePart::Text { text } => Some(text),
                _ => None,
            })
            .collect();
        if text.is_empty() {
            return Err(ProviderError::api(None, "Gemini returned no text."));
        }
        Ok(text)
    }

    fn into_first_image(self) -> Result<GeneratedImage, ProviderError> {
        self.into_parts()?
            .into_iter()
            .find_map(|part| match part {
                ResponsePart::Image { inline_data } if !inline_data.data.is_empty() => Some(
                    GeneratedImage::new(inline_data.mime_type, inline_data.data),
                ),
                _ => None,
            })
            .ok_or_else(|| ProviderError::api(None, "Gemini returned no image data."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// HTTP client that replays scripted responses and records requests.
    struct ScriptedHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        requests: Mutex<Vec<(String, serde_json::Value)>>,
    }

    impl ScriptedHttpClient {
        fn new(responses: Vec<Result<HttpResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn replying(status: u16, body: &str) -> Self {
            Self::new(vec![Ok(HttpResponse::new(status, body))])
        }

        fn requests(&self) -> Vec<(String, serde_json::Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedHttpClient {
        async fn post_json(
            &self,
            url: &str,
            _headers: &[(&str, &str)],
            body: &serde_json::Value,
        ) -> Result<HttpResponse> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted response left")
        }
    }

    fn credential() -> Credential {
        Credential::new("test-key").unwrap()
    }

    fn client(http: ScriptedHttpClient) -> GeminiClient<ScriptedHttpClient> {
        GeminiClient::with_http_client(http, "https://example.test/")
    }

    const IMAGE_REPLY: &str = r#"{
        "candidates": [{
            "content": {
                "parts": [
                    {"text": "作成しました"},
                    {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                    {"inlineData": {"mimeType": "image/png", "data": "c2Vjb25k"}}
                ]
            },
            "finishReason": "STOP"
        }]
    }"#;

    #[tokio::test]
    async fn test_generate_text_returns_joined_text_parts() {
        let http = ScriptedHttpClient::replying(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"週末は"},{"text":"公園へ"}]}}]}"#,
        );
        let client = client(http);

        let text = client.generate_text(&credential(), "prompt").await.unwrap();

        assert_eq!(text, "週末は公園へ");
    }

    #[tokio::test]
    async fn test_generate_text_request_shape_and_url() {
        let client = client(ScriptedHttpClient::replying(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"ok"}]}}]}"#,
        ));

        client.generate_text(&credential(), "hello").await.unwrap();

        let requests = client.http.requests();
        assert_eq!(requests.len(), 1);
        let (url, body) = &requests[0];
        assert_eq!(
            url,
            "https://example.test/v1beta/models/gemini-1.5-flash-latest:generateContent?key=test-key"
        );
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert!(body.get("generation_config").is_none());
    }

    #[tokio::test]
    async fn test_generate_image_request_shape() {
        let client = client(ScriptedHttpClient::replying(200, IMAGE_REPLY));

        client
            .generate_image(&credential(), "A serene park picnic")
            .await
            .unwrap();

        let (url, body) = &client.http.requests()[0];
        assert!(url.contains(
            "/v1beta/models/gemini-2.0-flash-preview-image-generation:generateContent?key="
        ));
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("「A serene park picnic」"));
        assert_eq!(
            body["generation_config"]["response_modalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
        let safety = body["safetySettings"].as_array().unwrap();
        assert_eq!(safety.len(), 4);
        assert!(
            safety
                .iter()
                .all(|s| s["threshold"] == "BLOCK_MEDIUM_AND_ABOVE")
        );
        assert_eq!(safety[1]["category"], "HARM_CATEGORY_HATE_SPEECH");
    }

    #[tokio::test]
    async fn test_generate_image_picks_first_inline_image() {
        let client = client(ScriptedHttpClient::replying(200, IMAGE_REPLY));

        let image = client.generate_image(&credential(), "x").await.unwrap();

        assert_eq!(image, GeneratedImage::new("image/png", "iVBORw0KGgo="));
    }

    #[tokio::test]
    async fn test_generate_image_without_image_part_fails() {
        let client = client(ScriptedHttpClient::replying(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"sorry, text only"}]}}]}"#,
        ));

        let err = client.generate_image(&credential(), "x").await.unwrap_err();

        assert!(err.message.contains("no image data"));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_generate_image_without_parts_array_fails() {
        let client = client(ScriptedHttpClient::replying(
            200,
            r#"{"candidates":[{"content":{}}]}"#,
        ));

        let err = client.generate_image(&credential(), "x").await.unwrap_err();

        assert_eq!(
            err.message,
            "[GoogleGenerativeAI Error]: Invalid response structure from Gemini API."
        );
    }

    #[tokio::test]
    async fn test_error_prefers_provider_message() {
        let client = client(ScriptedHttpClient::replying(
            400,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        ));

        let err = client.generate_text(&credential(), "x").await.unwrap_err();

        assert_eq!(err.status, Some(400));
        assert_eq!(
            err.message,
            "[GoogleGenerativeAI Error]: API key not valid. Please pass a valid API key."
        );
    }

    #[tokio::test]
    async fn test_error_falls_back_to_status_message() {
        let client = client(ScriptedHttpClient::replying(502, "<html>Bad Gateway</html>"));

        let err = client.generate_image(&credential(), "x").await.unwrap_err();

        assert_eq!(err.message, "[GoogleGenerativeAI Error]: HTTP error! status: 502");
    }

    #[tokio::test]
    async fn test_429_is_rate_limited() {
        let client = client(ScriptedHttpClient::replying(
            429,
            r#"{"error":{"message":"Resource has been exhausted (e.g. check quota)."}}"#,
        ));

        let err = client.generate_text(&credential(), "x").await.unwrap_err();

        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_transport_failure_is_provider_error() {
        let client = client(ScriptedHttpClient::new(vec![Err(anyhow::anyhow!(
            "connection refused"
        ))]));

        let err = client.generate_text(&credential(), "x").await.unwrap_err();

        assert_eq!(err.status, None);
        assert!(err.message.ends_with("connection refused"));
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_reported() {
        let client = client(ScriptedHttpClient::replying(
            200,
            r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#,
        ));

        let err = client.generate_text(&credential(), "x").await.unwrap_err();

        assert!(err.message.contains("blocked due to SAFETY"));
    }

    #[test]
    fn test_credential_is_url_encoded_in_endpoint() {
        let client = client(ScriptedHttpClient::new(vec![]));
        let url = client.endpoint("m", &Credential::new("a+b/c").unwrap());
        assert!(url.ends_with(":generateContent?key=a%2Bb%2Fc"));
    }

    #[test]
    fn test_response_parts_parse_into_variants() {
        let parts: Vec<ResponsePart> = serde_json::from_str(
            r#"[{"text":"t"},{"inlineData":{"mimeType":"image/png","data":"AA=="}},{"functionCall":{}}]"#,
        )
        .unwrap();
        assert!(matches!(parts[0], ResponsePart::Text { .. }));
        assert!(matches!(parts[1], ResponsePart::Image { .. }));
        assert!(matches!(parts[2], ResponsePart::Other(_)));
    }
}
