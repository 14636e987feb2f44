//! HTTP client for the image-generation capability.

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ServiceEndpoint;
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};

use super::{post_json, GeneratedImage, ImageGenerator};

const SERVICE: &str = "image";

/// Client for the image synthesis service
pub struct ImageClient {
    endpoint: ServiceEndpoint,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    style: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    character_ref: Option<&'a str>,
}

impl ImageClient {
    pub fn new(endpoint: ServiceEndpoint, retry: RetryPolicy) -> Self {
        let client = super::http_client(endpoint.timeout_seconds);
        Self {
            endpoint,
            retry,
            client,
        }
    }
}

#[async_trait]
impl ImageGenerator for ImageClient {
    async fn generate(
        &self,
        prompt: &str,
        character_ref: Option<&str>,
        style: &str,
        seed: Option<u64>,
    ) -> Result<GeneratedImage> {
        let url = format!("{}/generate", self.endpoint.base_url);
        let url = url.as_str();

        with_retry(&self.retry, SERVICE, || {
            let request = GenerateRequest {
                prompt,
                style,
                seed,
                character_ref,
            };
            async move {
                post_json(&self.client, SERVICE, url, &self.endpoint.api_key, &request).await
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_surfaces_transient_error() {
        let endpoint = ServiceEndpoint {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "test".to_string(),
            timeout_seconds: 5,
            model: None,
            max_tokens: None,
        };
        let retry = RetryPolicy {
            max_attempts: 1,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1.0,
        };
        let client = ImageClient::new(endpoint, retry);

        // Nothing listens on port 1: the refused connection must come back
        // as a retryable failure, not a panic or a terminal error
        let err = client
            .generate("a knight", None, "SDXL_Niji6", Some(1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_request_omits_absent_fields() {
        let request = GenerateRequest {
            prompt: "moonlit rooftop (start)",
            style: "SDXL_Niji6",
            seed: None,
            character_ref: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("seed").is_none());
        assert!(json.get("character_ref").is_none());

        let request = GenerateRequest {
            seed: Some(2),
            character_ref: Some("lora://akira"),
            ..request
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["seed"], 2);
        assert_eq!(json["character_ref"], "lora://akira");
    }
}
