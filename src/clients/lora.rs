//! HTTP client for the fine-tune training capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceEndpoint;
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};

use super::{post_json, LoraTrainer};

const SERVICE: &str = "lora";

/// Training steps submitted with every job
const TRAINING_STEPS: u32 = 1000;

/// Client for the fine-tune training service
pub struct LoraClient {
    endpoint: ServiceEndpoint,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TrainRequest<'a> {
    images: &'a [String],
    name: &'a str,
    steps: u32,
}

#[derive(Debug, Deserialize)]
struct TrainResponse {
    lora_path: String,
}

impl LoraClient {
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
impl LoraTrainer for LoraClient {
    async fn train(&self, images: &[String], character_name: &str) -> Result<String> {
        let url = format!("{}/train", self.endpoint.base_url);
        let url = url.as_str();

        let response: TrainResponse = with_retry(&self.retry, SERVICE, || {
            let request = TrainRequest {
                images,
                name: character_name,
                steps: TRAINING_STEPS,
            };
            async move {
                post_json(&self.client, SERVICE, url, &self.endpoint.api_key, &request).await
            }
        })
        .await?;

        Ok(response.lora_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_request_shape() {
        let images = vec!["img://akira/1".to_string()];
        let request = TrainRequest {
            images: &images,
            name: "Akira",
            steps: TRAINING_STEPS,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["name"], "Akira");
        assert_eq!(json["steps"], 1000);
        assert_eq!(json["images"][0], "img://akira/1");
    }
}
