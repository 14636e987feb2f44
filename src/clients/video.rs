//! HTTP client for the frame-interpolation video capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ServiceEndpoint;
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};

use super::{post_json, VideoSynthesizer};

const SERVICE: &str = "video";

/// Client for the image-to-video interpolation service
pub struct VideoClient {
    endpoint: ServiceEndpoint,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct InterpolateRequest<'a> {
    start_image: &'a str,
    end_image: &'a str,
    duration_seconds: u32,
}

#[derive(Debug, Deserialize)]
struct InterpolateResponse {
    video_url: String,
}

impl VideoClient {
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
impl VideoSynthesizer for VideoClient {
    async fn interpolate(
        &self,
        start_frame: &str,
        end_frame: &str,
        duration_s: u32,
    ) -> Result<String> {
        let url = format!("{}/i2v/generate", self.endpoint.base_url);
        let url = url.as_str();

        let response: InterpolateResponse = with_retry(&self.retry, SERVICE, || {
            let request = InterpolateRequest {
                start_image: start_frame,
                end_image: end_frame,
                duration_seconds: duration_s,
            };
            async move {
                post_json(&self.client, SERVICE, url, &self.endpoint.api_key, &request).await
            }
        })
        .await?;

        Ok(response.video_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_request_shape() {
        let request = InterpolateRequest {
            start_image: "img://s1/start",
            end_image: "img://s1/end",
            duration_seconds: 6,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["start_image"], "img://s1/start");
        assert_eq!(json["end_image"], "img://s1/end");
        assert_eq!(json["duration_seconds"], 6);
    }
}
