//! Capability interfaces for the external generation services.
//!
//! Each capability is a narrow contract (prompt/media in, artifact reference
//! out) behind an async trait, so the pipeline can be driven against the real
//! HTTP clients or deterministic fakes in tests. Retry policy lives inside
//! the clients, transparent to the pipeline.

pub mod image;
pub mod llm;
pub mod lora;
pub mod video;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{CharacterRecord, SceneRecord};
use crate::error::{Error, Result};

pub use image::ImageClient;
pub use llm::LlmClient;
pub use lora::LoraClient;
pub use video::VideoClient;

/// Structured breakdown of a narrative text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptBreakdown {
    /// Detected characters, keyed by name
    pub characters: BTreeMap<String, CharacterRecord>,

    /// Scenes in narrative order
    pub scenes: Vec<SceneRecord>,
}

/// One generated image artifact
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedImage {
    /// URL or path of the image
    pub image_url: String,

    /// Opaque generation metadata from the service
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Text understanding and prompt derivation
#[async_trait]
pub trait ScriptAnalyzer: Send + Sync {
    /// Break raw narrative text into characters and ordered scenes
    async fn parse_script(&self, text: &str) -> Result<ScriptBreakdown>;

    /// Derive a visual prompt from a character description
    async fn character_prompt(&self, description: &str) -> Result<String>;

    /// Derive a scene-level visual prompt from setting and cast
    async fn scene_prompt(&self, setting: &str, characters: &[String]) -> Result<String>;
}

/// Image synthesis
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image, optionally biased toward a character reference
    async fn generate(
        &self,
        prompt: &str,
        character_ref: Option<&str>,
        style: &str,
        seed: Option<u64>,
    ) -> Result<GeneratedImage>;

    /// Generate `count` independent candidates, one call per slot with
    /// seed = slot index so each slot is reproducible on its own
    async fn variants(&self, prompt: &str, style: &str, count: usize) -> Result<Vec<String>> {
        let mut candidates = Vec::with_capacity(count);
        for seed in 0..count {
            let image = self
                .generate(prompt, None, style, Some(seed as u64))
                .await?;
            candidates.push(image.image_url);
        }
        Ok(candidates)
    }
}

/// Fine-tune training for character likeness
#[async_trait]
pub trait LoraTrainer: Send + Sync {
    /// Train a model on the given images, returning its artifact reference
    async fn train(&self, images: &[String], character_name: &str) -> Result<String>;
}

/// Start/end-frame video interpolation
#[async_trait]
pub trait VideoSynthesizer: Send + Sync {
    /// Generate a clip bounded by the two keyframes
    async fn interpolate(
        &self,
        start_frame: &str,
        end_frame: &str,
        duration_s: u32,
    ) -> Result<String>;
}

/// Build a reqwest client with the per-service timeout
pub(crate) fn http_client(timeout_seconds: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .unwrap_or_default()
}

/// POST a JSON body with bearer auth and decode a JSON response.
///
/// Failure classification: connect/timeout errors and 429/5xx statuses are
/// transient (retryable); other non-success statuses are terminal; a body
/// that does not decode is a validation error.
pub(crate) async fn post_json<Req, Resp>(
    client: &reqwest::Client,
    service: &str,
    url: &str,
    api_key: &str,
    body: &Req,
) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                Error::transient(service, e)
            } else {
                Error::terminal(service, e)
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let reason = format!("{}: {}", status, text.trim());
        return if status.is_server_error() || status.as_u16() == 429 {
            Err(Error::transient(service, reason))
        } else {
            Err(Error::terminal(service, reason))
        };
    }

    let text = response
        .text()
        .await
        .map_err(|e| Error::transient(service, e))?;

    serde_json::from_str(&text).map_err(|e| {
        Error::validation(service, format!("undecodable response body: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct SeedRecorder {
        seeds: Mutex<Vec<Option<u64>>>,
    }

    #[async_trait]
    impl ImageGenerator for SeedRecorder {
        async fn generate(
            &self,
            prompt: &str,
            _character_ref: Option<&str>,
            _style: &str,
            seed: Option<u64>,
        ) -> Result<GeneratedImage> {
            self.seeds.lock().unwrap().push(seed);
            Ok(GeneratedImage {
                image_url: format!("img://{}/{}", prompt, seed.unwrap_or(0)),
                metadata: None,
            })
        }
    }

    #[tokio::test]
    async fn test_variant_batch_seeds_by_slot() {
        let gen = SeedRecorder {
            seeds: Mutex::new(Vec::new()),
        };

        let candidates = gen.variants("a knight", "SDXL_Niji6", 3).await.unwrap();

        assert_eq!(candidates.len(), 3);
        assert_eq!(
            *gen.seeds.lock().unwrap(),
            vec![Some(0), Some(1), Some(2)]
        );
        assert_eq!(candidates[1], "img://a knight/1");
    }
}
