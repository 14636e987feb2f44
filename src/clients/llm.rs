//! Chat-completion client for text understanding and prompt derivation.
//!
//! Speaks an OpenAI-compatible `/chat/completions` endpoint. Script parsing
//! asks for a strict JSON shape and extracts the first top-level object from
//! the reply, since models like to wrap JSON in prose or code fences.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServiceEndpoint;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryPolicy};

use super::{post_json, ScriptAnalyzer, ScriptBreakdown};

const SERVICE: &str = "llm";

const PARSE_SYSTEM_PROMPT: &str = r#"You are a professional anime screenwriter. Break the given narrative text into a structured scene script.

Requirements:
1. Extract every character that appears, with name and a short description (appearance, personality).
2. Split the story into scenes. Each scene has:
   - a scene id (scene_01, scene_02, ...)
   - a setting (place, time, mood)
   - the list of characters present
   - a camera spec: shot type (push_in, pull_out, pan, close_up, wide_shot, ...) and duration in seconds
   - dialogue lines, if any

Reply with JSON only, in exactly this shape:
{
  "characters": {
    "<name>": {"description": "<appearance, personality>"}
  },
  "scenes": [
    {
      "id": "scene_01",
      "setting": "<description>",
      "characters": ["<name>"],
      "camera": {"type": "<shot type>", "duration_s": 6},
      "dialogue": {"<name>": "<line>"}
    }
  ]
}"#;

const CHARACTER_PROMPT_SYSTEM: &str = "You are an expert at writing AI image prompts. Convert the \
character description into a detailed anime-style image prompt in English: art style (anime \
style), features, outfit, expression. Output the prompt only, nothing else.";

const SCENE_PROMPT_SYSTEM: &str = "You are an expert at writing AI image prompts. Convert the \
scene description into a detailed anime-style image prompt in English: art style (anime style), \
scenery, lighting, atmosphere. Output the prompt only, nothing else.";

/// Client for the chat-completion capability
pub struct LlmClient {
    endpoint: ServiceEndpoint,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl LlmClient {
    pub fn new(endpoint: ServiceEndpoint, retry: RetryPolicy) -> Self {
        let client = super::http_client(endpoint.timeout_seconds);
        Self {
            endpoint,
            retry,
            client,
        }
    }

    async fn chat(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint.base_url);
        let url = url.as_str();
        let model = self.endpoint.model.as_deref().unwrap_or("gpt-4o-mini");
        let max_tokens = max_tokens.min(self.endpoint.max_tokens.unwrap_or(u32::MAX));

        // Each attempt gets a future owning its own request body
        let response: ChatResponse = with_retry(&self.retry, SERVICE, || {
            let request = ChatRequest {
                model,
                messages: vec![
                    ChatMessage {
                        role: "system",
                        content: system,
                    },
                    ChatMessage {
                        role: "user",
                        content: user,
                    },
                ],
                max_tokens,
                temperature,
            };
            async move {
                post_json(&self.client, SERVICE, url, &self.endpoint.api_key, &request).await
            }
        })
        .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::validation(SERVICE, "reply contained no choices"))?;

        Ok(content.trim().to_string())
    }
}

/// Extract the first top-level JSON object from a model reply
fn extract_json(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&content[start..=end])
}

#[async_trait]
impl ScriptAnalyzer for LlmClient {
    async fn parse_script(&self, text: &str) -> Result<ScriptBreakdown> {
        let user = format!("Analyze the following narrative text:\n\n{}", text);
        let content = self.chat(PARSE_SYSTEM_PROMPT, &user, 0.3, 4096).await?;

        let json = extract_json(&content)
            .ok_or_else(|| Error::validation(SERVICE, "no JSON object in reply"))?;

        let breakdown: ScriptBreakdown = serde_json::from_str(json)
            .map_err(|e| Error::validation(SERVICE, format!("malformed script JSON: {}", e)))?;

        debug!(
            characters = breakdown.characters.len(),
            scenes = breakdown.scenes.len(),
            "Parsed script breakdown"
        );
        Ok(breakdown)
    }

    async fn character_prompt(&self, description: &str) -> Result<String> {
        let user = format!("Character description: {}", description);
        self.chat(CHARACTER_PROMPT_SYSTEM, &user, 0.7, 512).await
    }

    async fn scene_prompt(&self, setting: &str, characters: &[String]) -> Result<String> {
        let user = format!(
            "Scene setting: {}\nCharacters present: {}",
            setting,
            characters.join(", ")
        );
        self.chat(SCENE_PROMPT_SYSTEM, &user, 0.7, 512).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"characters\": {}, \"scenes\": []}\n```";
        assert_eq!(
            extract_json(reply),
            Some("{\"characters\": {}, \"scenes\": []}")
        );
    }

    #[test]
    fn test_extract_json_absent() {
        assert_eq!(extract_json("sorry, I cannot help with that"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_breakdown_parses_model_reply_shape() {
        let json = r#"{
            "characters": {
                "Akira": {"description": "silver hair, stoic"}
            },
            "scenes": [
                {
                    "id": "scene_01",
                    "setting": "abandoned shrine at dusk",
                    "characters": ["Akira"],
                    "camera": {"type": "push_in", "duration_s": 6},
                    "dialogue": {"Akira": "So it begins."}
                }
            ]
        }"#;

        let breakdown: ScriptBreakdown = serde_json::from_str(json).unwrap();
        assert_eq!(breakdown.characters["Akira"].description, "silver hair, stoic");
        assert_eq!(breakdown.scenes[0].camera.duration_s, 6);
        assert!(breakdown.scenes[0].assets.video_mp4.is_none());
    }
}
