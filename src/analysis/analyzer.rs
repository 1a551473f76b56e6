// Free-text analysis through a generative text service
//
// The analyzer is a best-effort annotator: any call-level failure (timeout,
// transport error, unusable reply) collapses into the canonical
// all-placeholder result rather than an error. The transcript itself stays
// valid either way.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::result::{extract_analysis, AnalysisResult};
use crate::config::AnalysisConfig;

/// Seam for the generative-text capability. Structurally infallible.
#[async_trait]
pub trait Analyze: Send + Sync {
    async fn analyze(&self, text: &str, context: Option<&str>) -> AnalysisResult;
}

/// Chat-completions client for the configured generative text service
pub struct ChatAnalyzer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    content: String,
}

impl ChatAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build analysis HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    fn build_prompt(text: &str, context: Option<&str>) -> String {
        let context_line = context
            .map(|c| format!("Context: {}\n\n", c))
            .unwrap_or_default();

        format!(
            "Analyze the following text, which was transcribed from an audio \
             recording of an animal observation session:\n\n\
             \"{}\"\n\n\
             {}\
             Extract and structure the information as JSON with exactly these fields:\n\
             1. behavior_state - description of the animal's behavior and condition (string or null)\n\
             2. measurements - object with keys: weight, temperature, height, other_measurements\n\
             3. feeding_details - object with keys: food_type, quantity, feeding_time, appetite\n\
             4. relationships - object with keys: interactions, social_behavior, dominance, conflicts\n\n\
             Use null for anything the text does not mention. \
             Reply with JSON only, no additional commentary.",
            text, context_line
        )
    }

    async fn request_reply(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("analysis request failed")?
            .error_for_status()
            .context("analysis service returned an error status")?;

        let body: ChatResponse = response
            .json()
            .await
            .context("failed to parse analysis service response")?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("analysis service returned no choices"))
    }
}

#[async_trait]
impl Analyze for ChatAnalyzer {
    async fn analyze(&self, text: &str, context: Option<&str>) -> AnalysisResult {
        let prompt = Self::build_prompt(text, context);

        match self.request_reply(&prompt).await {
            Ok(reply) => {
                debug!("Analysis reply: {} chars", reply.len());
                match extract_analysis(&reply) {
                    Some(result) => result.normalized(),
                    None => {
                        warn!("No parseable JSON in analysis reply, using placeholder result");
                        AnalysisResult::not_determined()
                    }
                }
            }
            Err(e) => {
                warn!("Analysis call failed, using placeholder result: {:#}", e);
                AnalysisResult::not_determined()
            }
        }
    }
}
