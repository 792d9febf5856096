use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::llm::{ChatMessage, CompletionRequest, FunctionCall, LanguageModel, ModelReply};
use crate::capabilities::FunctionSchema;
use crate::error::LanguageApiError;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat completions client using the `functions` calling protocol.
#[derive(Debug, Clone)]
pub struct OpenAiModel {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    functions: Option<&'a [FunctionSchema]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAiModel {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: OPENAI_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

fn error_for_status(status: u16, body: String) -> LanguageApiError {
    let detail = serde_json::from_str::<OpenAIErrorBody>(&body).ok().map(|b| b.error);
    let context_exceeded = body.contains("context_length_exceeded")
        || detail.as_ref().and_then(|d| d.code.as_deref()) == Some("context_length_exceeded");

    match status {
        400 if context_exceeded => LanguageApiError::OutOfTokens,
        400 => LanguageApiError::BadRequest(detail.map(|d| d.message).unwrap_or(body)),
        429 => LanguageApiError::RateLimited(detail.map(|d| d.message).unwrap_or(body)),
        _ => LanguageApiError::Api { status, body },
    }
}

fn reply_from_choice(choice: OpenAIChoice) -> Result<ModelReply, LanguageApiError> {
    if matches!(choice.finish_reason.as_deref(), Some("length") | Some("max_tokens")) {
        return Err(LanguageApiError::OutOfTokens);
    }
    if let Some(call) = choice.message.function_call {
        return Ok(ModelReply::FunctionCall(call));
    }
    choice
        .message
        .content
        .map(ModelReply::Text)
        .ok_or_else(|| {
            LanguageApiError::MalformedResponse("choice has neither content nor function_call".to_string())
        })
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LanguageApiError> {
        let body = OpenAIRequest {
            model: &request.model,
            messages: &request.messages,
            functions: (!request.functions.is_empty()).then_some(request.functions.as_slice()),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            top_p: request.top_p,
            n: 1,
        };

        debug!(
            "OpenAI request: {} messages, {} functions",
            request.messages.len(),
            request.functions.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            warn!("OpenAI API error {}: {}", status, body);
            return Err(error_for_status(status, body));
        }

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LanguageApiError::MalformedResponse(e.to_string()))?;
        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LanguageApiError::MalformedResponse("No choices in response".to_string()))?;
        reply_from_choice(choice)
    }
}
