use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::capabilities::FunctionSchema;
use crate::error::LanguageApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

/// A function call chosen by the model. `arguments` is raw JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_call: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// The assistant turn that requested `call`.
    pub fn function_request(call: FunctionCall) -> Self {
        Self {
            function_call: Some(call),
            ..Self::plain(Role::Assistant, "")
        }
    }

    /// The result of running function `name`.
    pub fn function_result(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::plain(Role::Function, content)
        }
    }
}

/// Everything one model call needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub functions: Vec<FunctionSchema>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    Text(String),
    FunctionCall(FunctionCall),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LanguageApiError>;
}

/// Replays queued replies in order and records every request it receives.
#[derive(Default)]
pub struct ScriptedLanguageModel {
    replies: Mutex<VecDeque<Result<ModelReply, LanguageApiError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ModelReply::Text(text.into())))
    }

    pub fn then_call(self, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        self.push(Ok(ModelReply::FunctionCall(FunctionCall {
            name: name.into(),
            arguments: arguments.into(),
        })))
    }

    pub fn then_error(self, error: LanguageApiError) -> Self {
        self.push(Err(error))
    }

    fn push(self, reply: Result<ModelReply, LanguageApiError>) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
        self
    }

    /// Requests seen so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedLanguageModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LanguageApiError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| {
                Err(LanguageApiError::MalformedResponse(
                    "no scripted reply left".to_string(),
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        let sys = ChatMessage::system("test");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "test");

        let result = ChatMessage::function_result("ping", "No active hosts found.");
        assert_eq!(result.role, Role::Function);
        assert_eq!(result.name.as_deref(), Some("ping"));

        let json = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_function_request_serialization() {
        let message = ChatMessage::function_request(FunctionCall {
            name: "get_logs".to_string(),
            arguments: "{}".to_string(),
        });
        let json = serde_json::to_value(message).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["function_call"]["name"], "get_logs");
        assert!(json.get("name").is_none());
    }

    #[tokio::test]
    async fn test_scripted_model_replays_in_order() {
        let model = ScriptedLanguageModel::new()
            .then_call("ping", r#"{"ip_address": "10.0.0.1"}"#)
            .then_text("done");
        let request = CompletionRequest {
            model: "gpt-test".to_string(),
            messages: vec![ChatMessage::user("hi")],
            functions: Vec::new(),
            max_tokens: None,
            temperature: None,
            top_p: None,
        };

        assert!(matches!(
            model.complete(&request).await.unwrap(),
            ModelReply::FunctionCall(ref call) if call.name == "ping"
        ));
        assert_eq!(
            model.complete(&request).await.unwrap(),
            ModelReply::Text("done".to_string())
        );
        assert!(model.complete(&request).await.is_err());
        assert_eq!(model.requests().len(), 3);
    }
}
