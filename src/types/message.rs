use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    #[serde(alias = "You")]
    User,
    #[serde(alias = "NetGPT")]
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Text,
    Code,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSection {
    #[serde(rename = "type", alias = "messageType")]
    pub kind: SectionKind,
    pub content: String,
}

impl MessageSection {
    pub fn new(kind: SectionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }
}

/// One turn of the conversation as exchanged with the chat client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub sections: Vec<MessageSection>,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            sender: Sender::User,
            sections: vec![MessageSection::new(SectionKind::Text, content)],
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Section contents joined line by line, the form the model sees.
    pub fn flattened(&self) -> String {
        self.sections
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotMessage {
    pub sender: Sender,
    pub sections: Vec<MessageSection>,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl BotMessage {
    pub fn filled(sections: Vec<MessageSection>) -> Self {
        Self {
            sender: Sender::Assistant,
            sections,
            timestamp: Utc::now().timestamp(),
            caption: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::filled(vec![MessageSection::new(SectionKind::Error, content)])
    }

    /// One code section per function output followed by the closing text.
    pub fn answer(function_outputs: Vec<String>, final_text: String) -> Self {
        let mut sections: Vec<MessageSection> = function_outputs
            .into_iter()
            .map(|output| MessageSection::new(SectionKind::Code, output))
            .collect();
        sections.push(MessageSection::new(SectionKind::Text, final_text));
        Self::filled(sections)
    }

    pub fn is_error(&self) -> bool {
        self.sections.iter().any(|s| s.kind == SectionKind::Error)
    }
}
