use thiserror::Error;

/// Failures raised while invoking a bound capability.
#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("arguments for '{name}' are not a JSON object: {source}")]
    ArgumentParse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("capability '{name}' failed: {source:#}")]
    Execution {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("capability '{name}' returned {found}, expected text or an object")]
    Contract { name: String, found: &'static str },
}

impl CapabilityError {
    pub fn capability_name(&self) -> &str {
        match self {
            CapabilityError::ArgumentParse { name, .. }
            | CapabilityError::Execution { name, .. }
            | CapabilityError::Contract { name, .. } => name,
        }
    }
}

/// Failures of the language model collaborator.
#[derive(Error, Debug)]
pub enum LanguageApiError {
    #[error("model ran out of tokens")]
    OutOfTokens,

    #[error("model API rate limited the request: {0}")]
    RateLimited(String),

    #[error("model API rejected the request: {0}")]
    BadRequest(String),

    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("model API transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),
}

/// Everything that can end a chat request cycle.
///
/// Every variant is terminal: the cycle produces a single error section
/// built from [`ConversationError::user_message`], while the `Display`
/// form carries the detail for the server log.
#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("model requested unknown function '{0}'")]
    UnknownFunction(String),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    #[error(transparent)]
    LanguageApi(#[from] LanguageApiError),

    #[error("device type '{0}' not found")]
    UnknownDeviceType(String),

    #[error("language '{0}' not found")]
    UnknownLanguage(String),

    #[error("no API key configured for language '{0}'")]
    MissingApiKey(String),

    #[error("failed to prepare providers: {0:#}")]
    Setup(anyhow::Error),

    #[error("model still requested functions after {0} rounds")]
    RoundLimitExceeded(usize),
}

impl ConversationError {
    /// Text that is safe to show to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ConversationError::UnknownFunction(name) => format!(
                "Sorry. The function {} is not available, so I cannot perform that task.",
                name
            ),
            ConversationError::Capability(CapabilityError::ArgumentParse { name, .. }) => format!(
                "Sorry. I didn't understand the information needed to run {}. Try rephrasing your question.",
                name
            ),
            ConversationError::Capability(err) => format!(
                "Sorry. Something went wrong while running {}. The details have been logged.",
                err.capability_name()
            ),
            ConversationError::LanguageApi(LanguageApiError::OutOfTokens) => {
                "Sorry. I've run out of tokens. Please try decreasing the scale of your request."
                    .to_string()
            }
            ConversationError::LanguageApi(_) | ConversationError::RoundLimitExceeded(_) => {
                "Sorry. I've experienced an error in understanding your message.".to_string()
            }
            ConversationError::UnknownDeviceType(name) => {
                format!("Device type {} not found.", name)
            }
            ConversationError::UnknownLanguage(name) => format!("Language {} not found.", name),
            ConversationError::MissingApiKey(name) => {
                format!("Language {} has no API key configured.", name)
            }
            ConversationError::Setup(_) => {
                "Sorry. I couldn't prepare the connection to your devices. Check your network settings."
                    .to_string()
            }
        }
    }
}
