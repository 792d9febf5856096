use axum::{extract::State, Json};
use log::info;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::server::AppState;
use crate::config::AuthenticationConfig;
use crate::devices::DeviceType;
use crate::engine::process_message;
use crate::plugins::default_plugins;
use crate::providers::default_languages;
use crate::types::{BotMessage, ChatRequest, LanguageSettingsBatch, Options, PluginList};

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Always answers 200; failures are carried as an error section.
pub async fn chat_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Json<BotMessage> {
    let request_id = Uuid::new_v4();
    info!(
        "[{}] Chat message for {} with {} turns",
        request_id,
        request.network_settings.device_type,
        request.message_history.len()
    );
    let reply = process_message(&state.services, &request).await;
    info!(
        "[{}] Replied with {} section(s){}",
        request_id,
        reply.sections.len(),
        if reply.is_error() { " (error)" } else { "" }
    );
    Json(reply)
}

pub async fn device_types() -> Json<Options> {
    Json(Options {
        options: DeviceType::all()
            .iter()
            .map(|device_type| device_type.vendor_name().to_string())
            .collect(),
    })
}

pub async fn languages() -> Json<LanguageSettingsBatch> {
    Json(LanguageSettingsBatch {
        settings: default_languages(),
    })
}

pub async fn plugins() -> Json<PluginList> {
    Json(PluginList {
        plugins: default_plugins(),
    })
}

pub async fn security_server(
    State(state): State<AppState>,
) -> Result<Json<AuthenticationConfig>, ApiError> {
    state
        .authentication
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No authentication server configured".to_string()))
}
