use anyhow::Result;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::handlers;
use crate::config::{AuthenticationConfig, Config};
use crate::devices::SshTransport;
use crate::engine::ChatServices;
use crate::plugins::PluginServices;
use crate::providers::LanguageRegistry;

#[derive(Clone)]
pub struct AppState {
    pub services: ChatServices,
    pub authentication: Option<AuthenticationConfig>,
}

impl AppState {
    /// Production collaborators: system ssh, system ping and OpenAI.
    pub fn from_config(config: &Config) -> Self {
        Self {
            services: ChatServices {
                chat: config.chat.clone(),
                transport: Arc::new(SshTransport::new(config.devices.clone())),
                plugins: PluginServices::default(),
                languages: Arc::new(LanguageRegistry::new(config.openai_api_key.clone())),
            },
            authentication: config.authentication.clone(),
        }
    }
}

pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid allowed origin {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn create_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/chat/message", post(handlers::chat_message))
        .route("/settings/deviceTypes", get(handlers::device_types))
        .route("/settings/languages", get(handlers::languages))
        .route("/settings/plugins", get(handlers::plugins))
        .route("/security/server", get(handlers::security_server))
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

pub async fn serve(config: &Config, port: u16) -> Result<()> {
    let app = create_router(AppState::from_config(config), &config.server.allowed_origins);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("NetGPT API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
