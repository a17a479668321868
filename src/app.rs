use crate::config::GatewayConfig;
use crate::constants::network::USER_AGENT;
use crate::errors::ToolError;
use crate::managers::discovery::DiscoveryManager;
use crate::managers::library::LibraryManager;
use crate::managers::playback::PlaybackManager;
use crate::managers::playlists::PlaylistManager;
use crate::services::credential_store::CredentialStore;
use crate::services::executor::AuthenticatedExecutor;
use crate::services::lastfm::LastFmClient;
use crate::services::logger::Logger;
use crate::services::normalizer::has_normalizer;
use crate::services::token_refresher::{CredentialRefresher, SpotifyTokenRefresher};
use crate::services::tool_registry::{ToolHandler, ToolRegistry, ToolSpec};
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub config: GatewayConfig,
    pub credentials: CredentialStore,
    pub registry: Arc<ToolRegistry>,
}

impl App {
    fn register_all(
        registry: &mut ToolRegistry,
        specs: Vec<ToolSpec>,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), ToolError> {
        for spec in specs {
            if !has_normalizer(&spec.name) {
                return Err(ToolError::internal(format!(
                    "tool '{}' has no response normalizer",
                    spec.name
                )));
            }
            registry.register(spec, handler.clone())?;
        }
        Ok(())
    }

    pub fn initialize(config: GatewayConfig) -> Result<Self, ToolError> {
        let logger = Logger::new("spotify-mcp");
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| ToolError::internal(format!("failed to build HTTP client: {}", err)))?;
        let refresher: Arc<dyn CredentialRefresher> = Arc::new(SpotifyTokenRefresher::new(
            logger.clone(),
            client.clone(),
            config.token_url.clone(),
            config.secret.clone(),
            config.request_timeout,
        ));
        let credentials = CredentialStore::new(logger.clone(), refresher, config.expiry_margin);
        Self::with_credentials(config, logger, client, credentials)
    }

    /// Wires managers and the registry around an existing credential store.
    pub fn with_credentials(
        config: GatewayConfig,
        logger: Logger,
        client: reqwest::Client,
        credentials: CredentialStore,
    ) -> Result<Self, ToolError> {
        let executor = AuthenticatedExecutor::new(
            logger.clone(),
            client.clone(),
            config.spotify_api_url.clone(),
            credentials.clone(),
            config.request_timeout,
        );

        let mut registry = ToolRegistry::new(logger.clone());
        Self::register_all(
            &mut registry,
            LibraryManager::specs(),
            Arc::new(LibraryManager::new(logger.clone(), executor.clone())),
        )?;
        Self::register_all(
            &mut registry,
            PlaylistManager::specs(),
            Arc::new(PlaylistManager::new(logger.clone(), executor.clone())),
        )?;
        match &config.lastfm_api_key {
            Some(api_key) => {
                let lastfm = LastFmClient::new(
                    logger.clone(),
                    client.clone(),
                    config.lastfm_api_url.clone(),
                    api_key.clone(),
                    config.request_timeout,
                );
                Self::register_all(
                    &mut registry,
                    DiscoveryManager::specs(),
                    Arc::new(DiscoveryManager::new(logger.clone(), lastfm)),
                )?;
            }
            None => logger.warn(
                "LASTFM_API_KEY is not set; similarity tools are disabled",
                None,
            ),
        }
        Self::register_all(
            &mut registry,
            PlaybackManager::specs(),
            Arc::new(PlaybackManager::new(logger.clone(), executor)),
        )?;

        logger.info(
            "gateway initialized",
            Some(&serde_json::json!({
                "tools": registry.list().len(),
                "api_url": config.spotify_api_url.as_str(),
            })),
        );
        Ok(Self {
            logger,
            config,
            credentials,
            registry: Arc::new(registry),
        })
    }
}
