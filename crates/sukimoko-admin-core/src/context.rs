use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::{Gateway, HttpTransport, ReqwestTransport};
use crate::auth::{LoginFlow, SessionStore, TokenStorage};
use crate::config::Config;
use crate::navigator::Navigator;

/// Everything a view needs, handed over explicitly.
///
/// The session, gateway and login flow share one storage adapter, one
/// transport and one navigator.
#[derive(Clone)]
pub struct AdminContext {
    pub session: SessionStore,
    pub gateway: Gateway,
    pub login: LoginFlow,
}

impl AdminContext {
    pub fn new(
        storage: Arc<dyn TokenStorage>,
        transport: Arc<dyn HttpTransport>,
        navigator: Arc<dyn Navigator>,
        config: &Config,
    ) -> Self {
        let session = SessionStore::new(storage);
        let gateway = Gateway::new(session.clone(), transport.clone(), config.api_base_url.clone())
            .with_navigator(navigator.clone())
            .with_proactive_expiry_check(config.proactive_expiry_check);
        let login = LoginFlow::new(session.clone(), transport, config.api_base_url.clone())
            .with_navigator(navigator);
        Self {
            session,
            gateway,
            login,
        }
    }

    /// Context over the configured storage backend and a reqwest transport
    pub fn from_config(config: &Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
        let storage = config.token_storage()?;
        let transport = ReqwestTransport::new(config.request_timeout())
            .context("Failed to build HTTP client")?;
        Ok(Self::new(storage, Arc::new(transport), navigator, config))
    }
}
