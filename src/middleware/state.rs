use std::sync::Arc;
use std::time::Instant;

use super::config::GateConfig;
use super::traits::IdentityProvider;

/// Shared state for the gate middleware and its companion routes.
///
/// `provider` is `None` when credentials were not configured; the gate then
/// fails closed for protected paths and open for everything else.
pub struct GateState<P> {
    pub(super) config: Arc<GateConfig>,
    pub(super) provider: Option<Arc<P>>,
    pub(super) started_at: Instant,
}

// Manual Clone: avoid derive adding a `P: Clone` bound.
impl<P> Clone for GateState<P> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            provider: self.provider.clone(),
            started_at: self.started_at,
        }
    }
}

impl<P: IdentityProvider> GateState<P> {
    #[must_use]
    pub fn new(config: GateConfig, provider: Option<P>) -> Self {
        Self {
            config: Arc::new(config),
            provider: provider.map(Arc::new),
            started_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.provider.is_some()
    }
}

#[cfg(feature = "provider")]
impl GateState<crate::provider::AuthClient> {
    /// Build the stock provider client from the configured credentials.
    #[must_use]
    pub fn from_config(config: GateConfig) -> Self {
        let provider = config
            .credentials()
            .cloned()
            .map(crate::provider::AuthClient::new);
        Self::new(config, provider)
    }
}
