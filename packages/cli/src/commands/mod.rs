pub mod export;
pub mod watch;

pub use export::{export, ExportArgs};
pub use watch::{watch, WatchArgs};

use crate::config::Config;
use anyhow::Result;
use bbdsl_live_sync::{Endpoints, SessionContext};
use clap::Args;

/// Where the platform lives and how to authenticate against it
#[derive(Args, Debug, Default)]
pub struct ServerArgs {
    /// Platform origin, e.g. http://localhost:8000 (overrides config)
    #[arg(long, env = "BBDSL_SERVER")]
    pub server: Option<String>,

    /// Bearer token for export calls (overrides config)
    #[arg(long, env = "BBDSL_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Validation socket URL, when it is not served from the platform origin
    #[arg(long)]
    pub validate_url: Option<String>,

    /// Export API base URL, when it is not served from the platform origin
    #[arg(long)]
    pub api_url: Option<String>,
}

impl ServerArgs {
    pub fn resolve(&self, config: &Config) -> Result<(Endpoints, SessionContext)> {
        let origin = self.server.as_deref().unwrap_or(&config.server);
        let mut endpoints = Endpoints::from_origin(origin)?;
        if let Some(url) = &self.validate_url {
            endpoints.validate = url.parse()?;
        }
        if let Some(url) = &self.api_url {
            // Joined against, so the base needs a trailing slash
            let base = if url.ends_with('/') {
                url.clone()
            } else {
                format!("{url}/")
            };
            endpoints.api_base = base.parse()?;
        }
        let session = match self.token.as_ref().or(config.token.as_ref()) {
            Some(token) => SessionContext::with_token(token.clone()),
            None => SessionContext::anonymous(),
        };
        Ok((endpoints, session))
    }
}
