//! Request/response derivation calls (preview and export).

use crate::{DeriveError, Endpoints, SessionContext};
use async_trait::async_trait;
use bbdsl_live_protocol::{ExportFormat, ExportOptions, ExportRequest};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Computes a view of the document without mutating it
#[async_trait]
pub trait DerivationService: Send + Sync + 'static {
    async fn derive(
        &self,
        text: &str,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<String, DeriveError>;
}

/// `POST {api_base}/export/{fmt}` against the platform backend
pub struct HttpDerivationService {
    client: reqwest::Client,
    endpoints: Endpoints,
    session: SessionContext,
}

impl HttpDerivationService {
    pub fn new(endpoints: Endpoints, session: SessionContext) -> Result<Self, DeriveError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("bbdsl-live/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoints,
            session,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait]
impl DerivationService for HttpDerivationService {
    async fn derive(
        &self,
        text: &str,
        format: ExportFormat,
        options: &ExportOptions,
    ) -> Result<String, DeriveError> {
        let url = self.endpoints.export_url(format)?;
        debug!(%url, bytes = text.len(), "Requesting derivation");

        let mut request = self
            .client
            .post(url)
            .json(&ExportRequest::new(text, options.clone()));
        if let Some(token) = self.session.bearer_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeriveError::Service {
            status: status.as_u16(),
            detail: error_detail(&body, status),
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Human-readable detail from an error response: the service's `detail`
/// field when present, the status reason otherwise
fn error_detail(body: &str, status: StatusCode) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) => status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_from_string() {
        let detail = error_detail(
            r#"{"detail": "Unsupported format: pdf."}"#,
            StatusCode::BAD_REQUEST,
        );
        assert_eq!(detail, "Unsupported format: pdf.");
    }

    #[test]
    fn test_error_detail_from_structured_body() {
        let detail = error_detail(
            r#"{"detail": [{"loc": ["body", "yaml_content"], "msg": "field required"}]}"#,
            StatusCode::UNPROCESSABLE_ENTITY,
        );
        assert!(detail.contains("field required"));
    }

    #[test]
    fn test_error_detail_falls_back_to_reason() {
        assert_eq!(
            error_detail("<html>oops</html>", StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
    }
}
