use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tower::Service;
use tracing::info;

use crate::canteen::CanteenAuthenticator;
use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::session::ReqwestTransport;
use crate::traits::Transport;
use crate::types::{Credentials, Role, Snapshot};

/// 残高取得リクエスト
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl SnapshotRequest {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role: Role::default(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

impl From<SnapshotRequest> for Credentials {
    fn from(req: SnapshotRequest) -> Self {
        Credentials::new(req.username, req.password).with_role(req.role)
    }
}

/// tower::Serviceを実装した残高取得サービス
pub struct CanteenService<T = ReqwestTransport> {
    authenticator: Arc<CanteenAuthenticator<T>>,
}

impl<T> Clone for CanteenService<T> {
    fn clone(&self) -> Self {
        Self {
            authenticator: self.authenticator.clone(),
        }
    }
}

impl CanteenService<ReqwestTransport> {
    pub fn from_config(config: &ScraperConfig) -> Result<Self, ScraperError> {
        Ok(Self::new(CanteenAuthenticator::from_config(config)?))
    }
}

impl<T: Transport> CanteenService<T> {
    pub fn new(authenticator: CanteenAuthenticator<T>) -> Self {
        Self {
            authenticator: Arc::new(authenticator),
        }
    }
}

impl<T: Transport + 'static> Service<SnapshotRequest> for CanteenService<T> {
    type Response = Snapshot;
    type Error = ScraperError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: SnapshotRequest) -> Self::Future {
        info!("残高取得リクエスト受信: user_type={}", req.role);
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let credentials: Credentials = req.into();
            let snapshot = authenticator.fetch_snapshot(&credentials, None).await?;

            info!(
                "残高取得完了: balance={}, user_type={}",
                snapshot.balance_text, snapshot.role
            );

            Ok(snapshot)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{portal, DASHBOARD, PASSWORD};
    use tower::ServiceExt;

    #[test]
    fn test_snapshot_request_builder() {
        let req = SnapshotRequest::new("user", "pass").with_role(Role::Admin);

        assert_eq!(req.username, "user");
        assert_eq!(req.password, "pass");
        assert_eq!(req.role, Role::Admin);
    }

    #[test]
    fn test_snapshot_request_to_credentials() {
        let req = SnapshotRequest::new("user", "pass");
        let credentials: Credentials = req.into();

        assert_eq!(credentials.username, "user");
        assert_eq!(credentials.password, "pass");
        assert_eq!(credentials.role, Role::Student);
    }

    #[tokio::test]
    async fn test_service_call_returns_snapshot() {
        let config = ScraperConfig::new()
            .with_base_url("http://portal.test")
            .unwrap();
        let authenticator =
            CanteenAuthenticator::new(portal(Some(Role::Student), DASHBOARD), &config).unwrap();
        let service = CanteenService::new(authenticator);

        let snapshot = service
            .oneshot(SnapshotRequest::new("somchai", PASSWORD))
            .await
            .unwrap();

        assert_eq!(snapshot.balance_text, "1,234.50");
        assert_eq!(snapshot.role, Role::Student);
    }
}
