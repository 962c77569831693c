//! 残高ウィジェットの状態管理
//!
//! 保存済みの認証情報で残高を取り直し、表示用の状態をキャッシュする。
//! 描画と定期実行のスケジューリングは呼び出し側の責務。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::canteen::CanteenAuthenticator;
use crate::error::ScraperError;
use crate::storage::Store;
use crate::traits::{ProgressSink, Transport};
use crate::types::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// ウィジェット設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
    pub refresh_interval_minutes: u32,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            refresh_interval_minutes: 5,
        }
    }
}

impl Preferences {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_interval_minutes.max(1)) * 60)
    }
}

/// 設定の部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub theme: Option<Theme>,
    pub refresh_interval_minutes: Option<u32>,
}

impl PreferencesPatch {
    pub fn theme(theme: Theme) -> Self {
        Self {
            theme: Some(theme),
            ..Default::default()
        }
    }

    pub fn apply(&self, current: Preferences) -> Preferences {
        Preferences {
            theme: self.theme.unwrap_or(current.theme),
            refresh_interval_minutes: self
                .refresh_interval_minutes
                .unwrap_or(current.refresh_interval_minutes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// キャッシュする表示状態
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetState {
    pub status: WidgetStatus,
    pub balance: Option<String>,
    pub owner_name: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub theme: Theme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WidgetState {
    pub fn with_theme(self, theme: Theme) -> Self {
        Self { theme, ..self }
    }

    fn failed(theme: Theme, message: String) -> Self {
        Self {
            status: WidgetStatus::Error,
            theme,
            error_message: Some(message),
            ..Default::default()
        }
    }
}

pub struct WidgetService<T> {
    authenticator: Arc<CanteenAuthenticator<T>>,
    credentials: Arc<dyn Store<Credentials>>,
    preferences: Arc<dyn Store<Preferences>>,
    state: Arc<dyn Store<WidgetState>>,
}

impl<T: Transport> WidgetService<T> {
    pub fn new(
        authenticator: Arc<CanteenAuthenticator<T>>,
        credentials: Arc<dyn Store<Credentials>>,
        preferences: Arc<dyn Store<Preferences>>,
        state: Arc<dyn Store<WidgetState>>,
    ) -> Self {
        Self {
            authenticator,
            credentials,
            preferences,
            state,
        }
    }

    /// ユーザー名・パスワードが揃っているものだけを返す
    pub async fn load_credentials(&self) -> Result<Option<Credentials>, ScraperError> {
        Ok(self
            .credentials
            .get()
            .await?
            .filter(Credentials::is_complete))
    }

    pub async fn load_preferences(&self) -> Result<Preferences, ScraperError> {
        Ok(self.preferences.get().await?.unwrap_or_default())
    }

    /// 現在の設定のテーマを反映した表示状態
    pub async fn load_state(&self) -> Result<WidgetState, ScraperError> {
        let state = self.state.get().await?.unwrap_or_default();
        let preferences = self.load_preferences().await?;
        Ok(state.with_theme(preferences.theme))
    }

    pub async fn update_preferences(
        &self,
        patch: PreferencesPatch,
    ) -> Result<Preferences, ScraperError> {
        let updated = patch.apply(self.load_preferences().await?);
        self.preferences.put(&updated).await?;
        let state = self.state.get().await?.unwrap_or_default();
        self.state.put(&state.with_theme(updated.theme)).await?;
        Ok(updated)
    }

    pub async fn update_theme(&self, theme: Theme) -> Result<WidgetState, ScraperError> {
        self.update_preferences(PreferencesPatch::theme(theme)).await?;
        self.load_state().await
    }

    /// 認証情報を保存し、古い残高を捨てて取り直す
    pub async fn save_credentials(
        &self,
        credentials: &Credentials,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<WidgetState, ScraperError> {
        notify(sink, "認証情報を保存");
        self.credentials.put(credentials).await?;
        self.state.clear().await?;
        notify(sink, "キャッシュ済みの残高を削除");
        self.refresh(sink).await
    }

    /// 残高を取り直して表示状態を更新する
    ///
    /// 取得の失敗は `Error` 状態として返す（保存先のエラーだけが `Err`）。
    pub async fn refresh(
        &self,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<WidgetState, ScraperError> {
        notify(sink, "最新の残高を取得中...");
        let preferences = self.load_preferences().await?;

        let Some(credentials) = self.load_credentials().await? else {
            notify(sink, "アカウント未設定: ユーザー名とパスワードを登録してください");
            let state = WidgetState::failed(
                preferences.theme,
                ScraperError::MissingCredentials.to_string(),
            );
            self.state.put(&state).await?;
            return Ok(state);
        };

        // 取得中も前回の残高は表示し続ける
        let previous = self.state.get().await?.unwrap_or_default();
        self.state
            .put(&WidgetState {
                status: WidgetStatus::Loading,
                theme: preferences.theme,
                error_message: None,
                ..previous
            })
            .await?;

        let state = match self.authenticator.fetch_snapshot(&credentials, sink).await {
            Ok(snapshot) => {
                if snapshot.role_mismatch(credentials.role) {
                    info!(
                        "保存済みユーザー種別を更新: {} -> {}",
                        credentials.role, snapshot.role
                    );
                    self.credentials
                        .put(&credentials.clone().with_role(snapshot.role))
                        .await?;
                }
                WidgetState {
                    status: WidgetStatus::Ready,
                    balance: Some(snapshot.balance_text),
                    owner_name: snapshot.owner_name,
                    last_updated_at: Some(snapshot.fetched_at),
                    theme: preferences.theme,
                    error_message: None,
                }
            }
            Err(e) => {
                if e.is_attempt_fatal() {
                    warn!("ポータルに接続できません（次回の更新で再試行）: {}", e);
                } else {
                    warn!("残高の更新に失敗: {}", e);
                }
                notify(sink, &format!("取得失敗: {}", e));
                WidgetState::failed(preferences.theme, e.to_string())
            }
        };

        self.state.put(&state).await?;
        Ok(state)
    }

    /// 全て消して初期状態に戻す
    pub async fn logout(&self, sink: Option<&dyn ProgressSink>) -> Result<WidgetState, ScraperError> {
        notify(sink, "ログアウトして保存データを全て削除");
        self.credentials.clear().await?;
        self.state.clear().await?;
        self.preferences.clear().await?;

        let cleared = WidgetState::default().with_theme(Preferences::default().theme);
        self.state.put(&cleared).await?;
        Ok(cleared)
    }
}

fn notify(sink: Option<&dyn ProgressSink>, message: &str) {
    info!("{}", message);
    if let Some(sink) = sink {
        sink.message(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::storage::MemoryStore;
    use crate::testing::{portal, FakeTransport, DASHBOARD, PASSWORD};
    use crate::types::Role;

    struct Fixture {
        service: WidgetService<FakeTransport>,
        credentials: Arc<MemoryStore<Credentials>>,
        preferences: Arc<MemoryStore<Preferences>>,
        state: Arc<MemoryStore<WidgetState>>,
    }

    fn fixture(transport: FakeTransport) -> Fixture {
        let config = ScraperConfig::new()
            .with_base_url("http://portal.test")
            .unwrap();
        let authenticator = Arc::new(CanteenAuthenticator::new(transport, &config).unwrap());
        let credentials = Arc::new(MemoryStore::new());
        let preferences = Arc::new(MemoryStore::new());
        let state = Arc::new(MemoryStore::new());
        Fixture {
            service: WidgetService::new(
                authenticator,
                credentials.clone(),
                preferences.clone(),
                state.clone(),
            ),
            credentials,
            preferences,
            state,
        }
    }

    #[tokio::test]
    async fn test_refresh_without_credentials_caches_error_state() {
        let f = fixture(FakeTransport::new());

        let state = f.service.refresh(None).await.unwrap();

        assert_eq!(state.status, WidgetStatus::Error);
        assert_eq!(
            state.error_message.as_deref(),
            Some(ScraperError::MissingCredentials.to_string().as_str())
        );
        assert_eq!(f.state.get().await.unwrap(), Some(state));
    }

    #[tokio::test]
    async fn test_incomplete_stored_credentials_are_ignored() {
        let f = fixture(FakeTransport::new());
        f.credentials
            .put(&Credentials::new("somchai", ""))
            .await
            .unwrap();

        assert_eq!(f.service.load_credentials().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_credentials_refreshes_and_corrects_role() {
        let f = fixture(portal(Some(Role::Seller), DASHBOARD));
        f.state
            .put(&WidgetState {
                status: WidgetStatus::Ready,
                balance: Some("old".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let credentials = Credentials::new("somchai", PASSWORD).with_role(Role::Student);
        let state = f.service.save_credentials(&credentials, None).await.unwrap();

        assert_eq!(state.status, WidgetStatus::Ready);
        assert_eq!(state.balance.as_deref(), Some("1,234.50"));
        assert_eq!(state.owner_name.as_deref(), Some("สมชาย ใจดี"));
        assert!(state.last_updated_at.is_some());
        assert_eq!(f.state.get().await.unwrap(), Some(state));

        let stored = f.credentials.get().await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Seller);
        assert_eq!(stored.username, "somchai");
    }

    #[tokio::test]
    async fn test_refresh_failure_becomes_error_state() {
        let f = fixture(portal(None, DASHBOARD));
        f.credentials
            .put(&Credentials::new("somchai", "wrong"))
            .await
            .unwrap();

        let state = f.service.refresh(None).await.unwrap();

        assert_eq!(state.status, WidgetStatus::Error);
        assert!(state.balance.is_none());
        assert!(state
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("ชื่อผู้ใช้หรือรหัสผ่านไม่ถูกต้อง")));
    }

    #[tokio::test]
    async fn test_update_theme_merges_preferences() {
        let f = fixture(FakeTransport::new());
        f.preferences
            .put(&Preferences {
                theme: Theme::Light,
                refresh_interval_minutes: 15,
            })
            .await
            .unwrap();

        let state = f.service.update_theme(Theme::Dark).await.unwrap();

        assert_eq!(state.theme, Theme::Dark);
        let preferences = f.service.load_preferences().await.unwrap();
        assert_eq!(preferences.theme, Theme::Dark);
        assert_eq!(preferences.refresh_interval_minutes, 15);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let f = fixture(FakeTransport::new());
        f.credentials
            .put(&Credentials::new("somchai", PASSWORD))
            .await
            .unwrap();
        f.service.update_theme(Theme::Dark).await.unwrap();

        let state = f.service.logout(None).await.unwrap();

        assert_eq!(state, WidgetState::default());
        assert_eq!(f.credentials.get().await.unwrap(), None);
        assert_eq!(f.preferences.get().await.unwrap(), None);
        assert_eq!(f.service.load_preferences().await.unwrap(), Preferences::default());
    }

    /// put された状態を全て記録するストア
    #[derive(Default)]
    struct HistoryStore {
        current: MemoryStore<WidgetState>,
        history: std::sync::Mutex<Vec<WidgetState>>,
    }

    #[async_trait::async_trait]
    impl Store<WidgetState> for HistoryStore {
        async fn get(&self) -> Result<Option<WidgetState>, ScraperError> {
            self.current.get().await
        }

        async fn put(&self, value: &WidgetState) -> Result<(), ScraperError> {
            self.history.lock().unwrap().push(value.clone());
            self.current.put(value).await
        }

        async fn clear(&self) -> Result<(), ScraperError> {
            self.current.clear().await
        }
    }

    #[tokio::test]
    async fn test_refresh_shows_loading_with_previous_balance() {
        let config = ScraperConfig::new()
            .with_base_url("http://portal.test")
            .unwrap();
        let transport = portal(Some(Role::Student), DASHBOARD);
        let authenticator = Arc::new(CanteenAuthenticator::new(transport, &config).unwrap());
        let state = Arc::new(HistoryStore::default());
        state
            .current
            .put(&WidgetState {
                status: WidgetStatus::Ready,
                balance: Some("99.00".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let service = WidgetService::new(
            authenticator,
            Arc::new(MemoryStore::with_value(Credentials::new("somchai", PASSWORD))),
            Arc::new(MemoryStore::new()),
            state.clone(),
        );

        let result = service.refresh(None).await.unwrap();

        let history = state.history.lock().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, WidgetStatus::Loading);
        assert_eq!(history[0].balance.as_deref(), Some("99.00"));
        assert_eq!(history[1], result);
        assert_eq!(result.balance.as_deref(), Some("1,234.50"));
    }

    #[test]
    fn test_preferences_fill_missing_fields_from_defaults() {
        let preferences: Preferences = serde_json::from_str(r#"{"theme":"dark"}"#).unwrap();
        assert_eq!(preferences.theme, Theme::Dark);
        assert_eq!(preferences.refresh_interval_minutes, 5);
        assert_eq!(preferences.refresh_interval(), Duration::from_secs(300));
    }
}
