//! 学校食堂ポータルの残高スクレイパー
//!
//! - ログインページのフォームを再送してセッションを確立
//! - ロールが分からない場合は student / seller / admin を順に試行
//! - ダッシュボードHTMLから残高と名義人を抽出
//! - ウィジェット用に認証情報・設定・表示状態を保存
//!
//! # 残高取得の使用例
//!
//! ```rust,ignore
//! use canteen_scraper::{CanteenService, ScraperConfig, SnapshotRequest, Role};
//! use tower::ServiceExt;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = CanteenService::from_config(&ScraperConfig::new()).unwrap();
//!
//!     let request = SnapshotRequest::new("username", "password").with_role(Role::Student);
//!
//!     let snapshot = service.oneshot(request).await.unwrap();
//!     println!("Balance: {}", snapshot.balance_text);
//! }
//! ```
//!
//! # ウィジェット使用例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use canteen_scraper::{CanteenAuthenticator, JsonFileStore, ScraperConfig, WidgetService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let authenticator = CanteenAuthenticator::from_config(&ScraperConfig::new()).unwrap();
//!     let widget = WidgetService::new(
//!         Arc::new(authenticator),
//!         Arc::new(JsonFileStore::new("./data/credentials.json")),
//!         Arc::new(JsonFileStore::new("./data/preferences.json")),
//!         Arc::new(JsonFileStore::new("./data/state.json")),
//!     );
//!
//!     let state = widget.refresh(None).await.unwrap();
//!     println!("{:?}: {:?}", state.status, state.balance);
//! }
//! ```

pub mod canteen;
pub mod config;
pub mod error;
pub mod html;
pub mod service;
pub mod session;
pub mod storage;
pub mod traits;
pub mod types;
pub mod widget;

#[cfg(test)]
mod testing;

// 主要な型をリエクスポート
pub use canteen::CanteenAuthenticator;
pub use config::ScraperConfig;
pub use error::ScraperError;
pub use service::{CanteenService, SnapshotRequest};
pub use session::{CookieJar, ReqwestTransport, SessionClient};
pub use storage::{JsonFileStore, MemoryStore, Store};
pub use traits::{HttpRequest, HttpResponse, ProgressSink, Transport};
pub use types::{Credentials, Role, Snapshot};

// ウィジェット関連の型もリエクスポート
pub use widget::{
    Preferences, PreferencesPatch, Theme, WidgetService, WidgetState, WidgetStatus,
};
