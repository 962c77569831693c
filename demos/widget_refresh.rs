use std::path::PathBuf;
use std::sync::Arc;

use canteen_scraper::{
    CanteenAuthenticator, Credentials, JsonFileStore, ScraperConfig, Store, WidgetService,
    WidgetStatus,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ログ設定（RUST_LOG で上書き可）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = PathBuf::from(
        std::env::var("CANTEEN_DATA_DIR").unwrap_or_else(|_| "./widget-data".to_string()),
    );

    let credentials_store: Arc<JsonFileStore<Credentials>> =
        Arc::new(JsonFileStore::new(data_dir.join("credentials.json")));

    // 環境変数があれば保存済みの認証情報を上書き
    if let (Ok(username), Ok(password)) = (
        std::env::var("CANTEEN_USERNAME"),
        std::env::var("CANTEEN_PASSWORD"),
    ) {
        credentials_store
            .put(&Credentials::new(username, password))
            .await
            .expect("Failed to store credentials");
    }

    let authenticator = CanteenAuthenticator::from_config(&ScraperConfig::new())
        .expect("Failed to build HTTP client");
    let widget = WidgetService::new(
        Arc::new(authenticator),
        credentials_store,
        Arc::new(JsonFileStore::new(data_dir.join("preferences.json"))),
        Arc::new(JsonFileStore::new(data_dir.join("state.json"))),
    );

    let cached = widget.load_state().await.expect("Failed to load state");
    println!("=== Canteen Widget ===");
    println!("前回の状態: {:?} {:?}", cached.status, cached.balance);

    let preferences = widget
        .load_preferences()
        .await
        .expect("Failed to load preferences");
    let mut ticker = tokio::time::interval(preferences.refresh_interval());

    loop {
        ticker.tick().await;
        match widget.refresh(None).await {
            Ok(state) if state.status == WidgetStatus::Ready => {
                println!(
                    "✓ 残高: {} ({})",
                    state.balance.unwrap_or_default(),
                    state.owner_name.unwrap_or_default()
                );
            }
            Ok(state) => {
                eprintln!("✗ {}", state.error_message.unwrap_or_default());
            }
            Err(e) => {
                eprintln!("✗ 保存エラー: {}", e);
                break;
            }
        }
    }
}
