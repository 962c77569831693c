use canteen_scraper::{CanteenAuthenticator, Credentials, ProgressSink, Role, ScraperConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // ログ設定（RUST_LOG で上書き可）
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 環境変数から認証情報を取得
    let username = std::env::var("CANTEEN_USERNAME")
        .expect("CANTEEN_USERNAME environment variable not set");
    let password = std::env::var("CANTEEN_PASSWORD")
        .expect("CANTEEN_PASSWORD environment variable not set");
    let role = match std::env::var("CANTEEN_USER_TYPE").as_deref() {
        Ok("seller") => Role::Seller,
        Ok("admin") => Role::Admin,
        _ => Role::Student,
    };

    let mut config = ScraperConfig::new();
    if let Ok(base_url) = std::env::var("CANTEEN_BASE_URL") {
        config = config
            .with_base_url(&base_url)
            .expect("CANTEEN_BASE_URL is not a valid URL");
    }

    let authenticator =
        CanteenAuthenticator::from_config(&config).expect("Failed to build HTTP client");
    let credentials = Credentials::new(username, password).with_role(role);

    println!("=== Canteen Snapshot Test ===");

    let progress: &dyn ProgressSink = &|message: &str| println!("  > {}", message);
    match authenticator.fetch_snapshot(&credentials, Some(progress)).await {
        Ok(snapshot) => {
            println!("成功! 残高: {}", snapshot.balance_text);
            if let Some(owner) = &snapshot.owner_name {
                println!("名義人: {}", owner);
            }
            if snapshot.role_mismatch(role) {
                println!("注意: 実際のユーザー種別は {} です", snapshot.role);
            }
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
        }
    }
}
