use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::error::ScraperError;

/// トランスポートに渡す1リクエスト
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

/// トランスポートから返る1レスポンス（リダイレクトは追跡しない）
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// 1往復分の送受信
    ///
    /// DNS・接続断・タイムアウトは `ScraperError::Transport` で返す。
    /// ステータスコードによるエラー判定はしない。
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScraperError>;
}

/// 呼び出し元へ進捗メッセージを渡す先
pub trait ProgressSink: Send + Sync {
    fn message(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn message(&self, message: &str) {
        self(message)
    }
}
