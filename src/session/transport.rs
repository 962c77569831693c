use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{HttpRequest, HttpResponse, Transport};

/// reqwest による実通信
///
/// リダイレクトは `SessionClient` 側でクッキーを拾いながら追うため、ここでは追わない。
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ScraperConfig) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| ScraperError::Config(format!("HTTPクライアント初期化: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScraperError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ScraperError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| ScraperError::Transport(format!("本文の読み込み: {}", e)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
