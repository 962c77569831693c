use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, CACHE_CONTROL, CONTENT_TYPE, COOKIE, LOCATION,
    ORIGIN, PRAGMA, USER_AGENT,
};
use reqwest::Method;
use tracing::{debug, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::traits::{HttpRequest, HttpResponse, Transport};

use super::cookie::{collect_set_cookies, CookieJar};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// 追跡するリダイレクトの上限
const MAX_REDIRECTS: usize = 10;

/// セッションに乗せて送るリクエスト
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

impl SessionRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn post_form(url: Url, body: impl Into<String>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        Self {
            method: Method::POST,
            url,
            headers,
            body: Some(body.into()),
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: &str) -> Result<Self, ScraperError> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ScraperError::Config(format!("{}: {}", name, e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// 最終的に得られたページ
#[derive(Debug, Clone)]
pub struct SessionResponse {
    pub html: String,
    pub status: u16,
    /// リダイレクト追跡後のURL
    pub url: Url,
}

/// クッキージャーを引き回してHTTPを送るクライアント
///
/// ジャーは呼び出し側が試行ごとに用意して渡す。クライアント自身は状態を持たない。
pub struct SessionClient<T> {
    transport: T,
    base_url: Url,
    user_agent: HeaderValue,
    origin: HeaderValue,
}

impl<T: Transport> SessionClient<T> {
    pub fn new(transport: T, config: &ScraperConfig) -> Result<Self, ScraperError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ScraperError::Config(format!("user agent: {}", e)))?;
        let origin = HeaderValue::from_str(&config.origin())
            .map_err(|e| ScraperError::Config(format!("origin: {}", e)))?;
        Ok(Self {
            transport,
            base_url: config.base_url.clone(),
            user_agent,
            origin,
        })
    }

    /// ベースURLに対してパスを解決する
    pub fn resolve(&self, path: &str) -> Result<Url, ScraperError> {
        self.base_url
            .join(path)
            .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// ベースURLと同じオリジンか
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }

    /// 1リクエストを送り、本文とステータスを返す
    ///
    /// 非2xxでもエラーにしない。リダイレクトは各ホップの `Set-Cookie` を
    /// ジャーに取り込みながら追跡する。ベースURLと別オリジンへのリダイレクトは
    /// 追跡せず、3xx をそのまま返す（本文もクッキーも外へ出さない）。
    pub async fn fetch_text(
        &self,
        request: SessionRequest,
        jar: &mut CookieJar,
    ) -> Result<SessionResponse, ScraperError> {
        let mut request = request;
        let mut redirects = 0;

        loop {
            let response = self.send_once(&request, jar).await?;

            let Some(next) = redirect_request(&request, &response)? else {
                return Ok(SessionResponse {
                    html: response.body,
                    status: response.status,
                    url: request.url,
                });
            };

            if !self.is_same_origin(&next.url) {
                warn!(
                    "別オリジンへのリダイレクトは追跡しません: {} -> {}",
                    response.status,
                    next.url.origin().ascii_serialization()
                );
                return Ok(SessionResponse {
                    html: response.body,
                    status: response.status,
                    url: request.url,
                });
            }

            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(ScraperError::Transport(format!(
                    "リダイレクトが{}回を超えました: {}",
                    MAX_REDIRECTS, request.url
                )));
            }
            debug!("↳ リダイレクト {} -> {}", response.status, next.url);
            request = next;
        }
    }

    async fn send_once(
        &self,
        request: &SessionRequest,
        jar: &mut CookieJar,
    ) -> Result<HttpResponse, ScraperError> {
        debug!("HTTP {} {}", request.method, request.url);

        let mut headers = request.headers.clone();
        headers.insert(USER_AGENT, self.user_agent.clone());
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        }
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let same_origin = self.is_same_origin(&request.url);
        if let Some(cookie_header) = jar.to_header().filter(|_| same_origin) {
            match HeaderValue::from_str(&cookie_header) {
                Ok(value) => {
                    debug!(
                        "↳ 送信クッキー: {}",
                        jar.names().collect::<Vec<_>>().join(", ")
                    );
                    headers.insert(COOKIE, value);
                }
                Err(e) => debug!(error = %e, "Cookieヘッダの生成に失敗"),
            }
        }

        if request.method == Method::POST && !headers.contains_key(ORIGIN) {
            headers.insert(ORIGIN, self.origin.clone());
        }

        let response = self
            .transport
            .send(HttpRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                headers,
                body: request.body.clone(),
            })
            .await?;
        debug!("↳ ステータス {}", response.status);

        let set_cookies = collect_set_cookies(&response.headers);
        if same_origin && !set_cookies.is_empty() {
            let names = jar.merge_set_cookies(&set_cookies);
            debug!("↳ 受信クッキー: {}", names.join(", "));
        }

        Ok(response)
    }
}

/// リダイレクトなら次のリクエストを組み立てる
fn redirect_request(
    request: &SessionRequest,
    response: &HttpResponse,
) -> Result<Option<SessionRequest>, ScraperError> {
    if !matches!(response.status, 301 | 302 | 303 | 307 | 308) {
        return Ok(None);
    }
    let Some(location) = response
        .headers
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
    else {
        return Ok(None);
    };

    let url = request
        .url
        .join(location)
        .map_err(|e| ScraperError::InvalidUrl(format!("{}: {}", location, e)))?;

    let keeps_method = matches!(response.status, 307 | 308);
    if keeps_method {
        return Ok(Some(SessionRequest {
            url,
            ..request.clone()
        }));
    }

    let mut headers = request.headers.clone();
    headers.remove(CONTENT_TYPE);
    Ok(Some(SessionRequest {
        method: Method::GET,
        url,
        headers,
        body: None,
    }))
}
