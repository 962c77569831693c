//! テスト用の偽トランスポートと食堂ポータルのフィクスチャ

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, LOCATION, SET_COOKIE};
use reqwest::Method;

use crate::error::ScraperError;
use crate::traits::{HttpRequest, HttpResponse, Transport};
use crate::types::Role;

type Handler = Arc<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

enum Reply {
    Respond(Handler),
    Fail,
}

struct Route {
    method: Method,
    path: String,
    reply: Reply,
}

#[derive(Default)]
struct Inner {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

/// パスごとに応答を差し込める偽トランスポート
///
/// 未登録のパスは 404。送られたリクエストは全て記録する。
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    inner: Arc<Inner>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route<F>(self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        self.push(method, path, Reply::Respond(Arc::new(handler)))
    }

    /// 接続失敗を返すルート
    pub(crate) fn fail(self, method: Method, path: &str) -> Self {
        self.push(method, path, Reply::Fail)
    }

    fn push(self, method: Method, path: &str, reply: Reply) -> Self {
        self.inner.routes.lock().unwrap().push(Route {
            method,
            path: path.to_string(),
            reply,
        });
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.method == method && request.url.path() == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ScraperError> {
        self.inner.requests.lock().unwrap().push(request.clone());

        let handler = {
            let routes = self.inner.routes.lock().unwrap();
            let route = routes
                .iter()
                .find(|route| route.method == request.method && route.url_matches(&request));
            match route.map(|route| &route.reply) {
                Some(Reply::Respond(handler)) => Some(handler.clone()),
                Some(Reply::Fail) => {
                    return Err(ScraperError::Transport(format!(
                        "connection reset: {}",
                        request.url
                    )))
                }
                None => None,
            }
        };

        Ok(match handler {
            Some(handler) => handler(&request),
            None => html_response(404, "not found"),
        })
    }
}

impl Route {
    fn url_matches(&self, request: &HttpRequest) -> bool {
        request.url.path() == self.path
    }
}

pub(crate) fn html_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HeaderMap::new(),
        body: body.to_string(),
    }
}

impl HttpResponse {
    pub(crate) fn with_header(mut self, name: HeaderName, value: &str) -> Self {
        self.headers
            .append(name, HeaderValue::from_str(value).unwrap());
        self
    }
}

pub(crate) fn cookie_header(request: &HttpRequest) -> Option<String> {
    request
        .headers
        .get(COOKIE)
        .map(|value| value.to_str().unwrap().to_string())
}

pub(crate) const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><head><meta name="csrf-token" content="meta-token"></head>
<body>
  <form method="POST" action="/canteen/login" class="space-y-4">
    <input type="hidden" name="_csrf_token" value="csrf-abc">
    <input type="hidden" name="__state" value="keep&amp;me">
    <input type="text" name="username">
    <input type="password" name="password">
    <select name="user_type"><option value="student">student</option></select>
    <input type="checkbox" name="remember" value="1" checked>
    <button type="submit">เข้าสู่ระบบ</button>
  </form>
</body></html>"#;

pub(crate) const DASHBOARD: &str = r#"<!DOCTYPE html>
<html><body>
  <div class="rounded-2xl bg-gradient-to-r from-emerald-500 to-teal-500 p-6 text-white">
    <div class="flex items-center justify-between">
      <span class="text-sm opacity-90">ยอดเงินคงเหลือ</span>
    </div>
    <p class="text-4xl font-bold mt-1">1,234.50</p>
  </div>
  <div class="mt-6 space-y-2">
    <span class="font-medium">สมชาย ใจดี</span>
  </div>
</body></html>"#;

/// 送信後もログインフォームが残るページ
pub(crate) fn rejected_page(message: &str) -> String {
    format!(
        r#"<html><body>
  <div class="alert bg-red-100 text-red-700"><strong>Error</strong> {}</div>
  <form method="POST" action="/canteen/login">
    <input type="hidden" name="_csrf_token" value="csrf-next">
    <input type="text" name="username">
    <input type="password" name="password">
  </form>
</body></html>"#,
        message
    )
}

pub(crate) const PASSWORD: &str = "s3cret";

/// `accepts` のロールと正しいパスワードだけを受け付けるポータル
///
/// ログイン成功時は 302 でダッシュボードへ飛ばし、認証済みクッキーを発行する。
pub(crate) fn portal(accepts: Option<Role>, dashboard: &'static str) -> FakeTransport {
    FakeTransport::new()
        .route(Method::GET, "/canteen", move |request| {
            if cookie_header(request).is_some_and(|c| c.contains("session=authed")) {
                return html_response(200, dashboard);
            }
            html_response(200, LOGIN_PAGE).with_header(SET_COOKIE, "session=guest; Path=/; HttpOnly")
        })
        .route(Method::POST, "/canteen/login", move |request| {
            let body = request.body.clone().unwrap_or_default();
            let accepted = accepts.is_some_and(|role| {
                body.contains(&format!("user_type={}", role.as_form_value()))
                    && body.contains(&format!("password={}", PASSWORD))
            });
            if accepted {
                html_response(302, "")
                    .with_header(LOCATION, "/canteen/dashboard")
                    .with_header(SET_COOKIE, "session=authed; Path=/; HttpOnly")
            } else {
                html_response(
                    200,
                    &rejected_page(&format!(
                        "ชื่อผู้ใช้หรือรหัสผ่านไม่ถูกต้อง ({})",
                        body.split("user_type=").nth(1).unwrap_or("?")
                    )),
                )
            }
        })
        .route(Method::GET, "/canteen/dashboard", move |request| {
            if cookie_header(request).is_some_and(|c| c.contains("session=authed")) {
                html_response(200, dashboard)
            } else {
                html_response(302, "").with_header(LOCATION, "/canteen")
            }
        })
}
