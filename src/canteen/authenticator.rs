//! 食堂ポータルへのログインと残高取得
//!
//! ポータルのログインはロールごとに受け付けが分かれているが、ユーザー名から
//! ロールは分からない。申告ロールから順に、試行ごとに新しいクッキージャーで
//! ログインを試す。

use chrono::Utc;
use reqwest::header::REFERER;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ScraperConfig;
use crate::error::ScraperError;
use crate::html::{
    contains_login_form, extract_balance, extract_csrf_token, extract_form_action,
    extract_form_inputs, extract_login_error_message, extract_owner_name, has_balance_marker,
    looks_like_dashboard, plain_text, FormFields,
};
use crate::session::{CookieJar, ReqwestTransport, SessionClient, SessionRequest};
use crate::traits::{ProgressSink, Transport};
use crate::types::{AttemptOutcome, Credentials, LoginAttemptResult, Role, Snapshot};

pub const LOGIN_PAGE_PATH: &str = "/canteen";
pub const DEFAULT_LOGIN_ACTION: &str = "/canteen/login";

/// ログイン直後のページに残高がないときに順に試すパス
pub const DASHBOARD_PATHS: [&str; 4] = [
    "/canteen/dashboard",
    "/canteen/home",
    "/canteen/index",
    "/canteen",
];

const GENERIC_LOGIN_FAILURE: &str =
    "ログインに失敗しました: ユーザー名・パスワード・ユーザー種別を確認してください";

/// 1回のログイン試行の状態
enum LoginState {
    Start,
    LoginPageFetched { login_url: Url, html: String },
    PayloadSubmitted { html: String },
    Authenticated { dashboard_html: String },
    RejectedAsLoginForm { failure_html: String },
}

/// 進捗の出力先（tracing と呼び出し元のシンク）
#[derive(Clone, Copy)]
struct Progress<'a> {
    sink: Option<&'a dyn ProgressSink>,
    role: Option<Role>,
}

impl<'a> Progress<'a> {
    fn new(sink: Option<&'a dyn ProgressSink>) -> Self {
        Self { sink, role: None }
    }

    /// 申告外ロールの試行では `[seller]` のように接頭辞を付ける
    fn scoped(self, role: Role) -> Self {
        Self {
            role: Some(role),
            ..self
        }
    }

    fn emit(&self, message: &str) {
        let message = match self.role {
            Some(role) => format!("[{}] {}", role, message),
            None => message.to_string(),
        };
        info!("{}", message);
        if let Some(sink) = self.sink {
            sink.message(&message);
        }
    }
}

pub struct CanteenAuthenticator<T> {
    session: SessionClient<T>,
}

impl CanteenAuthenticator<ReqwestTransport> {
    /// reqwest で実ポータルに接続する
    pub fn from_config(config: &ScraperConfig) -> Result<Self, ScraperError> {
        Self::new(ReqwestTransport::new(config)?, config)
    }
}

impl<T: Transport> CanteenAuthenticator<T> {
    pub fn new(transport: T, config: &ScraperConfig) -> Result<Self, ScraperError> {
        Ok(Self {
            session: SessionClient::new(transport, config)?,
        })
    }

    /// ログインして残高を取得する
    ///
    /// 申告ロールで弾かれた場合は残りのロールを正規順に試す。通信エラーと
    /// HTTP 400 以上は即座に全体を中断する。
    pub async fn fetch_snapshot(
        &self,
        credentials: &Credentials,
        sink: Option<&dyn ProgressSink>,
    ) -> Result<Snapshot, ScraperError> {
        let declared = credentials.role;
        let progress = Progress::new(sink);
        let mut last_failure: Option<String> = None;

        for role in Role::trial_order(declared) {
            let attempt_progress = if role == declared {
                progress
            } else {
                progress.emit(&format!("別のユーザー種別で再試行 ({})", role));
                progress.scoped(role)
            };

            let result = self
                .attempt_login(credentials, role, &attempt_progress)
                .await?;

            match result.outcome {
                AttemptOutcome::FormStillPresent { failure_html } => {
                    match extract_login_error_message(&failure_html) {
                        Some(message) => {
                            progress.emit(&format!("ポータルの応答: {}", message));
                            last_failure = Some(message);
                        }
                        None => progress.emit("ポータルのエラーメッセージなし"),
                    }
                }
                AttemptOutcome::Success { dashboard_html } => {
                    if role != declared {
                        progress.emit(&format!(
                            "{} でログインしましたが、保存されたユーザー種別は {} です。アカウント設定を更新してください",
                            role, declared
                        ));
                    }
                    return snapshot_from_dashboard(&dashboard_html, role, &progress);
                }
            }
        }

        warn!("全てのユーザー種別でログインを拒否されました");
        Err(ScraperError::AuthenticationFailed(
            last_failure.unwrap_or_else(|| GENERIC_LOGIN_FAILURE.to_string()),
        ))
    }

    /// 1ロール分のログイン試行
    ///
    /// ジャーはこの試行の中だけで使い、終了時に破棄する。
    async fn attempt_login(
        &self,
        credentials: &Credentials,
        role: Role,
        progress: &Progress<'_>,
    ) -> Result<LoginAttemptResult, ScraperError> {
        let mut jar = CookieJar::new();
        let mut state = LoginState::Start;
        progress.emit(&format!("新しいログインセッションを開始 ({})", role));

        loop {
            debug!("ログイン状態: {:?}", StateName(&state));
            state = match state {
                LoginState::Start => {
                    let login_url = self.session.resolve(LOGIN_PAGE_PATH)?;
                    let page = self
                        .session
                        .fetch_text(SessionRequest::get(login_url.clone()), &mut jar)
                        .await?;
                    LoginState::LoginPageFetched {
                        login_url,
                        html: page.html,
                    }
                }
                LoginState::LoginPageFetched { login_url, html } => {
                    let csrf_token = extract_csrf_token(&html);
                    if csrf_token.is_some() {
                        progress.emit("CSRFトークン取得");
                    } else {
                        progress.emit("CSRFトークンなし、そのまま送信");
                    }
                    let action = self.resolve_action(extract_form_action(&html).as_deref())?;
                    let payload =
                        build_login_payload(&html, credentials, csrf_token.as_deref(), role);
                    progress.emit(&format!("POST送信: user_type={}", role));

                    let request = SessionRequest::post_form(action, payload.to_urlencoded())
                        .with_header(REFERER, login_url.as_str())?;
                    let response = self.session.fetch_text(request, &mut jar).await?;
                    if response.status >= 400 {
                        return Err(ScraperError::BadStatus {
                            status: response.status,
                            url: response.url.to_string(),
                        });
                    }
                    LoginState::PayloadSubmitted {
                        html: response.html,
                    }
                }
                LoginState::PayloadSubmitted { html } => {
                    if contains_login_form(&html) {
                        progress.emit(
                            "送信後もログインページのまま（パスワードかユーザー種別の誤り）",
                        );
                        LoginState::RejectedAsLoginForm { failure_html: html }
                    } else {
                        let dashboard_html = self.locate_dashboard(html, &mut jar).await?;
                        LoginState::Authenticated { dashboard_html }
                    }
                }
                LoginState::Authenticated { dashboard_html } => {
                    return Ok(LoginAttemptResult {
                        outcome: AttemptOutcome::Success { dashboard_html },
                        role,
                    });
                }
                LoginState::RejectedAsLoginForm { failure_html } => {
                    return Ok(LoginAttemptResult {
                        outcome: AttemptOutcome::FormStillPresent { failure_html },
                        role,
                    });
                }
            };
        }
    }

    /// フォームの action を絶対URLにする
    ///
    /// 空、または別オリジンを指す場合は既定のログインパス。
    fn resolve_action(&self, action: Option<&str>) -> Result<Url, ScraperError> {
        let target = action
            .map(str::trim)
            .filter(|action| !action.is_empty())
            .unwrap_or(DEFAULT_LOGIN_ACTION);
        match self.session.resolve(target) {
            Ok(url) if self.session.is_same_origin(&url) => Ok(url),
            Ok(url) => {
                warn!(
                    "別オリジンのフォームactionは使いません: {}",
                    url.origin().ascii_serialization()
                );
                self.session.resolve(DEFAULT_LOGIN_ACTION)
            }
            Err(e) => {
                warn!("フォームactionの解決に失敗 {}: {}", target, e);
                self.session.resolve(DEFAULT_LOGIN_ACTION)
            }
        }
    }

    /// 残高が載っているページを探す
    ///
    /// ログイン直後のページがダッシュボードらしければそのまま使う。
    /// そうでなければ候補パスを順に取得し、最初に残高の目印があったページを返す。
    /// どれにもなければ最後に取得したページ。
    async fn locate_dashboard(
        &self,
        html: String,
        jar: &mut CookieJar,
    ) -> Result<String, ScraperError> {
        if looks_like_dashboard(&html) {
            return Ok(html);
        }

        let mut last = html;
        for path in DASHBOARD_PATHS {
            let url = self.session.resolve(path)?;
            let page = self.session.fetch_text(SessionRequest::get(url), jar).await?;
            if has_balance_marker(&page.html) {
                debug!("ダッシュボード発見: {}", path);
                return Ok(page.html);
            }
            last = page.html;
        }
        Ok(last)
    }
}

/// ログインフォームの送信内容
///
/// 抽出した全フィールド（hidden を含む）に資格情報とロールを上書きし、
/// remember 系のフィールドは必ず落とす。
pub fn build_login_payload(
    login_html: &str,
    credentials: &Credentials,
    csrf_token: Option<&str>,
    role: Role,
) -> FormFields {
    let mut payload = extract_form_inputs(login_html);
    payload.set("username", &credentials.username);
    payload.set("password", &credentials.password);
    if let Some(token) = csrf_token {
        payload.set("_csrf_token", token);
    }
    payload.set("user_type", role.as_form_value());
    payload.retain(|name, _| !name.to_ascii_lowercase().starts_with("remember"));
    payload
}

fn snapshot_from_dashboard(
    html: &str,
    role: Role,
    progress: &Progress<'_>,
) -> Result<Snapshot, ScraperError> {
    let Some(balance_text) = extract_balance(html) else {
        progress.emit("ダッシュボードに残高が見つかりません");
        debug!(
            "ダッシュボード本文: {}",
            plain_text(html).chars().take(200).collect::<String>()
        );
        return Err(ScraperError::ExtractionFailed("balance"));
    };

    let owner_name = extract_owner_name(html);
    if owner_name.is_none() {
        progress.emit("名義人が見つかりません");
    }

    progress.emit(&format!("残高取得: {}", balance_text));
    Ok(Snapshot {
        balance_text,
        owner_name,
        fetched_at: Utc::now(),
        role,
    })
}

/// 状態のログ用表示（HTML本文は出さない）
struct StateName<'a>(&'a LoginState);

impl std::fmt::Debug for StateName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self.0 {
            LoginState::Start => "Start",
            LoginState::LoginPageFetched { .. } => "LoginPageFetched",
            LoginState::PayloadSubmitted { .. } => "PayloadSubmitted",
            LoginState::Authenticated { .. } => "Authenticated",
            LoginState::RejectedAsLoginForm { .. } => "RejectedAsLoginForm",
        })
    }
}
