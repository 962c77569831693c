//! ポータルとやり取りする値の型定義

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// ログインフォームの `user_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Seller,
    Admin,
}

impl Role {
    /// ロール試行の正規順
    pub const ALL: [Role; 3] = [Role::Student, Role::Seller, Role::Admin];

    /// フォームに送る値
    pub fn as_form_value(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Seller => "seller",
            Role::Admin => "admin",
        }
    }

    /// 申告ロールを先頭に、残りを正規順で並べる
    pub fn trial_order(declared: Role) -> Vec<Role> {
        let mut order = vec![declared];
        order.extend(Self::ALL.into_iter().filter(|role| *role != declared));
        order
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_form_value())
    }
}

/// ログイン情報
///
/// `Debug` ではパスワードを伏せる。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    #[serde(default, rename = "user_type")]
    pub role: Role,
}

impl Credentials {
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

    /// ユーザー名・パスワードが両方入っているか
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

/// 認証済みセッションから取得した残高
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// ポータルの表示そのまま（数値化しない）
    pub balance_text: String,
    pub owner_name: Option<String>,
    pub fetched_at: DateTime<Utc>,
    /// 実際にログインできたロール
    pub role: Role,
}

impl Snapshot {
    /// 申告ロールと違うロールでログインできた場合 true
    pub fn role_mismatch(&self, declared: Role) -> bool {
        self.role != declared
    }
}

/// 1回のログイン試行の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success { dashboard_html: String },
    FormStillPresent { failure_html: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAttemptResult {
    pub outcome: AttemptOutcome,
    pub role: Role,
}
