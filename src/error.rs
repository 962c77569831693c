use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("通信エラー: {0}")]
    Transport(String),

    #[error("HTTPステータス異常: {status} ({url})")]
    BadStatus { status: u16, url: String },

    #[error("ログインエラー: {0}")]
    AuthenticationFailed(String),

    #[error("抽出エラー: {0} が見つかりません")]
    ExtractionFailed(&'static str),

    #[error("URLエラー: {0}")]
    InvalidUrl(String),

    #[error("設定エラー: {0}")]
    Config(String),

    #[error("認証情報が未設定です")]
    MissingCredentials,

    #[error("ファイル操作エラー: {0}")]
    FileIO(#[from] std::io::Error),

    #[error("JSONエラー: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScraperError {
    /// 全ロールを試す前に処理を打ち切るべきエラーか
    pub fn is_attempt_fatal(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::BadStatus { .. })
    }
}
