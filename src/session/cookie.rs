//! 1回のログイン試行専用のクッキージャー

use std::collections::BTreeMap;
use std::fmt;

use reqwest::header::{HeaderMap, SET_COOKIE};

/// クッキー名 → 値
///
/// ログイン試行ごとに新しく作り、永続化も共有もしない。
/// `Debug` には名前だけを出す。
#[derive(Default, Clone, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(String::as_str)
    }

    /// `Cookie` ヘッダの値。空なら None
    pub fn to_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// `Set-Cookie` の値を取り込み、取り込んだクッキー名を返す
    ///
    /// 属性（Path, Expires, HttpOnly など）は無視し、同名は上書きする。
    pub fn merge_set_cookies<S: AsRef<str>>(&mut self, set_cookies: &[S]) -> Vec<String> {
        let mut merged = Vec::new();
        for set_cookie in set_cookies {
            if let Some((name, value)) = parse_cookie_pair(set_cookie.as_ref()) {
                self.cookies.insert(name.to_string(), value.to_string());
                merged.push(name.to_string());
            }
        }
        merged
    }
}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.cookies.keys()).finish()
    }
}

/// `name=value; attr...` の先頭ペア
pub fn parse_cookie_pair(set_cookie: &str) -> Option<(&str, &str)> {
    let pair = set_cookie.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// 1つにまとめられた `Set-Cookie` をクッキーごとに分割する
///
/// `name=` が続くカンマだけを区切りとみなすので、`Expires` の日付は割らない。
/// 値自体に `,name=` を含むクッキーは誤って分割される。
pub fn split_folded_set_cookie(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (index, _) in value.match_indices(',') {
        let rest = &value[index + 1..];
        let segment_end = rest.find(|c: char| c == ';' || c == ',').unwrap_or(rest.len());
        let starts_cookie = rest[..segment_end].find('=').is_some_and(|eq| eq > 0);
        if starts_cookie {
            parts.push(value[start..index].trim());
            start = index + 1;
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// レスポンスヘッダから `Set-Cookie` を全て取り出す
///
/// 複数インスタンスがあればそのまま使い、1つだけのときは折り畳みとみなして分割する。
pub fn collect_set_cookies(headers: &HeaderMap) -> Vec<String> {
    let values: Vec<&str> = headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    match values.as_slice() {
        [] => Vec::new(),
        [single] => split_folded_set_cookie(single)
            .into_iter()
            .map(str::to_string)
            .collect(),
        many => many.iter().map(|value| value.to_string()).collect(),
    }
}
