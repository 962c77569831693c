//! ログインフォームの読み取り

use std::sync::LazyLock;

use regex::Regex;

use super::fragment::decode_entities;

static FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<form\b[^>]*\baction=["']([^"']*)["']"#).expect("form action regex")
});

static INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input\b[^>]*\bname=["']([^"']+)["'][^>]*>"#).expect("input regex")
});

static INPUT_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\btype=["']([^"']*)["']"#).expect("type regex"));

static INPUT_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bvalue=["']([^"']*)["']"#).expect("value regex"));

static INPUT_CHECKED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bchecked\b").expect("checked regex"));

static CSRF_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)name=["']_?csrf_token["'][^>]*value=["']([^"']+)["']"#)
        .expect("csrf field regex")
});

static CSRF_META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*name=["']csrf-token["'][^>]*content=["']([^"']+)["']"#)
        .expect("csrf meta regex")
});

/// フォーム送信フィールド
///
/// 文書中の出現順を保つ。同名のフィールドは最初の位置のまま値だけ上書きする。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    fields: Vec<(String, String)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        self.fields.retain(|(key, value)| keep(key, value));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `application/x-www-form-urlencoded` の本文
    pub fn to_urlencoded(&self) -> String {
        self.fields
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl<K, V> FromIterator<(K, V)> for FormFields
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FormFields::new();
        for (key, value) in iter {
            fields.set(key, value);
        }
        fields
    }
}

/// 最初の `<form>` の action 属性
pub fn extract_form_action(html: &str) -> Option<String> {
    FORM_ACTION
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// 送信対象となる `<input>` を全て列挙する
///
/// submit/button/reset は除外、radio/checkbox は checked のものだけ。
/// value がなければ `"on"`。
pub fn extract_form_inputs(html: &str) -> FormFields {
    let mut fields = FormFields::new();
    for caps in INPUT.captures_iter(html) {
        let tag = &caps[0];
        let name = &caps[1];

        let input_type = INPUT_TYPE
            .captures(tag)
            .map(|t| t[1].to_ascii_lowercase())
            .unwrap_or_else(|| "text".to_string());

        match input_type.as_str() {
            "submit" | "button" | "reset" => continue,
            "radio" | "checkbox" if !INPUT_CHECKED.is_match(tag) => continue,
            _ => {}
        }

        let value = INPUT_VALUE
            .captures(tag)
            .map(|v| decode_entities(&v[1]).into_owned())
            .unwrap_or_else(|| "on".to_string());
        fields.set(name, value);
    }
    fields
}

/// CSRFトークン（フォームフィールド優先、なければ meta タグ）
pub fn extract_csrf_token(html: &str) -> Option<String> {
    CSRF_FIELD
        .captures(html)
        .or_else(|| CSRF_META.captures(html))
        .map(|caps| decode_entities(&caps[1]).into_owned())
}
