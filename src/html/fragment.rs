//! HTML文字列からの断片抽出
//!
//! DOMは組み立てず、ポータルの既知のマークアップに合わせた正規表現で
//! 必要な断片だけを取り出す。全て副作用のない関数。

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z][a-zA-Z0-9]*);").expect("entity regex")
});

pub(crate) static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

static FIRST_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<span\b[^>]*>(.*?)</span\s*>").expect("span regex"));

static DIV_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)div\b[^>]*>").expect("div regex"));

/// HTMLエンティティをデコードする
///
/// 名前付きは基本的なものだけ対応し、未知のものはそのまま残す。
pub fn decode_entities(value: &str) -> Cow<'_, str> {
    ENTITY.replace_all(value, |caps: &Captures| {
        let entity = &caps[1];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => {
                if let Some(hex) = entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                {
                    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse::<u32>().ok().and_then(char::from_u32)
                } else {
                    None
                }
            }
        };
        decoded
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    })
}

/// タグを取り除く
pub fn strip_tags(value: &str) -> Cow<'_, str> {
    TAG.replace_all(value, "")
}

/// 連続する空白を1つにまとめ前後を削る
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// タグ除去・trim・デコードした中身。空なら None
pub(crate) fn inner_text(fragment: &str) -> Option<String> {
    let stripped = strip_tags(fragment);
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(decode_entities(trimmed).into_owned())
}

/// `class` に `class_keyword` を部分文字列として含む最初の `<div>` の中身
///
/// 入れ子の `<div>` は対応を数えて閉じタグを探す。閉じタグがなければ文書末尾まで。
pub fn find_section<'a>(html: &'a str, class_keyword: &str) -> Option<&'a str> {
    let pattern = format!(
        r#"(?i)<div\b[^>]*\bclass=["'][^"']*{}[^"']*["'][^>]*>"#,
        regex::escape(class_keyword)
    );
    let open = Regex::new(&pattern)
        .expect("section regex from escaped keyword")
        .find(html)?;
    let start = open.end();

    let mut depth = 1usize;
    for caps in DIV_TAG.captures_iter(&html[start..]) {
        let Some(tag) = caps.get(0) else { continue };
        if caps[1].is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(&html[start..start + tag.start()]);
            }
        }
    }
    Some(&html[start..])
}

/// class 属性が条件を満たす最初の `<tag>` のテキスト
///
/// テキストが空の要素は飛ばして次を探す。
pub(crate) fn first_text_where<F>(html: &str, tag: &str, class_matches: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let tag = regex::escape(tag);
    let pattern = format!(
        r#"(?is)<{tag}\b[^>]*\bclass=["']([^"']*)["'][^>]*>(.*?)</{tag}\s*>"#
    );
    let regex = Regex::new(&pattern).expect("element regex from escaped tag");
    let found = regex
        .captures_iter(html)
        .filter(|caps| class_matches(&caps[1]))
        .find_map(|caps| inner_text(&caps[2]));
    found
}

/// class をトークン分割した集合が `class_keywords` を全て含む最初の `<tag>` のテキスト
pub fn extract_text_by_class(html: &str, tag: &str, class_keywords: &[&str]) -> Option<String> {
    first_text_where(html, tag, |class| {
        let tokens: Vec<&str> = class.split_whitespace().collect();
        class_keywords.iter().all(|keyword| tokens.contains(keyword))
    })
}

/// 最初の `<span>` のテキスト
pub fn extract_first_span(html: &str) -> Option<String> {
    let caps = FIRST_SPAN.captures(html)?;
    inner_text(&caps[1])
}

/// 大文字小文字を無視した部分一致
pub fn has_text(html: &str, needle: &str) -> bool {
    html.to_lowercase().contains(&needle.to_lowercase())
}
