//! 残高・名義の抽出ルールとログイン結果の判定
//!
//! ポータルには安定したIDがなく、ユーティリティCSSクラスの組み合わせだけが
//! 目印になる。フィールドごとに具体的なものから順にルールを並べ、
//! 最初に値が取れたものを採用する。

use std::sync::LazyLock;

use regex::Regex;

use super::fragment::{
    collapse_whitespace, decode_entities, extract_first_span, extract_text_by_class,
    find_section, first_text_where, has_text, strip_tags, TAG,
};

/// 抽出ルール
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRule {
    /// class トークンを全て持つ最初の `tag`
    ClassTokens {
        tag: &'static str,
        tokens: &'static [&'static str],
    },
    /// class 属性にいずれかのキーワードを部分文字列として含む最初の `tag`
    ClassContainsAny {
        tag: &'static str,
        keywords: &'static [&'static str],
    },
    /// 最初の `<span>`
    FirstSpan,
    /// class にキーワードを含む `<div>` の中だけで `rule` を適用
    Within {
        section: &'static str,
        rule: &'static ExtractionRule,
    },
}

impl ExtractionRule {
    pub fn apply(&self, html: &str) -> Option<String> {
        match self {
            Self::ClassTokens { tag, tokens } => extract_text_by_class(html, tag, tokens),
            Self::ClassContainsAny { tag, keywords } => first_text_where(html, tag, |class| {
                keywords.iter().any(|keyword| class.contains(keyword))
            }),
            Self::FirstSpan => extract_first_span(html),
            Self::Within { section, rule } => find_section(html, section).and_then(|s| rule.apply(s)),
        }
    }
}

/// ルールを順に試し、最初に取れた値を空白整形して返す
pub fn apply_rules(html: &str, rules: &[ExtractionRule]) -> Option<String> {
    rules
        .iter()
        .filter_map(|rule| rule.apply(html))
        .map(|text| collapse_whitespace(&text))
        .find(|text| !text.is_empty())
}

const BALANCE_CARD: &str = "bg-gradient-to-r";

const BALANCE_P_MT1: ExtractionRule = ExtractionRule::ClassTokens {
    tag: "p",
    tokens: &["text-4xl", "font-bold", "mt-1"],
};
const BALANCE_P: ExtractionRule = ExtractionRule::ClassTokens {
    tag: "p",
    tokens: &["text-4xl", "font-bold"],
};
const BALANCE_H1: ExtractionRule = ExtractionRule::ClassTokens {
    tag: "h1",
    tokens: &["text-4xl", "font-bold"],
};
const OWNER_SPAN: ExtractionRule = ExtractionRule::ClassContainsAny {
    tag: "span",
    keywords: &["font-medium", "text-sm"],
};

/// 残高: グラデーションカード内を先に、なければ文書全体
pub const BALANCE_RULES: &[ExtractionRule] = &[
    ExtractionRule::Within {
        section: BALANCE_CARD,
        rule: &BALANCE_P_MT1,
    },
    ExtractionRule::Within {
        section: BALANCE_CARD,
        rule: &BALANCE_P,
    },
    ExtractionRule::Within {
        section: BALANCE_CARD,
        rule: &BALANCE_H1,
    },
    BALANCE_P_MT1,
    BALANCE_P,
    BALANCE_H1,
];

/// 名義: `mt-6` セクションの最初の span、なければカード内の小さい文字の span
pub const OWNER_RULES: &[ExtractionRule] = &[
    ExtractionRule::Within {
        section: "mt-6",
        rule: &ExtractionRule::FirstSpan,
    },
    ExtractionRule::Within {
        section: BALANCE_CARD,
        rule: &OWNER_SPAN,
    },
];

pub fn extract_balance(html: &str) -> Option<String> {
    apply_rules(html, BALANCE_RULES)
}

pub fn extract_owner_name(html: &str) -> Option<String> {
    apply_rules(html, OWNER_RULES)
}

static LOGIN_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<form\b[^>]*\baction=["'][^"']*login[^"']*["']"#).expect("login form regex")
});

static USERNAME_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)name=["']username["']"#).expect("username regex"));

static ERROR_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)<div\b[^>]*\bclass=["'][^"']*(?:alert|bg-red|text-red|error)[^"']*["'][^>]*>(.*?)</div\s*>"#,
    )
    .expect("error block regex")
});

/// ログインフォームが残っているか（送信後ならログイン失敗）
pub fn contains_login_form(html: &str) -> bool {
    LOGIN_FORM.is_match(html) && USERNAME_FIELD.is_match(html)
}

/// ポータルが表示したエラーメッセージ
pub fn extract_login_error_message(html: &str) -> Option<String> {
    let caps = ERROR_BLOCK.captures(html)?;
    let text = TAG.replace_all(&caps[1], " ");
    let text = collapse_whitespace(&decode_entities(&text));
    (!text.is_empty()).then_some(text)
}

/// ログイン直後のページがそのままダッシュボードに見えるか
pub fn looks_like_dashboard(html: &str) -> bool {
    has_text(html, "text-4xl") || has_text(html, "font-bold")
}

/// ダッシュボード候補に残高の目印があるか
pub fn has_balance_marker(html: &str) -> bool {
    has_text(html, "text-4xl") || has_text(html, "balance")
}

/// タグ除去だけ行ったテキスト（ログ出力用）
pub fn plain_text(html: &str) -> String {
    collapse_whitespace(&decode_entities(&strip_tags(html)))
}
