//! HTML断片抽出モジュール
//!
//! ネットワークやI/Oを持たない純粋関数のみ。並行に何度呼んでもよい。

mod form;
mod fragment;
mod rules;

pub use form::{extract_csrf_token, extract_form_action, extract_form_inputs, FormFields};
pub use fragment::{
    collapse_whitespace, decode_entities, extract_first_span, extract_text_by_class,
    find_section, has_text, strip_tags,
};
pub use rules::{
    apply_rules, contains_login_form, extract_balance, extract_login_error_message,
    extract_owner_name, has_balance_marker, looks_like_dashboard, plain_text, ExtractionRule,
    BALANCE_RULES, OWNER_RULES,
};
