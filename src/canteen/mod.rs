//! 食堂ポータルのログイン・残高取得モジュール

mod authenticator;

pub use authenticator::{
    build_login_payload, CanteenAuthenticator, DASHBOARD_PATHS, DEFAULT_LOGIN_ACTION,
    LOGIN_PAGE_PATH,
};
