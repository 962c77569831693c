//! クッキージャー付きHTTPセッション

mod client;
mod cookie;
mod transport;

pub use client::{SessionClient, SessionRequest, SessionResponse};
pub use cookie::{collect_set_cookies, parse_cookie_pair, split_folded_set_cookie, CookieJar};
pub use transport::ReqwestTransport;
