use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::{dto::TokenPair, jwt::JwtKeys};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn token_cookie(name: &'static str, value: String, ttl: Duration) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build()
}

// Added rather than `jar.remove`d: the request may not have carried the cookie
// (bearer-header clients), and the browser must still be told to drop it.
fn removal(name: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build();
    cookie.make_removal();
    cookie
}

pub fn with_tokens(jar: CookieJar, tokens: &TokenPair, keys: &JwtKeys) -> CookieJar {
    jar.add(token_cookie(
        ACCESS_COOKIE,
        tokens.access_token.clone(),
        keys.access_ttl(),
    ))
    .add(token_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        keys.refresh_ttl(),
    ))
}

pub fn cleared(jar: CookieJar) -> CookieJar {
    jar.add(removal(ACCESS_COOKIE)).add(removal(REFRESH_COOKIE))
}
