use actix_web::cookie::Cookie;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// HTTP-only session cookie scoped to the whole site
pub fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .secure(secure)
        .finish()
}

/// Instructs the client to drop a session cookie
pub fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new(), secure);
    cookie.make_removal();
    cookie
}
