//! Assertion helpers over response cookies

use actix_web::cookie::{time::Duration, Cookie};
use actix_web::dev::ServiceResponse;

/// Find the response cookie called `name`
#[must_use]
pub fn find_cookie<B>(response: &ServiceResponse<B>, name: &str) -> Option<Cookie<'static>> {
    response
        .response()
        .cookies()
        .find(|cookie| cookie.name() == name)
        .map(Cookie::into_owned)
}

/// Assert that the response issues a non-empty session cookie and return it
///
/// # Panics
///
/// Panics if the cookie is missing or empty.
#[allow(clippy::must_use_candidate)]
pub fn assert_session_cookie<B>(response: &ServiceResponse<B>, name: &str) -> Cookie<'static> {
    let cookie = find_cookie(response, name)
        .unwrap_or_else(|| panic!("Expected a `{name}` cookie on the response"));
    assert!(
        !cookie.value().is_empty(),
        "Expected `{name}` to carry a token"
    );
    cookie
}

/// Assert that the response tells the client to drop the session cookie
///
/// # Panics
///
/// Panics if the cookie is missing or is not a removal cookie.
pub fn assert_cookie_cleared<B>(response: &ServiceResponse<B>, name: &str) {
    let cookie = find_cookie(response, name)
        .unwrap_or_else(|| panic!("Expected a clearing `{name}` cookie on the response"));
    assert_eq!(cookie.value(), "", "Clearing cookie must be empty");
    assert_eq!(
        cookie.max_age(),
        Some(Duration::ZERO),
        "Clearing cookie must expire immediately"
    );
}

/// Assert that the response leaves the session cookie alone
///
/// # Panics
///
/// Panics if the response sets the cookie.
pub fn assert_no_cookie<B>(response: &ServiceResponse<B>, name: &str) {
    assert!(
        find_cookie(response, name).is_none(),
        "Expected no `{name}` cookie on the response"
    );
}
