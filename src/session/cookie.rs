use actix_web::cookie::{
    time::{Duration, OffsetDateTime},
    Cookie, SameSite,
};
use serde::{Deserialize, Serialize};

/// Default session cookie name
pub const DEFAULT_COOKIE_NAME: &str = "Session";

/// `SameSite` policy as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => SameSite::Strict,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::None => SameSite::None,
        }
    }
}

/// Cookie attributes passed through to the response untouched
///
/// Every field is optional so a bag can act both as the global configuration
/// and as a per-session override. Unset attributes are simply not emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub path: Option<String>,
    pub same_site: Option<SameSitePolicy>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    /// Max-Age in seconds
    pub max_age: Option<i64>,
}

impl CookieOptions {
    /// Attributes applied when nothing else is configured
    #[must_use]
    pub fn recommended() -> Self {
        Self {
            domain: None,
            path: Some("/".to_string()),
            same_site: Some(SameSitePolicy::Lax),
            secure: Some(true),
            http_only: Some(true),
            max_age: None,
        }
    }

    /// Shallow merge of `self` over `base`; attributes set on `self` win
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        Self {
            domain: self.domain.clone().or_else(|| base.domain.clone()),
            path: self.path.clone().or_else(|| base.path.clone()),
            same_site: self.same_site.or(base.same_site),
            secure: self.secure.or(base.secure),
            http_only: self.http_only.or(base.http_only),
            max_age: self.max_age.or(base.max_age),
        }
    }

    /// Build the response cookie carrying `value`
    #[must_use]
    pub fn build_cookie(&self, name: &str, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(name.to_owned(), value);
        self.apply(&mut cookie);
        if let Some(max_age) = self.max_age {
            cookie.set_max_age(Duration::seconds(max_age));
        }
        cookie
    }

    /// Build a cookie that makes the client drop the session immediately
    #[must_use]
    pub fn build_removal_cookie(&self, name: &str) -> Cookie<'static> {
        let mut cookie = Cookie::new(name.to_owned(), String::new());
        self.apply(&mut cookie);
        cookie.set_max_age(Duration::ZERO);
        cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        cookie
    }

    fn apply(&self, cookie: &mut Cookie<'static>) {
        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }
        if let Some(path) = &self.path {
            cookie.set_path(path.clone());
        }
        if let Some(same_site) = self.same_site {
            cookie.set_same_site(SameSite::from(same_site));
        }
        if let Some(secure) = self.secure {
            cookie.set_secure(secure);
        }
        if let Some(http_only) = self.http_only {
            cookie.set_http_only(http_only);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_session_overrides_win() {
        let global = CookieOptions {
            path: Some("/".to_string()),
            max_age: Some(3600),
            secure: Some(true),
            ..Default::default()
        };
        let session = CookieOptions {
            max_age: Some(60),
            domain: Some("example.com".to_string()),
            ..Default::default()
        };

        let merged = session.merged_over(&global);
        assert_eq!(merged.max_age, Some(60));
        assert_eq!(merged.domain.as_deref(), Some("example.com"));
        assert_eq!(merged.path.as_deref(), Some("/"));
        assert_eq!(merged.secure, Some(true));
    }

    #[test]
    fn test_empty_override_keeps_global() {
        let global = CookieOptions::recommended();
        assert_eq!(CookieOptions::default().merged_over(&global), global);
    }

    #[test]
    fn test_build_cookie_applies_attributes() {
        let options = CookieOptions {
            domain: Some("example.com".to_string()),
            max_age: Some(120),
            same_site: Some(SameSitePolicy::Strict),
            ..CookieOptions::recommended()
        };

        let cookie = options.build_cookie("my.sid", "token".to_string());
        assert_eq!(cookie.name(), "my.sid");
        assert_eq!(cookie.value(), "token");
        assert_eq!(cookie.domain(), Some("example.com"));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(120)));
    }

    #[test]
    fn test_unset_attributes_are_not_emitted() {
        let cookie = CookieOptions::default().build_cookie("sid", "token".to_string());
        assert_eq!(cookie.path(), None);
        assert_eq!(cookie.secure(), None);
        assert_eq!(cookie.max_age(), None);
    }

    #[test]
    fn test_removal_cookie_expires_immediately() {
        let options = CookieOptions {
            max_age: Some(3600),
            ..CookieOptions::recommended()
        };
        let cookie = options.build_removal_cookie("sid");

        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.expires().and_then(|e| e.datetime()),
            Some(OffsetDateTime::UNIX_EPOCH)
        );
    }

    #[test]
    fn test_same_site_policy_parses_lowercase() {
        let options: CookieOptions =
            serde_json::from_str(r#"{"same_site":"strict","max_age":60}"#).unwrap();
        assert_eq!(options.same_site, Some(SameSitePolicy::Strict));
        assert_eq!(options.max_age, Some(60));
    }
}
