use axum::http::{header, HeaderMap};

/// Pulls the raw identity token out of an upgrade request.
///
/// This is the seam to the page-serving layer: it owns cookies and sessions,
/// the broadcaster only ever sees the extracted string.
pub trait TokenSource: Send + Sync {
    fn extract(&self, headers: &HeaderMap) -> Option<String>;
}

/// Reads the token from a named cookie
#[derive(Debug, Clone)]
pub struct CookieTokenSource {
    cookie_name: String,
}

impl CookieTokenSource {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl TokenSource for CookieTokenSource {
    fn extract(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, value)| *name == self.cookie_name && !value.is_empty())
            .map(|(_, value)| value.trim_matches('"').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(cookies: &[&str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for cookie in cookies {
            headers.append(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_extracts_named_cookie() {
        let source = CookieTokenSource::new("name");
        let headers = headers_with(&["theme=dark; name=eyJpZCI6MX0=; lang=en"]);
        assert_eq!(source.extract(&headers), Some("eyJpZCI6MX0=".to_string()));
    }

    #[test]
    fn test_searches_every_cookie_header() {
        let source = CookieTokenSource::new("name");
        let headers = headers_with(&["theme=dark", "name=abc"]);
        assert_eq!(source.extract(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_missing_or_cleared_cookie() {
        let source = CookieTokenSource::new("name");
        assert_eq!(source.extract(&HeaderMap::new()), None);
        // signing out sets the cookie to an empty value
        assert_eq!(source.extract(&headers_with(&["name="])), None);
        assert_eq!(source.extract(&headers_with(&["username=abc"])), None);
    }
}
