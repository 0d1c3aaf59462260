use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use super::UserIdentity;

/// Decode an identity token into a user.
///
/// Returns `None` for empty input and for anything that is not base64 of a
/// JSON user record. Failures are never surfaced to the caller; a missing
/// identity is treated the same as "not signed in".
pub fn decode_token(token: &str) -> Option<UserIdentity> {
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    tracing::debug!(token_len = token.len(), "Parsing identity token");

    let bytes = match decode_base64(token) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Identity token is not valid base64");
            return None;
        }
    };

    match serde_json::from_slice::<UserIdentity>(&bytes) {
        Ok(user) => {
            tracing::debug!(user_id = %user.id, user_name = %user.name, "Identity token decoded");
            Some(user)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Identity token is not a user record");
            None
        }
    }
}

/// Encode a user the way the sign-in layer writes the cookie
pub fn encode_token(user: &UserIdentity) -> String {
    // Serializing a struct of strings and integers cannot fail
    let json = serde_json::to_vec(user).unwrap_or_default();
    STANDARD.encode(json)
}

/// Decode base64 (standard or URL-safe, with or without padding)
fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD
        .decode(input)
        .or_else(|_| STANDARD_NO_PAD.decode(input))
        .or_else(|_| URL_SAFE.decode(input))
        .or_else(|_| URL_SAFE_NO_PAD.decode(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let user = UserIdentity::new(12u64, "路人甲", 2);
        let token = encode_token(&user);
        assert_eq!(decode_token(&token), Some(user));
    }

    #[test]
    fn test_decodes_sign_in_cookie() {
        // base64 of {"id":1,"name":"Alice","image":1}
        let token = "eyJpZCI6MSwibmFtZSI6IkFsaWNlIiwiaW1hZ2UiOjF9";
        let user = decode_token(token).unwrap();
        assert_eq!(user, UserIdentity::new(1u64, "Alice", 1));
    }

    #[test]
    fn test_empty_token_is_absent() {
        assert_eq!(decode_token(""), None);
        assert_eq!(decode_token("   "), None);
    }

    #[test]
    fn test_garbage_is_absent() {
        assert_eq!(decode_token("not base64 at all!!"), None);
        // valid base64, but not JSON
        assert_eq!(decode_token(&STANDARD.encode("hello")), None);
        // valid JSON, wrong shape
        assert_eq!(decode_token(&STANDARD.encode(r#"{"nick":"x"}"#)), None);
        assert_eq!(decode_token(&STANDARD.encode("[1,2,3]")), None);
    }

    #[test]
    fn test_unpadded_and_url_safe_tokens() {
        let user = UserIdentity::new("u?>", "Dan", 4);
        let json = serde_json::to_vec(&user).unwrap();
        assert_eq!(decode_token(&STANDARD_NO_PAD.encode(&json)), Some(user.clone()));
        assert_eq!(decode_token(&URL_SAFE.encode(&json)), Some(user));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_token_is_not_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let token = encode_token(&UserIdentity::new(1u64, "Alice", 1));
        tracing::subscriber::with_default(subscriber, || {
            assert!(decode_token(&token).is_some());
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Parsing identity token"));
        assert!(!output.contains(&token));
    }
}
