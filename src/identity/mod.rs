//! Chat user identity carried in the sign-in cookie.
//!
//! The sign-in pages store a base64-encoded JSON record `{id, name, image}`
//! in a cookie. The token is trusted as-is: it is neither signed nor
//! verified, so anyone able to set the cookie can claim any identity.

mod source;
mod token;
mod user;

pub use source::{CookieTokenSource, TokenSource};
pub use token::{decode_token, encode_token};
pub use user::{UserId, UserIdentity};
