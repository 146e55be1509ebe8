//! Membership tokens.

use std::borrow::Borrow;
use std::fmt;

/// Token size in random bytes.
pub const TOKEN_BYTES: usize = 16;

/// Length of a token's hex rendering.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// A per-room membership credential.
///
/// 128 bits from the thread-local CSPRNG, rendered as lowercase hex. Tokens
/// never expire and are only meaningful inside the room that issued them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Generate a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; TOKEN_BYTES] = rand::random();
        Self(hex::encode(bytes))
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get the token's wire bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0
    }
}
