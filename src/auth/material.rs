//! Authentication material value types
//!
//! Immutable inputs handed to the core by the API layer: either a stored
//! cookie jar or credentials with an optional TOTP seed. The core never
//! fetches these itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::driver::traits::Cookie;

/// Ordered cookie collection restored into a fresh driver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieJar(Vec<Cookie>);

impl CookieJar {
    /// Create an empty jar
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a cookie, preserving order
    pub fn push(&mut self, cookie: Cookie) {
        self.0.push(cookie);
    }

    /// Iterate cookies in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Cookie> {
        self.0.iter()
    }

    /// Number of cookies
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the jar is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Cookie>> for CookieJar {
    fn from(cookies: Vec<Cookie>) -> Self {
        Self(cookies)
    }
}

impl<'a> IntoIterator for &'a CookieJar {
    type Item = &'a Cookie;
    type IntoIter = std::slice::Iter<'a, Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Login credentials with an optional TOTP seed
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Account identifier (email or phone)
    pub identifier: String,
    /// Account password
    pub secret: String,
    /// Base32 shared secret for the second factor, when enrolled
    pub totp_seed: Option<String>,
}

impl Credentials {
    /// Create credentials without a second factor
    pub fn new<S: Into<String>>(identifier: S, secret: S) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
            totp_seed: None,
        }
    }

    /// Attach a TOTP seed
    pub fn with_totp_seed<S: Into<String>>(mut self, seed: S) -> Self {
        self.totp_seed = Some(seed.into());
        self
    }
}

// Secrets stay out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("totp_seed", &self.totp_seed.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Authentication material: stored cookies or raw credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthMaterial {
    /// Cookie injection path
    Cookies(CookieJar),
    /// Credential + optional 2FA path
    Credentials(Credentials),
}

impl AuthMaterial {
    /// Build cookie material
    pub fn cookies<J: Into<CookieJar>>(jar: J) -> Self {
        AuthMaterial::Cookies(jar.into())
    }

    /// Build credential material
    pub fn credentials(credentials: Credentials) -> Self {
        AuthMaterial::Credentials(credentials)
    }

    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuthMaterial::Cookies(_) => "cookies",
            AuthMaterial::Credentials(_) => "credentials",
        }
    }
}
