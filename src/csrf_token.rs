use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use subtle::ConstantTimeEq;

/// 32 bytes of cryptographically secure random data, base64 url encoded as a 43 character string.
fn random_token() -> String {
    use rand::Rng;

    let bytes: [u8; 32] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Value of the `state` parameter of an authorization request. The provider echoes it back in the
/// callback, tying the callback to the attempt that started it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken {
    csrf_token: String,
}

impl CsrfToken {
    pub fn new() -> Self {
        Self {
            csrf_token: random_token(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.csrf_token
    }

    /// Constant-time comparison against a value received from the outside.
    pub(crate) fn matches(&self, received: Option<&str>) -> bool {
        received.is_some_and(|received| {
            self.as_str().as_bytes().ct_eq(received.as_bytes()).into()
        })
    }
}

impl Default for CsrfToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Value of the `nonce` parameter of an authorization request. The provider embeds it into the ID
/// token it issues for this request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce {
    nonce: String,
}

impl Nonce {
    pub fn new() -> Self {
        Self {
            nonce: random_token(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.nonce
    }
}

impl Default for Nonce {
    fn default() -> Self {
        Self::new()
    }
}
