use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// PKCE code verifier, see <https://datatracker.ietf.org/doc/html/rfc7636#section-4.1>.
///
/// `LENGTH` is the number of characters of the encoded verifier and must lie in `43..=128`.
#[derive(Clone, PartialEq, Eq)]
pub struct CodeVerifier<const LENGTH: usize> {
    code_verifier: String,
}

impl<const LENGTH: usize> CodeVerifier<LENGTH> {
    pub(crate) fn generate() -> Self {
        use rand::RngCore;

        const {
            assert!(LENGTH >= 43 && LENGTH <= 128, "Invalid code verifier length");
        }

        // Base64 encodes 3 bytes into 4 characters. Without padding, `n` random bytes produce
        // exactly `ceil(n * 4 / 3)` characters.
        let mut bytes = vec![0u8; (LENGTH * 3).div_ceil(4)];
        rand::rng().fill_bytes(&mut bytes);

        let mut code_verifier = URL_SAFE_NO_PAD.encode(&bytes);
        code_verifier.truncate(LENGTH);

        Self { code_verifier }
    }

    pub(crate) fn to_code_challenge(&self) -> CodeChallenge {
        use sha2::Digest;

        let digest = sha2::Sha256::digest(self.code_verifier.as_bytes());

        CodeChallenge {
            code_challenge: URL_SAFE_NO_PAD.encode(digest),
            code_challenge_method: CodeChallengeMethod::S256,
        }
    }

    pub fn code_verifier(&self) -> &str {
        self.code_verifier.as_str()
    }
}

// Never print the verifier itself. It is the secret half of the PKCE pair.
impl<const LENGTH: usize> std::fmt::Debug for CodeVerifier<LENGTH> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeVerifier")
            .field("length", &LENGTH)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
}

impl CodeChallengeMethod {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            CodeChallengeMethod::S256 => "S256",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeChallenge {
    code_challenge: String,
    code_challenge_method: CodeChallengeMethod,
}

impl CodeChallenge {
    pub fn code_challenge(&self) -> &str {
        self.code_challenge.as_str()
    }

    pub fn code_challenge_method(&self) -> CodeChallengeMethod {
        self.code_challenge_method
    }
}
