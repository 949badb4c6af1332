use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};

/// Signing keys usable for ID token verification.
///
/// Only RSA keys carrying both modulus and exponent make it in here. Elliptic-curve, symmetric and
/// incomplete keys are dropped on construction, so a token signed with one of those reports a
/// missing key instead of failing somewhere inside signature verification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilteredKeySet {
    keys: Vec<Jwk>,
}

impl FilteredKeySet {
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = Option<&str>> {
        self.keys.iter().map(|jwk| jwk.common.key_id.as_deref())
    }

    /// Key to verify a token with the given `kid` header. A token without `kid` can only be
    /// verified when there is exactly one key to choose from.
    pub(crate) fn select(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self
                .keys
                .iter()
                .find(|jwk| jwk.common.key_id.as_deref() == Some(kid)),
            None => match self.keys.as_slice() {
                [single] => Some(single),
                _ => None,
            },
        }
    }

    pub fn to_jwk_set(&self) -> JwkSet {
        JwkSet {
            keys: self.keys.clone(),
        }
    }
}

/// The one predicate deciding whether a key is kept, whatever representation it arrived in.
pub fn has_rsa_components(n: Option<&str>, e: Option<&str>) -> bool {
    n.is_some_and(|n| !n.is_empty()) && e.is_some_and(|e| !e.is_empty())
}

fn is_usable(jwk: &Jwk) -> bool {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => has_rsa_components(Some(&rsa.n), Some(&rsa.e)),
        _ => false,
    }
}

pub fn filter_keys(jwk_set: &JwkSet) -> FilteredKeySet {
    let keys = jwk_set
        .keys
        .iter()
        .filter(|jwk| {
            let usable = is_usable(jwk);
            if !usable {
                tracing::debug!(kid = ?jwk.common.key_id, "Dropping key without RSA modulus and exponent");
            }
            usable
        })
        .cloned()
        .collect();
    FilteredKeySet { keys }
}

/// Like [`filter_keys`], for keys still in their JSON form. Entries the JWK parser rejects are
/// dropped as well.
pub fn filter_raw_keys(raw_keys: Vec<serde_json::Value>) -> FilteredKeySet {
    let keys = raw_keys
        .into_iter()
        .filter_map(|raw| {
            let kid = raw.get("kid").and_then(serde_json::Value::as_str).map(str::to_owned);
            let n = raw.get("n").and_then(serde_json::Value::as_str);
            let e = raw.get("e").and_then(serde_json::Value::as_str);
            if !has_rsa_components(n, e) {
                tracing::debug!(?kid, "Dropping key without RSA modulus and exponent");
                return None;
            }
            match serde_json::from_value::<Jwk>(raw) {
                Ok(jwk) if is_usable(&jwk) => Some(jwk),
                Ok(_) => {
                    tracing::debug!(?kid, "Dropping non-RSA key");
                    None
                }
                Err(err) => {
                    tracing::warn!(?kid, ?err, "Dropping key that could not be parsed as JWK");
                    None
                }
            }
        })
        .collect();
    FilteredKeySet { keys }
}
