//! Principal resolution from request context

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fallback client address for non-proxied environments
const LOCAL_FALLBACK_IP: &str = "local-dev";

/// The rate-limited identity behind a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Authenticated,
    Anonymous,
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        self.kind == PrincipalKind::Authenticated
    }
}

/// The request fields identity resolution consumes
///
/// Populated by whatever transport fronts the service; only the verified
/// subject and the trusted proxy headers matter here.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Subject id from a verified bearer credential, if any
    pub verified_subject: Option<String>,
    /// Raw `x-forwarded-for` header value
    pub forwarded_for: Option<String>,
    /// Raw `x-real-ip` header value
    pub real_ip: Option<String>,
}

impl RequestContext {
    pub fn authenticated(subject: impl Into<String>) -> Self {
        Self {
            verified_subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn anonymous_from_ip(ip: impl Into<String>) -> Self {
        Self {
            real_ip: Some(ip.into()),
            ..Self::default()
        }
    }
}

/// Resolves requests to principals; no state beyond the hashing salt
#[derive(Clone)]
pub struct IdentityResolver {
    salt: String,
}

impl IdentityResolver {
    /// The salt is a deployment secret; rotating it invalidates all
    /// outstanding anonymous identities, which is acceptable.
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// Resolve a request to its principal; always succeeds
    pub fn resolve(&self, ctx: &RequestContext) -> Principal {
        if let Some(subject) = &ctx.verified_subject {
            return Principal {
                kind: PrincipalKind::Authenticated,
                id: subject.clone(),
            };
        }

        Principal {
            kind: PrincipalKind::Anonymous,
            id: self.hash_ip(&client_ip(ctx)),
        }
    }

    /// Stable hashed identifier for the caller's IP
    ///
    /// Exposed directly because the anonymous-identity endpoint must return
    /// exactly the id the quota ledger will be keyed by.
    pub fn anonymous_id(&self, ctx: &RequestContext) -> String {
        self.hash_ip(&client_ip(ctx))
    }

    fn hash_ip(&self, ip: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(ip.as_bytes());
        hasher.update(self.salt.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Extract the client IP from trusted proxy headers
fn client_ip(ctx: &RequestContext) -> String {
    if let Some(forwarded) = &ctx.forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = &ctx.real_ip {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    LOCAL_FALLBACK_IP.to_string()
}
