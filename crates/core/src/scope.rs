use std::fmt;

use serde::{Deserialize, Serialize};

/// The namespace a device user's queued data lives under: one business tenant
/// plus one local device user. `{None, None}` is the anonymous scope, used for
/// pre-login queuing and legacy-data compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantScope {
    pub business_id: Option<String>,
    pub local_user_id: Option<String>,
}

impl TenantScope {
    pub fn new(business_id: impl Into<String>, local_user_id: impl Into<String>) -> Self {
        Self {
            business_id: Some(business_id.into()),
            local_user_id: Some(local_user_id.into()),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            business_id: None,
            local_user_id: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.business_id.is_none() && self.local_user_id.is_none()
    }

    /// Derive the storage namespace for this scope. Deterministic, stable
    /// across restarts, and collision-free: an absent field encodes as `-`, a
    /// present one as `=` followed by the value with `%` and `/` escaped, so no
    /// two distinct scopes share a key and no key collides with the legacy
    /// (empty) namespace.
    pub fn key(&self) -> ScopeKey {
        let mut out = String::new();
        encode_segment(&mut out, self.business_id.as_deref());
        out.push('/');
        encode_segment(&mut out, self.local_user_id.as_deref());
        ScopeKey(out)
    }
}

fn encode_segment(out: &mut String, value: Option<&str>) {
    match value {
        None => out.push('-'),
        Some(v) => {
            out.push('=');
            for ch in v.chars() {
                match ch {
                    '%' => out.push_str("%25"),
                    '/' => out.push_str("%2f"),
                    c => out.push(c),
                }
            }
        }
    }
}

/// Storage namespace prefix derived from a [`TenantScope`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves the tenant scope from the currently signed-in local identity.
/// Called fresh at the start of every queue operation; implementations read
/// whatever session state the host application keeps and must not have side
/// effects.
pub trait ScopeResolver: Send + Sync {
    fn resolve(&self) -> TenantScope;
}

/// A resolver pinned to one scope. Useful for tools that operate on a known
/// tenant rather than the interactive session.
pub struct FixedScope(pub TenantScope);

impl ScopeResolver for FixedScope {
    fn resolve(&self) -> TenantScope {
        self.0.clone()
    }
}
