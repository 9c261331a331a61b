use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tillsync_core::{ScopeResolver, TenantScope};
use tillsync_engine::{AuthError, AuthProvider, CachedSession, ConnectivitySignal};

/// Switchable session state standing in for the host application's sign-in
/// flow. Cloning shares the underlying identity.
#[derive(Clone)]
pub struct SharedSession {
    scope: Arc<Mutex<TenantScope>>,
}

impl SharedSession {
    pub fn new() -> Self {
        Self {
            scope: Arc::new(Mutex::new(TenantScope::anonymous())),
        }
    }

    pub fn sign_in(&self, business_id: &str, local_user_id: &str) {
        *self.scope.lock().expect("session poisoned") =
            TenantScope::new(business_id, local_user_id);
    }

    pub fn sign_out(&self) {
        *self.scope.lock().expect("session poisoned") = TenantScope::anonymous();
    }
}

impl Default for SharedSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeResolver for SharedSession {
    fn resolve(&self) -> TenantScope {
        self.scope.lock().expect("session poisoned").clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScript {
    /// Credential cached and the remote honors it.
    Live,
    /// Nothing cached at all.
    NoSession,
    /// Credential cached but the remote rejects it.
    Expired,
    /// Verification endpoint unreachable.
    Offline,
}

/// Auth provider following a script the test switches at will.
#[derive(Clone)]
pub struct ScriptedAuth {
    mode: Arc<Mutex<AuthScript>>,
    account: String,
}

impl ScriptedAuth {
    pub fn live(account: &str) -> Self {
        Self {
            mode: Arc::new(Mutex::new(AuthScript::Live)),
            account: account.to_string(),
        }
    }

    pub fn set(&self, mode: AuthScript) {
        *self.mode.lock().expect("auth script poisoned") = mode;
    }
}

impl AuthProvider for ScriptedAuth {
    fn cached_session(&self) -> Option<CachedSession> {
        match *self.mode.lock().expect("auth script poisoned") {
            AuthScript::NoSession => None,
            _ => Some(CachedSession {
                account: self.account.clone(),
            }),
        }
    }

    fn verify_live(&self) -> Result<(), AuthError> {
        match *self.mode.lock().expect("auth script poisoned") {
            AuthScript::Live | AuthScript::NoSession => Ok(()),
            AuthScript::Expired => Err(AuthError::Rejected("refresh token revoked".into())),
            AuthScript::Offline => Err(AuthError::Network("verification endpoint unreachable".into())),
        }
    }
}

/// Connectivity flag the test flips.
#[derive(Clone)]
pub struct Toggle {
    online: Arc<AtomicBool>,
}

impl Toggle {
    pub fn online() -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl ConnectivitySignal for Toggle {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
