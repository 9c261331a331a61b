use thiserror::Error;

/// The credential cached on this device, if any. Carries the remote account it
/// belongs to so block messages can name it.
#[derive(Debug, Clone)]
pub struct CachedSession {
    pub account: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// The remote answered and said no: the credential is stale or revoked.
    #[error("session rejected: {0}")]
    Rejected(String),

    /// Verification could not be attempted at all.
    #[error("verification unreachable: {0}")]
    Network(String),
}

/// External session provider. Token refresh mechanics live behind this trait;
/// the engine only asks whether a credential exists and whether the remote
/// still honors it.
pub trait AuthProvider {
    fn cached_session(&self) -> Option<CachedSession>;
    fn verify_live(&self) -> Result<(), AuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    NoSession,
    Expired,
    NoNetwork,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSession => "no_session",
            Self::Expired => "expired",
            Self::NoNetwork => "no_network",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Blocked {
    pub reason: BlockReason,
    pub message: String,
}

/// Verify there is a live remote session before any flush writes. Remote
/// writes performed under an anonymous/default role could cross tenant
/// boundaries at the storage layer, so a non-Ok result must stop the flush
/// before the first dispatch. Does not touch the queue.
pub fn require_live_session(provider: &dyn AuthProvider) -> Result<CachedSession, Blocked> {
    let session = match provider.cached_session() {
        Some(session) => session,
        None => {
            return Err(Blocked {
                reason: BlockReason::NoSession,
                message: "no sign-in session on this device".into(),
            });
        }
    };

    match provider.verify_live() {
        Ok(()) => Ok(session),
        Err(AuthError::Rejected(detail)) => Err(Blocked {
            reason: BlockReason::Expired,
            message: format!("session for {} is no longer valid: {detail}", session.account),
        }),
        Err(AuthError::Network(detail)) => Err(Blocked {
            reason: BlockReason::NoNetwork,
            message: format!("could not verify session: {detail}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider {
        session: Option<CachedSession>,
        verify: Result<(), AuthError>,
    }

    impl AuthProvider for StubProvider {
        fn cached_session(&self) -> Option<CachedSession> {
            self.session.clone()
        }

        fn verify_live(&self) -> Result<(), AuthError> {
            match &self.verify {
                Ok(()) => Ok(()),
                Err(AuthError::Rejected(s)) => Err(AuthError::Rejected(s.clone())),
                Err(AuthError::Network(s)) => Err(AuthError::Network(s.clone())),
            }
        }
    }

    #[test]
    fn missing_credential_blocks_with_no_session() {
        let provider = StubProvider {
            session: None,
            verify: Ok(()),
        };
        let blocked = require_live_session(&provider).unwrap_err();
        assert_eq!(blocked.reason, BlockReason::NoSession);
    }

    #[test]
    fn rejected_verification_blocks_with_expired() {
        let provider = StubProvider {
            session: Some(CachedSession {
                account: "owner@shop.example".into(),
            }),
            verify: Err(AuthError::Rejected("token expired".into())),
        };
        let blocked = require_live_session(&provider).unwrap_err();
        assert_eq!(blocked.reason, BlockReason::Expired);
        assert!(blocked.message.contains("owner@shop.example"));
    }

    #[test]
    fn unreachable_verification_blocks_with_no_network() {
        let provider = StubProvider {
            session: Some(CachedSession {
                account: "owner@shop.example".into(),
            }),
            verify: Err(AuthError::Network("dns failure".into())),
        };
        let blocked = require_live_session(&provider).unwrap_err();
        assert_eq!(blocked.reason, BlockReason::NoNetwork);
    }

    #[test]
    fn live_session_passes() {
        let provider = StubProvider {
            session: Some(CachedSession {
                account: "owner@shop.example".into(),
            }),
            verify: Ok(()),
        };
        let session = require_live_session(&provider).unwrap();
        assert_eq!(session.account, "owner@shop.example");
    }
}
