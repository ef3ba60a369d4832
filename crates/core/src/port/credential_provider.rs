// Credential Provider Port (Interface)

use async_trait::async_trait;

use crate::error::Result;

/// Bearer-style credential for the remote record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Credential source. Refresh is expected to complete within the
/// executor's refresh budget; callers wrap it in a timeout and surface
/// `SyncError::RefreshTimeout` when it does not.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Current token
    async fn get_token(&self) -> Result<Token>;

    /// Force a refresh and return the new token
    async fn refresh_token(&self) -> Result<Token>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::SyncError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock provider: each refresh rotates the token to `token-N`
    pub struct MockCredentialProvider {
        token: Mutex<Token>,
        refresh_count: AtomicUsize,
        fail_refresh: AtomicBool,
    }

    impl MockCredentialProvider {
        pub fn new(initial: impl Into<String>) -> Self {
            Self {
                token: Mutex::new(Token::new(initial)),
                refresh_count: AtomicUsize::new(0),
                fail_refresh: AtomicBool::new(false),
            }
        }

        pub fn set_fail_refresh(&self, fail: bool) {
            self.fail_refresh.store(fail, Ordering::SeqCst);
        }

        pub fn refresh_count(&self) -> usize {
            self.refresh_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialProvider for MockCredentialProvider {
        async fn get_token(&self) -> Result<Token> {
            Ok(self.token.lock().unwrap().clone())
        }

        async fn refresh_token(&self) -> Result<Token> {
            if self.fail_refresh.load(Ordering::SeqCst) {
                return Err(SyncError::NotAuthorized("refresh rejected".to_string()));
            }
            let n = self.refresh_count.fetch_add(1, Ordering::SeqCst) + 1;
            let token = Token::new(format!("token-{n}"));
            *self.token.lock().unwrap() = token.clone();
            Ok(token)
        }
    }
}
