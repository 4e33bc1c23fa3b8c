//! Credential lifecycle: acquire once, then refresh on a fixed period in the background

use super::credential::CredentialHandle;
use super::method::AuthMethod;
use super::service::AuthService;
use crate::config::AuthConfig;
use crate::error::Result;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Owns a credential and the single task that keeps it fresh
///
/// Dropping the manager cancels the refresh task. Use [`shutdown`](Self::shutdown)
/// to also wait for it to exit.
pub struct AuthorizationManager {
    credential: CredentialHandle,
    cancel_token: CancellationToken,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuthorizationManager {
    /// Authenticate, verify the token and start the background refresh
    pub async fn acquire(service: AuthService, config: &AuthConfig, method: &AuthMethod) -> Result<Self> {
        let credential = service.authenticate(method).await?;
        let handle = CredentialHandle::new(credential);
        let cancel_token = CancellationToken::new();

        let task = spawn_refresh_task(
            service,
            handle.clone(),
            config.refresh_interval,
            cancel_token.clone(),
        );

        Ok(Self {
            credential: handle,
            cancel_token,
            refresh_task: Mutex::new(Some(task)),
        })
    }

    /// Shared handle to the live credential
    pub fn credential(&self) -> CredentialHandle {
        self.credential.clone()
    }

    /// Stop refreshing
    ///
    /// Idempotent and safe to call from synchronous code or outside a runtime.
    pub fn cancel(&self) {
        if !self.cancel_token.is_cancelled() {
            tracing::info!("stopping token refresh");
        }
        self.cancel_token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel and wait for the refresh task to exit
    pub async fn shutdown(&self) {
        self.cancel();
        let task = match self.refresh_task.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(task) = task
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "token refresh task ended abnormally");
        }
    }
}

impl Drop for AuthorizationManager {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawn the refresh loop
///
/// A failed refresh keeps the current credential and tries again on the next tick.
fn spawn_refresh_task(
    service: AuthService,
    credential: CredentialHandle,
    interval: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let current = credential.snapshot();
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                result = service.refresh(&current) => match result {
                    Ok(fresh) => {
                        tracing::info!(expiry = %fresh.expiry(), "token refreshed");
                        credential.replace(fresh);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "token refresh failed, keeping current token");
                    }
                }
            }
        }
        tracing::debug!("token refresh task stopped");
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_helpers::{Reply, ScriptedTransport};
    use crate::transport::Method;
    use serde_json::json;
    use std::sync::Arc;

    const AUTH: &str = "https://auth.example.com";
    const INTERVAL: Duration = Duration::from_secs(29 * 60);

    fn token(value: &str, expires_ms: i64) -> Reply {
        Reply::json(
            201,
            json!({
                "status": "SUCCESS",
                "tokenInfo": { "tokenValue": value, "expiresAt": expires_ms }
            }),
        )
    }

    fn scripted(refresh: Vec<Reply>) -> Arc<ScriptedTransport> {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(Method::Post, format!("{AUTH}/token/authenticate"), vec![token("t0", 1_000)]);
        transport.on(
            Method::Get,
            format!("{AUTH}/token/validate"),
            vec![Reply::json(200, json!({"statusMessage": "Token validated"}))],
        );
        transport.on(Method::Post, format!("{AUTH}/token/refresh"), refresh);
        transport
    }

    fn refresh_calls(transport: &ScriptedTransport) -> usize {
        transport
            .calls()
            .iter()
            .filter(|c| c.ends_with("/token/refresh"))
            .count()
    }

    async fn acquire(transport: Arc<ScriptedTransport>) -> AuthorizationManager {
        let method = AuthMethod::Basic {
            username: "u".into(),
            password: "p".into(),
        };
        let config = AuthConfig {
            refresh_interval: INTERVAL,
        };
        AuthorizationManager::acquire(AuthService::new(transport, AUTH), &config, &method)
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_replaces_token_and_expiry_together() {
        let transport = scripted(vec![token("t1", 2_000), token("t2", 3_000)]);
        let manager = acquire(transport.clone()).await;
        let handle = manager.credential();

        assert_eq!(handle.snapshot().token_value(), "t0");
        assert_eq!(refresh_calls(&transport), 0);

        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.token_value(), "t1");
        assert_eq!(snapshot.expiry().timestamp_millis(), 2_000);

        tokio::time::sleep(INTERVAL).await;
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.token_value(), "t2");
        assert_eq!(snapshot.expiry().timestamp_millis(), 3_000);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_sends_current_token() {
        let transport = scripted(vec![token("t1", 2_000), token("t2", 3_000)]);
        let manager = acquire(transport.clone()).await;

        tokio::time::sleep(INTERVAL * 2 + Duration::from_secs(1)).await;
        manager.shutdown().await;

        let auth_headers: Vec<String> = transport
            .requests()
            .iter()
            .filter(|r| r.url.ends_with("/token/refresh"))
            .map(|r| r.header_value("Authorization").unwrap().to_string())
            .collect();
        assert_eq!(auth_headers, vec!["AnaplanAuthToken t0", "AnaplanAuthToken t1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_token_and_retries_next_tick() {
        let transport = scripted(vec![Reply::status(500), token("t1", 2_000)]);
        let manager = acquire(transport.clone()).await;
        let handle = manager.credential();

        tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
        assert_eq!(handle.snapshot().token_value(), "t0");
        assert_eq!(refresh_calls(&transport), 1);

        tokio::time::sleep(INTERVAL).await;
        assert_eq!(handle.snapshot().token_value(), "t1");
        assert_eq!(refresh_calls(&transport), 2);

        manager.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent_and_stops_refresh() {
        let transport = scripted(vec![token("t1", 2_000)]);
        let manager = acquire(transport.clone()).await;

        manager.cancel();
        manager.cancel();
        assert!(manager.is_cancelled());
        manager.shutdown().await;
        manager.shutdown().await;

        tokio::time::sleep(INTERVAL * 3).await;
        assert_eq!(refresh_calls(&transport), 0);
        assert_eq!(manager.credential().snapshot().token_value(), "t0");
    }

    #[test]
    fn test_cancel_outside_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let transport = scripted(vec![token("t1", 2_000)]);
        let manager = runtime.block_on(acquire(transport));

        // Plain synchronous call, no runtime context entered
        manager.cancel();
        assert!(manager.is_cancelled());
        drop(manager);
    }

    #[tokio::test]
    async fn test_failed_authentication_starts_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            Method::Post,
            format!("{AUTH}/token/authenticate"),
            vec![Reply::json(401, json!({"status": "FAILURE_BAD_CREDENTIAL", "statusMessage": "nope"}))],
        );
        let method = AuthMethod::Basic {
            username: "u".into(),
            password: "p".into(),
        };
        let result = AuthorizationManager::acquire(
            AuthService::new(transport, AUTH),
            &AuthConfig::default(),
            &method,
        )
        .await;
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    }
}
