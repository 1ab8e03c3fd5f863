use std::{
    fmt,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::{Mutex, RwLock};
use reqwest::{Client, StatusCode};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::OAuthConfig,
    error::{Error, Result},
    management::{TokenKind, TokenStore},
    spotify::oauth,
    types::{AuthCallback, Credential, PlayHistory, RecentlyPlayedResponse},
    utils,
};

const SNAPSHOT_LIMIT: u32 = 50;

/// Where the session stands. Only [`AuthSession`] moves between these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// Restoring persisted credentials.
    Checking,
    LoggedOut,
    /// Waiting for the authorization redirect.
    LoggingIn,
    /// Login succeeded; waiting for the user to confirm.
    Onboarding,
    LoggedIn,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthState::Checking => "checking",
            AuthState::LoggedOut => "logged out",
            AuthState::LoggingIn => "logging in",
            AuthState::Onboarding => "onboarding",
            AuthState::LoggedIn => "logged in",
        };
        f.write_str(s)
    }
}

/// What the caller needs to send the user agent off to authorize.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

struct PendingLogin {
    state: String,
    code_verifier: String,
}

/// Generation counter plus the result of the last completed refresh.
#[derive(Clone, Copy, Default)]
struct RefreshOutcome {
    generation: u64,
    succeeded: bool,
}

/// OAuth 2.0 PKCE session: owns the credential pair, drives the
/// authentication state machine and serializes token refreshes.
pub struct AuthSession {
    config: OAuthConfig,
    client: Client,
    store: TokenStore,
    credential: RwLock<Credential>,
    state_tx: watch::Sender<AuthState>,
    pending: Mutex<Option<PendingLogin>>,
    last_error: Mutex<Option<String>>,
    snapshot: Mutex<Option<Vec<PlayHistory>>>,
    snapshot_failed: AtomicBool,
    refresh_gate: tokio::sync::Mutex<()>,
    refresh_outcome: Mutex<RefreshOutcome>,
    refresh_wait: Duration,
    /// Bumped by every logout; a refresh started in an older epoch is discarded.
    logout_epoch: AtomicU64,
    /// Held by logout and while a refresh result is persisted.
    reset_lock: tokio::sync::Mutex<()>,
}

impl AuthSession {
    /// Creates a session in [`AuthState::Checking`]. Call [`restore`](Self::restore)
    /// to settle it.
    pub fn new(config: OAuthConfig, client: Client, store: TokenStore, refresh_wait: Duration) -> Self {
        let (state_tx, _) = watch::channel(AuthState::Checking);
        Self {
            config,
            client,
            store,
            credential: RwLock::new(Credential::default()),
            state_tx,
            pending: Mutex::new(None),
            last_error: Mutex::new(None),
            snapshot: Mutex::new(None),
            snapshot_failed: AtomicBool::new(false),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_outcome: Mutex::new(RefreshOutcome::default()),
            refresh_wait,
            logout_epoch: AtomicU64::new(0),
            reset_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), AuthState::LoggedIn | AuthState::Onboarding)
    }

    pub fn access_token(&self) -> Option<String> {
        self.credential.read().access_token.clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        self.credential.read().refresh_token.is_some()
    }

    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    /// User-visible message from the last failed login, if not dismissed.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn dismiss_error(&self) {
        self.last_error.lock().take();
    }

    /// Recently played tracks fetched right after login.
    pub fn snapshot(&self) -> Option<Vec<PlayHistory>> {
        self.snapshot.lock().clone()
    }

    pub fn snapshot_failed(&self) -> bool {
        self.snapshot_failed.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: AuthState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "auth state changed");
        }
    }

    /// Silent restore from the token store.
    ///
    /// An access token is validated against a protected resource; if that
    /// fails, or only a refresh token exists, a refresh is attempted. With
    /// neither token present no network call is made.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> AuthState {
        self.set_state(AuthState::Checking);

        let access = self.store.load(TokenKind::Access).await;
        let refresh = self.store.load(TokenKind::Refresh).await;
        *self.credential.write() = Credential {
            access_token: access.clone(),
            refresh_token: refresh.clone(),
        };

        let next = match (access, refresh) {
            (Some(token), _) => {
                if self.validate(&token).await {
                    AuthState::LoggedIn
                } else if self.refresh_after_rejection(&token).await {
                    AuthState::LoggedIn
                } else {
                    AuthState::LoggedOut
                }
            }
            (None, Some(_)) => {
                if self.refresh_token().await {
                    AuthState::LoggedIn
                } else {
                    AuthState::LoggedOut
                }
            }
            (None, None) => AuthState::LoggedOut,
        };

        info!(state = %next, "session restored");
        self.set_state(next);
        next
    }

    async fn validate(&self, token: &str) -> bool {
        let url = format!("{}/me", self.config.api_url);
        match self.client.get(&url).bearer_auth(token).send().await {
            Ok(res) if res.status() == StatusCode::OK => true,
            Ok(res) => {
                debug!(status = %res.status(), "stored access token rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, "could not validate stored access token");
                false
            }
        }
    }

    /// Starts an interactive login and returns the authorization URL.
    ///
    /// A fresh `state` nonce and code verifier are generated for every call;
    /// a previous unfinished attempt is discarded.
    pub fn begin_login(&self) -> Result<AuthorizationRequest> {
        let state = utils::generate_state();
        let code_verifier = utils::generate_code_verifier();
        let challenge = utils::generate_code_challenge(&code_verifier);
        let url = oauth::authorization_url(&self.config, &challenge, &state)?;

        *self.pending.lock() = Some(PendingLogin {
            state: state.clone(),
            code_verifier,
        });
        self.dismiss_error();
        self.set_state(AuthState::LoggingIn);

        Ok(AuthorizationRequest { url, state })
    }

    /// Abandons a login in progress.
    pub fn cancel_login(&self) {
        if self.pending.lock().take().is_some() {
            self.set_state(AuthState::LoggedOut);
        }
    }

    /// Handles the authorization redirect.
    ///
    /// The `state` parameter must match the nonce from [`begin_login`](Self::begin_login).
    /// On success both tokens are persisted, the recently played snapshot is
    /// fetched, and the session moves to [`AuthState::Onboarding`] even if the
    /// snapshot could not be loaded.
    #[instrument(skip(self, callback))]
    pub async fn complete_login(&self, callback: AuthCallback) -> Result<AuthState> {
        let pending = self.pending.lock().take();
        let Some(pending) = pending else {
            // A stray or repeated redirect must not disturb the current state.
            warn!("authorization redirect without a pending login");
            return Err(Error::NoPendingLogin);
        };

        if let Some(reason) = callback.error {
            return Err(self.fail_login(Error::AuthExchange(reason)));
        }
        if callback.state.as_deref() != Some(pending.state.as_str()) {
            return Err(self.fail_login(Error::StateMismatch));
        }
        let Some(code) = callback.code.filter(|c| !c.is_empty()) else {
            return Err(self.fail_login(Error::AuthExchange(
                "authorization code missing from redirect".to_string(),
            )));
        };

        let token = match oauth::exchange_code_pkce(
            &self.client,
            &self.config,
            &code,
            &pending.code_verifier,
        )
        .await
        {
            Ok(token) => token,
            Err(e) => return Err(self.fail_login(e)),
        };

        self.store.save(TokenKind::Access, &token.access_token).await;
        if let Some(refresh) = token.refresh_token.as_deref().filter(|r| !r.is_empty()) {
            self.store.save(TokenKind::Refresh, refresh).await;
        }
        *self.credential.write() = Credential {
            access_token: Some(token.access_token.clone()),
            refresh_token: token.refresh_token.clone().filter(|r| !r.is_empty()),
        };

        match self.fetch_snapshot(&token.access_token).await {
            Ok(history) => {
                *self.snapshot.lock() = Some(history);
                self.snapshot_failed.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(error = %e, "initial snapshot failed, continuing to onboarding");
                self.snapshot_failed.store(true, Ordering::SeqCst);
            }
        }

        info!("login completed");
        self.set_state(AuthState::Onboarding);
        Ok(AuthState::Onboarding)
    }

    fn fail_login(&self, err: Error) -> Error {
        warn!(error = %err, "login failed");
        *self.last_error.lock() = Some(err.to_string());
        self.set_state(AuthState::LoggedOut);
        err
    }

    async fn fetch_snapshot(&self, token: &str) -> Result<Vec<PlayHistory>> {
        let url = format!(
            "{}/me/player/recently-played?limit={}",
            self.config.api_url, SNAPSHOT_LIMIT
        );
        let body = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let res: RecentlyPlayedResponse = serde_json::from_str(&body)?;
        Ok(res.items)
    }

    /// Leaves onboarding. Returns `false` if the session was not onboarding.
    pub fn finish_onboarding(&self) -> bool {
        let moved = self.state_tx.send_if_modified(|state| {
            if *state == AuthState::Onboarding {
                *state = AuthState::LoggedIn;
                true
            } else {
                false
            }
        });
        if moved {
            debug!("onboarding confirmed");
        }
        moved
    }

    /// Drops every credential and cached authenticated datum. Safe to call
    /// from any state, any number of times.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        let _reset = self.reset_lock.lock().await;
        self.logout_epoch.fetch_add(1, Ordering::SeqCst);
        self.store.clear(TokenKind::Access).await;
        self.store.clear(TokenKind::Refresh).await;
        *self.credential.write() = Credential::default();
        self.snapshot.lock().take();
        self.snapshot_failed.store(false, Ordering::SeqCst);
        self.pending.lock().take();
        self.set_state(AuthState::LoggedOut);
        info!("logged out");
    }

    /// Obtains a new access token with the refresh token.
    ///
    /// Single-flight: callers arriving while a refresh is running wait (up to
    /// the configured bound) and receive that refresh's result instead of
    /// starting another exchange. A missing refresh token or a failed exchange
    /// logs the session out.
    pub async fn refresh_token(&self) -> bool {
        self.refresh_single_flight(None).await
    }

    /// Like [`refresh_token`](Self::refresh_token), but skips the exchange if
    /// the current access token already differs from `rejected`.
    pub async fn refresh_after_rejection(&self, rejected: &str) -> bool {
        self.refresh_single_flight(Some(rejected)).await
    }

    #[instrument(skip(self, rejected))]
    async fn refresh_single_flight(&self, rejected: Option<&str>) -> bool {
        let seen = self.refresh_outcome.lock().generation;

        let _gate = match tokio::time::timeout(self.refresh_wait, self.refresh_gate.lock()).await {
            Ok(gate) => gate,
            Err(_) => {
                warn!("timed out waiting for an in-flight token refresh");
                return false;
            }
        };

        let outcome = *self.refresh_outcome.lock();
        if outcome.generation != seen {
            debug!(succeeded = outcome.succeeded, "joined concurrent refresh");
            return outcome.succeeded;
        }

        if let Some(rejected) = rejected {
            let current = self.access_token();
            if current.as_deref().is_some_and(|t| t != rejected) {
                debug!("access token already replaced");
                return true;
            }
        }

        let succeeded = self.perform_refresh().await;
        let mut outcome = self.refresh_outcome.lock();
        outcome.generation += 1;
        outcome.succeeded = succeeded;
        succeeded
    }

    async fn perform_refresh(&self) -> bool {
        let epoch = self.logout_epoch.load(Ordering::SeqCst);
        let current_refresh = self.credential.read().refresh_token.clone();
        let Some(current_refresh) = current_refresh else {
            info!("no refresh token available, logging out");
            self.logout().await;
            return false;
        };

        let token = match oauth::refresh_token(&self.client, &self.config, &current_refresh).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "token refresh failed, logging out");
                self.logout().await;
                return false;
            }
        };

        // A logout that ran during the exchange wins over its result.
        let _reset = self.reset_lock.lock().await;
        let unchanged = self.credential.read().refresh_token.as_deref() == Some(current_refresh.as_str());
        if self.logout_epoch.load(Ordering::SeqCst) != epoch || !unchanged {
            debug!("session reset during refresh, discarding grant");
            return false;
        }

        self.store.save(TokenKind::Access, &token.access_token).await;
        let rotated = token
            .refresh_token
            .filter(|r| !r.is_empty() && *r != current_refresh);
        if let Some(rotated) = rotated.as_deref() {
            self.store.save(TokenKind::Refresh, rotated).await;
        }

        let mut credential = self.credential.write();
        credential.access_token = Some(token.access_token);
        if let Some(rotated) = rotated {
            credential.refresh_token = Some(rotated);
        }
        debug!("access token refreshed");
        true
    }
}
