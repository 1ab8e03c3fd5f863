use std::sync::Arc;

use axum::{Extension, extract::Query, response::Html};
use tokio::sync::{Mutex, oneshot};

use crate::{
    error::Error,
    spotify::{AuthSession, AuthState},
    types::AuthCallback,
    warning,
};

/// Outcome handed to whoever is waiting on the login.
pub type LoginOutcome = Result<AuthState, String>;

/// Shared with the callback route: the session to complete and a one-shot
/// channel back to the waiting login command.
#[derive(Clone)]
pub struct CallbackState {
    pub session: Arc<AuthSession>,
    pub done: Arc<Mutex<Option<oneshot::Sender<LoginOutcome>>>>,
}

impl CallbackState {
    pub fn new(session: Arc<AuthSession>) -> (Self, oneshot::Receiver<LoginOutcome>) {
        let (tx, rx) = oneshot::channel();
        let state = Self {
            session,
            done: Arc::new(Mutex::new(Some(tx))),
        };
        (state, rx)
    }
}

pub async fn callback(
    Query(params): Query<AuthCallback>,
    Extension(state): Extension<CallbackState>,
) -> Html<&'static str> {
    let result = state.session.complete_login(params).await;

    let page = match &result {
        Ok(_) => "<h2>Authentication successful.</h2><p>Close this browser window.</p>",
        Err(Error::NoPendingLogin) => "<h4>No login is in progress.</h4>",
        Err(Error::StateMismatch) => "<h4>Login rejected: state mismatch.</h4>",
        Err(e) => {
            warning!("Token exchange failed: {}", e);
            "<h4>Login failed.</h4>"
        }
    };

    // Stray redirects after the first one have nobody to notify.
    if !matches!(result, Err(Error::NoPendingLogin)) {
        if let Some(tx) = state.done.lock().await.take() {
            let _ = tx.send(result.map_err(|e| e.to_string()));
        }
    }

    Html(page)
}
