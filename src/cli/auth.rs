use std::{sync::Arc, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

use crate::{
    api::CallbackState,
    app::App,
    error, info,
    server::start_api_server,
    spotify::AuthState,
    success, warning,
};

const LOGIN_WAIT: Duration = Duration::from_secs(120);

pub async fn auth(app: &App) {
    if app.session.state() == AuthState::LoggedIn {
        success!("Already logged in. Run tunelog logout first to switch accounts.");
        return;
    }

    let request = match app.session.begin_login() {
        Ok(r) => r,
        Err(e) => error!("Cannot build the authorization request. Err: {}", e),
    };

    let (state, outcome) = CallbackState::new(Arc::clone(&app.session));
    let shutdown = CancellationToken::new();
    let bound = match start_api_server(&app.config.server_address, state, shutdown.clone()).await {
        Ok(addr) => addr,
        Err(e) => {
            app.session.cancel_login();
            error!("Cannot start the callback server. Err: {}", e);
        }
    };
    info!("Waiting for the authorization redirect on http://{}", bound);

    if webbrowser::open(&request.url).is_err() {
        warning!("Could not open a browser. Open this URL to log in:\n{}", request.url);
    }

    let result = timeout(LOGIN_WAIT, outcome).await;
    shutdown.cancel();

    match result {
        Ok(Ok(Ok(_))) => {}
        Ok(Ok(Err(message))) => error!("Login failed: {}", message),
        Ok(Err(_)) => {
            app.session.cancel_login();
            error!("Callback server stopped before the login finished.");
        }
        Err(_) => {
            app.session.cancel_login();
            error!(
                "No authorization redirect within {} seconds.",
                LOGIN_WAIT.as_secs()
            );
        }
    }

    onboarding(app).await;
}

async fn onboarding(app: &App) {
    if app.session.snapshot_failed() {
        warning!("Logged in, but your listening history could not be loaded.");
    } else if let Some(history) = app.session.snapshot() {
        info!("Found {} recently played tracks.", history.len());
        for entry in history.iter().take(5) {
            info!("  {} - {}", entry.track.artist_names(), entry.track.name);
        }
    }

    println!("Start journaling with this account? [Y/n]");
    let mut line = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    if let Err(e) = stdin.read_line(&mut line).await {
        warning!("Cannot read the answer. Err: {}", e);
    }

    if line.trim().eq_ignore_ascii_case("n") {
        app.session.logout().await;
        warning!("Login discarded.");
        return;
    }

    app.session.finish_onboarding();
    success!("Logged in.");
}

pub async fn logout(app: &App) {
    app.session.logout().await;
    success!("Logged out. Stored tokens were removed.");
}

pub async fn status(app: &App) {
    let state = app.session.state();
    match state {
        AuthState::LoggedIn => success!("Session: {}", state),
        _ => warning!("Session: {}", state),
    }
    info!(
        "Refresh token stored: {}",
        if app.session.has_refresh_token() { "yes" } else { "no" }
    );
    if let Some(message) = app.session.last_error() {
        warning!("Last error: {}", message);
    }
}
