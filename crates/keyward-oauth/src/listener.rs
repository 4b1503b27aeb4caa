//! One-shot loopback server for the authorization redirect.
//!
//! Binds to the host and port of the registered redirect URI, hands the first
//! request on its path to the caller as [`CallbackParams`], then shuts down.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{RawQuery, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

use crate::callback::CallbackParams;
use crate::error::{OAuthError, Result};

const SUCCESS_PAGE: &str = "<!doctype html><title>Keyward</title>\
<p>Authorization received. You can close this window and return to the terminal.</p>";

const DENIED_PAGE: &str = "<!doctype html><title>Keyward</title>\
<p>Authorization was not granted. You can close this window.</p>";

type CallbackSender = Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>;

/// Listener for a single authorization callback.
#[derive(Debug, Clone)]
pub struct CallbackListener {
    bind_addr: SocketAddr,
    path: String,
}

impl CallbackListener {
    /// Listen where `redirect_uri` points. Only loopback hosts are accepted.
    pub fn from_redirect_uri(redirect_uri: &Url) -> Result<Self> {
        if redirect_uri.scheme() != "http" {
            return Err(OAuthError::Callback(format!(
                "redirect URI must use http to be received locally: {}",
                redirect_uri
            )));
        }

        let ip = match redirect_uri.host_str() {
            Some("localhost") => IpAddr::V4(Ipv4Addr::LOCALHOST),
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse::<IpAddr>()
                .map_err(|_| OAuthError::Callback(format!("unsupported redirect host {}", host)))?,
            None => {
                return Err(OAuthError::Callback(
                    "redirect URI has no host".to_string(),
                ));
            }
        };
        if !ip.is_loopback() {
            return Err(OAuthError::Callback(format!(
                "redirect host {} is not a loopback address",
                ip
            )));
        }

        let port = redirect_uri.port_or_known_default().unwrap_or(80);
        Ok(Self {
            bind_addr: SocketAddr::new(ip, port),
            path: redirect_uri.path().to_string(),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Build the router that forwards the first callback to `sender`.
    pub fn router(&self, sender: oneshot::Sender<CallbackParams>) -> Router {
        let sender: CallbackSender = Arc::new(Mutex::new(Some(sender)));
        Router::new()
            .route(&self.path, get(handle_callback))
            .with_state(sender)
    }

    /// Bind and start serving. The returned handle yields the callback.
    pub async fn start(self) -> Result<PendingCallback> {
        let listener = TcpListener::bind(self.bind_addr).await.map_err(|e| {
            OAuthError::Callback(format!("failed to bind {}: {}", self.bind_addr, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| OAuthError::Callback(e.to_string()))?;

        let (callback_tx, callback_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let router = self.router(callback_tx);

        tracing::info!(addr = %local_addr, path = %self.path, "Waiting for authorization callback");
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        Ok(PendingCallback {
            local_addr,
            callback_rx,
            shutdown_tx,
        })
    }
}

/// A running listener that has not received its callback yet.
#[derive(Debug)]
pub struct PendingCallback {
    local_addr: SocketAddr,
    callback_rx: oneshot::Receiver<CallbackParams>,
    shutdown_tx: oneshot::Sender<()>,
}

impl PendingCallback {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait up to `timeout` for the callback, then stop the server.
    pub async fn wait(self, timeout: Duration) -> Result<CallbackParams> {
        let outcome = tokio::time::timeout(timeout, self.callback_rx).await;
        self.shutdown_tx.send(()).ok();

        match outcome {
            Ok(Ok(params)) => Ok(params),
            Ok(Err(_)) => Err(OAuthError::Callback(
                "listener stopped before a callback arrived".to_string(),
            )),
            Err(_) => Err(OAuthError::Callback(format!(
                "no callback received within {}s",
                timeout.as_secs()
            ))),
        }
    }
}

async fn handle_callback(
    State(sender): State<CallbackSender>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let params = CallbackParams::from_query(query.as_deref().unwrap_or_default());
    let denied = params.error.is_some();

    let Some(sender) = sender.lock().take() else {
        return (StatusCode::GONE, Html(DENIED_PAGE));
    };
    sender.send(params).ok();

    if denied {
        (StatusCode::OK, Html(DENIED_PAGE))
    } else {
        (StatusCode::OK, Html(SUCCESS_PAGE))
    }
}
