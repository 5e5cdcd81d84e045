use std::net::SocketAddr;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::trace::Tracer;

/// Handle to a service started with [`spawn_service`].
pub struct ServiceHandle {
    pub addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Signals graceful shutdown without waiting for it.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(());
    }

    /// Signals graceful shutdown and waits for in-flight requests to drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            error!(?err, "service task ended abnormally");
        }
    }
}

/// Binds `bind_address` (port `0` picks a free port) and serves `router`
/// in the background.
pub async fn spawn_service(
    name: &'static str,
    bind_address: &str,
    router: Router,
) -> anyhow::Result<ServiceHandle> {
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {name} listener on {bind_address}"))?;
    serve_listener(name, listener, router)
}

/// Serves `router` on an already bound listener.
pub fn serve_listener(
    name: &'static str,
    listener: TcpListener,
    router: Router,
) -> anyhow::Result<ServiceHandle> {
    let addr = listener
        .local_addr()
        .context("failed to read socket address")?;
    info!(service = name, %addr, "starting service");

    let (tx, rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await
        {
            error!(service = name, ?err, "server terminated with error");
        }
    });

    Ok(ServiceHandle {
        addr,
        shutdown: tx,
        task,
    })
}

/// Serves `router` on `bind_address` until Ctrl-C or SIGTERM, then drains
/// in-flight requests and flushes `tracer`.
pub async fn run_until_shutdown(
    name: &'static str,
    bind_address: &str,
    router: Router,
    tracer: &Tracer,
) -> anyhow::Result<()> {
    let handle = spawn_service(name, bind_address, router).await?;
    info!(service = name, addr = %handle.addr, "service ready");

    shutdown_signal().await;
    info!(service = name, "shutdown signal received; draining requests");
    handle.stop().await;
    tracer.flush();
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
