//! HTTP command server.
//!
//! `GET /health` answers liveness; `POST /command` takes one JSON
//! [`GuideCommand`] and answers with its [`GuideReply`].
//!
//! [`GuideReply`]: crate::controller::GuideReply

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use warp::Filter;

use crate::controller::{GuideCommand, GuideController};

pub fn routes(
    controller: Arc<GuideController>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let state_filter = warp::any().map(move || controller.clone());

    let command = warp::path("command")
        .and(warp::post())
        .and(warp::body::json())
        .and(state_filter)
        .and_then(handle_command);

    health.or(command)
}

async fn handle_command(
    command: GuideCommand,
    controller: Arc<GuideController>,
) -> Result<impl warp::Reply, warp::Rejection> {
    log::info!("received {}", command.name());
    let reply = controller.dispatch(command).await;
    Ok(warp::reply::json(&reply))
}

/// Bind `addr` and return the bound address with the server future.
/// Binding separately lets callers report a busy port before serving.
pub async fn bind(
    controller: Arc<GuideController>,
    addr: SocketAddr,
) -> std::io::Result<(SocketAddr, impl Future<Output = ()>)> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    let server = warp::serve(routes(controller))
        .run_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener));
    Ok((local, server))
}
