use crate::api::routes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Serve the health endpoint on `bind_addr`, failing requests that take longer than
/// `request_timeout`.
pub fn new(
    bind_addr: SocketAddr,
    request_timeout: Duration,
) -> impl Future<Output = hyper::Result<()>> {
    axum::Server::bind(&bind_addr).serve(routes::new(request_timeout).into_make_service())
}
