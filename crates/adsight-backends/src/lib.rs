//! HTTP clients for the remote services a chat turn depends on: the
//! Messages-API text generation endpoint and the warehouse query gateway.

pub mod error;
pub mod inference;
pub mod warehouse;

pub use error::BackendError;
pub use inference::MessagesClient;
pub use warehouse::WarehouseClient;

#[cfg(test)]
pub(crate) mod test_server {
    use std::net::SocketAddr;

    use axum::Router;

    /// Serve `router` on an ephemeral local port and return its base URL.
    pub async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }
}
