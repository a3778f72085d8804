//! Guards network-backed tests against sandboxes that forbid sockets.

use wiremock::MockServer;

/// Starts a wiremock server, or returns `None` (skipping the test) when the
/// environment cannot bind loopback sockets.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if std::net::TcpListener::bind("127.0.0.1:0").is_err() {
        eprintln!("skipping: cannot bind loopback sockets in this environment");
        return None;
    }
    Some(MockServer::start().await)
}
