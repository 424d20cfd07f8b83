//! Skip guard for tests that need a localhost socket.
//!
//! Sandboxed CI runners sometimes forbid binding. Such tests skip with a
//! note on stderr unless `UPSTREAM_REQUIRE_SOCKET_TESTS` is truthy, in which
//! case they fail loudly.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "UPSTREAM_REQUIRE_SOCKET_TESTS";

fn sockets_required() -> bool {
    std::env::var(REQUIRE_ENV).is_ok_and(|value| {
        matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
    })
}

/// Returns true when the calling test should return early.
#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let caller = Location::caller();
    if sockets_required() {
        panic!(
            "localhost bind failed for {}:{} and {REQUIRE_ENV} is set",
            caller.file(),
            caller.line()
        );
    }
    eprintln!(
        "skipping {}:{}: localhost bind failed (set {REQUIRE_ENV}=1 to fail instead)",
        caller.file(),
        caller.line()
    );
    true
}

/// Starts a wiremock server, or `None` when sockets are unavailable.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        return None;
    }
    Some(MockServer::start().await)
}
