use std::sync::Once;

use folio_extensions::http::{HttpRemote, HttpRemoteConfig};
use wiremock::MockServer;

static TRACING: Once = Once::new();

/// Installs a test subscriber once per test binary. Output is shown with `--nocapture`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Remote pointed at `server`.
pub fn remote_for(server: &MockServer) -> HttpRemote {
    init_tracing();
    let config = HttpRemoteConfig::new(&server.uri()).expect("Mock server URI should parse");
    HttpRemote::new(config).expect("Failed to build remote")
}
