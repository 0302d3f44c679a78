//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use curate_server::{create_app, AppState, Config, ItemStore};
use std::sync::Arc;

pub(crate) fn test_config() -> Config {
    Config {
        port: 0,
        max_body_size: 64 * 1024,
        ..Config::default()
    }
}

pub(crate) fn test_server_for_config(config: Config) -> (TestServer, Arc<ItemStore>) {
    let items = Arc::new(ItemStore::new());
    let state = AppState::with_items(config, items.clone());
    let app = create_app(state, false);
    let server = TestServer::new(app).expect("server");
    (server, items)
}

pub(crate) fn setup_test_server() -> (TestServer, Arc<ItemStore>) {
    test_server_for_config(test_config())
}
