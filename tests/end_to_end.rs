//! Engine-over-HTTP tests against a real `curate_server` listener.

use curate::{
    serve_router, AppState, ChangeKind, Collection, Config, EntryPayload, HttpItemService,
    ItemKey, LoadStatus, ParentId, RemoteItemService, SequenceError, SyncState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), std::io::Error>>,
}

impl RunningServer {
    async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("listener addr");
        let config = Config {
            port: addr.port(),
            ..Config::default()
        };
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_router(listener, AppState::new(config), false, async move {
            let _ = rx.await;
        }));
        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    fn remote(&self) -> Arc<dyn RemoteItemService<EntryPayload>> {
        Arc::new(
            HttpItemService::new(&format!("http://{}", self.addr), Duration::from_secs(5))
                .expect("client"),
        )
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("join").expect("serve");
    }
}

async fn open(
    remote: Arc<dyn RemoteItemService<EntryPayload>>,
    parent: &str,
) -> Collection<EntryPayload> {
    let (collection, status) = Collection::load(remote, ParentId::new(parent)).await;
    assert_eq!(status, LoadStatus::Loaded);
    collection
}

fn titles(collection: &Collection<EntryPayload>) -> Vec<String> {
    collection
        .snapshot()
        .expect("snapshot")
        .into_iter()
        .map(|item| item.payload.title)
        .collect()
}

#[tokio::test]
async fn reorder_survives_a_reload() {
    let server = RunningServer::start().await;
    let collection = open(server.remote(), "module-1").await;
    for title in ["A", "B", "C"] {
        collection
            .add_item(EntryPayload::titled(title))
            .await
            .expect("add");
    }

    collection.move_item(0, 2).expect("move");
    let result = collection.save_order().await;
    assert!(result.is_success(), "{:?}", result);
    assert_eq!(result.len(), 3);

    let reloaded = open(server.remote(), "module-1").await;
    assert_eq!(titles(&reloaded), ["B", "C", "A"]);
    assert!(reloaded.pending_items().expect("pending").is_empty());
    server.stop().await;
}

#[tokio::test]
async fn insert_and_delete_are_persisted_by_save() {
    let server = RunningServer::start().await;
    let collection = open(server.remote(), "court-9").await;
    for title in ["Opening", "Evidence", "Closing"] {
        collection
            .add_item(EntryPayload::titled(title))
            .await
            .expect("add");
    }

    let evidence = collection.snapshot().expect("snapshot")[1].key.clone();
    collection.delete(&evidence).expect("delete");
    collection
        .insert(EntryPayload::titled("Witness").with_summary("called by the defence"), Some(1))
        .expect("insert");
    let result = collection.save_order().await;
    assert!(result.is_success(), "{:?}", result);
    assert!(result.outcomes().iter().any(|o| o.kind == ChangeKind::Create));
    assert!(result.outcomes().iter().any(|o| o.kind == ChangeKind::Delete));

    let reloaded = open(server.remote(), "court-9").await;
    assert_eq!(titles(&reloaded), ["Opening", "Witness", "Closing"]);
    let witness = &reloaded.snapshot().expect("snapshot")[1];
    assert_eq!(
        witness.payload.summary.as_deref(),
        Some("called by the defence")
    );
    server.stop().await;
}

#[tokio::test]
async fn remove_item_tolerates_items_already_gone() {
    let server = RunningServer::start().await;
    let first = open(server.remote(), "m").await;
    let a = first.add_item(EntryPayload::titled("A")).await.expect("add");
    first.add_item(EntryPayload::titled("B")).await.expect("add");

    let second = open(server.remote(), "m").await;
    let id = a.remote_id().expect("server id").clone();
    second.remove_item(&id).await.expect("remove");
    first.remove_item(&id).await.expect("remove again");
    assert_eq!(titles(&first), ["B"]);
    server.stop().await;
}

#[tokio::test]
async fn stopped_server_degrades_load_and_flags_save() {
    let server = RunningServer::start().await;
    let remote = server.remote();
    let collection = open(remote.clone(), "m").await;
    collection.add_item(EntryPayload::titled("A")).await.expect("add");
    collection.add_item(EntryPayload::titled("B")).await.expect("add");
    server.stop().await;

    collection.move_item(0, 1).expect("move");
    let result = collection.save_order().await;
    assert!(matches!(
        result.batch_error(),
        Some(SequenceError::RemoteUnavailable(_))
    ));
    for item in collection.snapshot().expect("snapshot") {
        assert_eq!(
            collection.state_of(&item.key).expect("state"),
            SyncState::Dirty
        );
    }

    let (empty, status) = Collection::load(remote, ParentId::new("m")).await;
    assert!(matches!(status, LoadStatus::Failed(SequenceError::LoadError(_))));
    assert!(empty.snapshot().expect("snapshot").is_empty());
}

#[tokio::test]
async fn placeholders_never_reach_the_server_as_ids() {
    let server = RunningServer::start().await;
    let collection = open(server.remote(), "m").await;
    let applied = collection
        .insert(EntryPayload::titled("draft"), None)
        .expect("insert");
    let placeholder = applied.inserted.expect("placeholder key");
    assert!(matches!(placeholder, ItemKey::Pending(_)));

    let result = collection.save_order().await;
    let outcome = &result.outcomes()[0];
    assert_eq!(outcome.key, placeholder);
    assert!(matches!(outcome.result, Ok(ItemKey::Remote(_))));
    server.stop().await;
}
