use super::*;
use serde_json::json;

#[test]
fn remote_item_uses_camel_case_wire_names() {
    let item = RemoteItem {
        id: ItemId::new("42"),
        parent_id: ParentId::new("module-7"),
        position: 3,
        payload: EntryPayload::titled("Intro").with_url("https://example.com/intro"),
    };
    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(
        value,
        json!({
            "id": "42",
            "parentId": "module-7",
            "position": 3,
            "payload": { "title": "Intro", "url": "https://example.com/intro", "completed": false }
        })
    );
}

#[test]
fn entry_payload_tolerates_missing_optional_fields() {
    let payload: EntryPayload = serde_json::from_value(json!({ "title": "Only a title" })).unwrap();
    assert_eq!(payload, EntryPayload::titled("Only a title"));
}

#[test]
fn update_request_fields_are_optional() {
    let req: UpdateItemRequest<EntryPayload> =
        serde_json::from_value(json!({ "position": 2 })).unwrap();
    assert_eq!(req.position, Some(2));
    assert!(req.payload.is_none());
}

#[test]
fn placeholder_keys_never_equal_remote_keys() {
    let placeholder = PlaceholderId::new();
    let pending = ItemKey::from(placeholder);
    let remote = ItemKey::from(ItemId::new(placeholder.to_string()));
    assert_ne!(pending, remote);
    assert!(pending.is_pending());
    assert_eq!(remote.remote_id().map(ItemId::as_str), Some(placeholder.to_string().as_str()));
}

#[test]
fn remote_item_converts_into_remote_keyed_sequence_item() {
    let item: SequenceItem<EntryPayload> = RemoteItem {
        id: ItemId::new("a"),
        parent_id: ParentId::new("p"),
        position: 0,
        payload: EntryPayload::titled("A"),
    }
    .into();
    assert_eq!(item.key, ItemKey::Remote(ItemId::new("a")));
    assert_eq!(item.remote_id(), Some(&ItemId::new("a")));
}
