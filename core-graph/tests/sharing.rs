//! Sharing and permission flows

mod common;

use bridge_traits::http::HttpMethod;
use common::*;
use core_graph::{
    DriveOperations, DriveResource, GraphError, InviteRequest, LinkScope, LinkType, UnshareTarget,
};
use std::sync::Arc;

const PERMISSIONS: &str = r#"{
    "value": [
        { "id": "owner", "roles": ["owner"], "grantedTo": { "user": { "displayName": "Owner" } } },
        { "id": "link-1", "roles": ["read"], "link": { "type": "view", "scope": "anonymous" } },
        { "id": "invite-1", "roles": ["read"], "invitation": { "email": "a@b.com" } },
        { "id": "invite-2", "roles": ["read"], "invitation": { "email": "c@d.com" } }
    ]
}"#;

fn operations(http: Arc<ScriptedHttpClient>, sink: Arc<RecordingSink>) -> DriveOperations {
    DriveOperations::new(Arc::new(api_with(http, sink)), DriveResource::me())
}

#[tokio::test]
async fn test_unshare_by_email_deletes_only_the_matching_entry() {
    let http = ScriptedHttpClient::new();
    http.push(200, PERMISSIONS);
    http.push(204, "");

    let drive = operations(http.clone(), Arc::new(RecordingSink::default()));
    drive
        .unshare_from("item1", &UnshareTarget::Email("a@b.com".to_string()))
        .await
        .unwrap();

    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert!(requests[0].url.ends_with("/me/drive/items/item1/permissions"));
    assert_eq!(requests[1].method, HttpMethod::Delete);
    assert!(requests[1].url.ends_with("/me/drive/items/item1/permissions/invite-1"));
}

#[tokio::test]
async fn test_unshare_anonymous_link() {
    let http = ScriptedHttpClient::new();
    http.push(200, PERMISSIONS);
    http.push(204, "");

    let drive = operations(http.clone(), Arc::new(RecordingSink::default()));
    drive
        .unshare_from("item1", &UnshareTarget::AnonymousLink)
        .await
        .unwrap();

    assert!(http.requests()[1].url.ends_with("/permissions/link-1"));
}

#[tokio::test]
async fn test_unshare_without_match_is_permission_not_found() {
    let http = ScriptedHttpClient::new();
    http.push(200, PERMISSIONS);
    let sink = Arc::new(RecordingSink::default());

    let drive = operations(http.clone(), sink.clone());
    let result = drive
        .unshare_from("item1", &UnshareTarget::Email("nobody@example.com".to_string()))
        .await;

    match result {
        Err(GraphError::PermissionNotFound { item_id, target }) => {
            assert_eq!(item_id, "item1");
            assert!(!target.contains("example.com"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(http.request_count(), 1);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field("item_id"), Some("item1"));
}

#[tokio::test]
async fn test_unshare_unknown_non_ascii_email_is_permission_not_found() {
    let http = ScriptedHttpClient::new();
    http.push(200, PERMISSIONS);
    let sink = Arc::new(RecordingSink::default());

    let drive = operations(http.clone(), sink.clone());
    let result = drive
        .unshare_from("item1", &UnshareTarget::Email("élodie@example.com".to_string()))
        .await;

    match result {
        Err(GraphError::PermissionNotFound { target, .. }) => {
            assert!(target.starts_with('é'));
            assert!(!target.contains("example.com"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(sink.entries().len(), 1);
}

#[tokio::test]
async fn test_share_for_email_sends_invitation() {
    let http = ScriptedHttpClient::new();
    http.push(
        200,
        r#"{"value":[{"id":"invite-9","roles":["read"],"invitation":{"email":"a@b.com"}}]}"#,
    );

    let drive = operations(http.clone(), Arc::new(RecordingSink::default()));
    let granted = drive
        .share_for_email("item1", &InviteRequest::new("a@b.com"))
        .await
        .unwrap();

    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].invitee_email(), Some("a@b.com"));

    let request = &http.requests()[0];
    assert!(request.url.ends_with("/me/drive/items/item1/invite"));
    let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
    assert_eq!(body["requireSignIn"], serde_json::json!(true));
    assert_eq!(body["sendInvitation"], serde_json::json!(false));
    assert_eq!(body["recipients"][0]["email"], serde_json::json!("a@b.com"));
}

#[tokio::test]
async fn test_create_share_link() {
    let http = ScriptedHttpClient::new();
    http.push(
        201,
        r#"{"id":"link-2","roles":["read"],"link":{"type":"view","scope":"anonymous","webUrl":"https://1drv.ms/u/s!abc"}}"#,
    );

    let drive = operations(http.clone(), Arc::new(RecordingSink::default()));
    let link = drive
        .create_share_link("item1", LinkType::default(), LinkScope::default())
        .await
        .unwrap();

    assert_eq!(link.web_url.as_deref(), Some("https://1drv.ms/u/s!abc"));
    let body: serde_json::Value =
        serde_json::from_slice(http.requests()[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "type": "view", "scope": "anonymous" }));
}
