//! Item lookup, listing and folder creation against the mock endpoint

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivemirror_core::domain::{NodeId, NodeKind};
use drivemirror_core::ports::ITreeService;
use drivemirror_graph::GraphTreeService;

use crate::common::{item_json, setup_tree, test_client};

#[tokio::test]
async fn connect_discovers_the_default_drive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "drive-77" })))
        .mount(&server)
        .await;

    let service = GraphTreeService::connect(test_client(&server)).await.unwrap();
    assert_eq!(service.drive_id().as_str(), "drive-77");
}

#[tokio::test]
async fn root_lookup_maps_the_item() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/root"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(item_json("root-0", "root", true, 9000)),
        )
        .mount(&server)
        .await;

    let root = service.get_root().await.unwrap();
    assert_eq!(root.id.as_str(), "root-0");
    assert_eq!(root.kind, NodeKind::Folder);
    assert_eq!(root.size, Some(9000));
}

#[tokio::test]
async fn children_listing_follows_the_next_link() {
    let (server, service) = setup_tree().await;
    let page2_url = format!(
        "{}/drives/drive-test/items/dir-1/children?$skiptoken=page2",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/dir-1/children"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [ item_json("f-2", "b.txt", false, 20) ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/dir-1/children"))
        .and(query_param("$top", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [ item_json("f-1", "a.txt", false, 10) ],
            "@odata.nextLink": page2_url,
        })))
        .mount(&server)
        .await;

    let dir = NodeId::new("dir-1").unwrap();
    let first = service.list_children(&dir, None).await.unwrap();
    assert_eq!(first.nodes.len(), 1);
    assert_eq!(first.nodes[0].name, "a.txt");

    let cursor = first.next.clone().unwrap();
    let second = service.list_children(&dir, Some(&cursor)).await.unwrap();
    assert_eq!(second.nodes[0].name, "b.txt");
    assert!(second.next.is_none());
}

#[tokio::test]
async fn folder_creation_sends_the_conflict_directive() {
    let (server, service) = setup_tree().await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-test/items/parent-1/children"))
        .and(body_json(json!({
            "name": "Mirrored",
            "folder": {},
            "@microsoft.graph.conflictBehavior": "fail",
        })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(item_json("new-1", "Mirrored", true, 0)),
        )
        .mount(&server)
        .await;

    let created = service
        .create_folder(&NodeId::new("parent-1").unwrap(), "Mirrored")
        .await
        .unwrap();
    assert_eq!(created.id.as_str(), "new-1");
    assert_eq!(created.kind, NodeKind::Folder);
}

#[tokio::test]
async fn path_lookup_resolves_nested_folders() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/root:/Documents/Reports:"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(item_json("rep-1", "Reports", true, 512)),
        )
        .mount(&server)
        .await;

    let node = service
        .get_node_by_path("/Documents/Reports")
        .await
        .unwrap()
        .expect("path should resolve");
    assert_eq!(node.id.as_str(), "rep-1");
}

#[tokio::test]
async fn missing_path_is_none_not_an_error() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/root:/no/such/place:"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "itemNotFound", "message": "The resource could not be found." }
        })))
        .mount(&server)
        .await;

    assert!(service.get_node_by_path("/no/such/place").await.unwrap().is_none());
}

#[tokio::test]
async fn throttled_request_retries_after_the_hinted_delay() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/busy-1"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/busy-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(item_json("busy-1", "busy.bin", false, 1)),
        )
        .mount(&server)
        .await;

    let node = service.get_node(&NodeId::new("busy-1").unwrap()).await.unwrap();
    assert_eq!(node.name, "busy.bin");
}

#[tokio::test]
async fn remote_errors_carry_the_diagnostic() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/locked-1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "accessDenied", "message": "Caller lacks permission" }
        })))
        .mount(&server)
        .await;

    let err = service
        .get_node(&NodeId::new("locked-1").unwrap())
        .await
        .unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("accessDenied"), "got: {text}");
    assert!(text.contains("Caller lacks permission"), "got: {text}");
}
