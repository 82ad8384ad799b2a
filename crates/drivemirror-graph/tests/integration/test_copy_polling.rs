//! Copy start and monitor polling against the mock endpoint

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::domain::{
    ConflictBehavior, CopyDestination, CopySource, CopyStarted, DriveId, NodeId, OperationHandle,
    OperationStatus,
};
use drivemirror_core::ports::ITreeService;

use crate::common::{item_json, setup_tree};

fn copy_args() -> (CopySource, CopyDestination) {
    (
        CopySource {
            drive_id: DriveId::new("drive-src").unwrap(),
            node_id: NodeId::new("item-9").unwrap(),
        },
        CopyDestination {
            drive_id: DriveId::new("drive-test").unwrap(),
            parent_id: NodeId::new("dest-root").unwrap(),
        },
    )
}

#[tokio::test]
async fn accepted_copy_returns_the_monitor_handle() {
    let (server, service) = setup_tree().await;
    let monitor = format!("{}/monitor/op-1", server.uri());
    Mock::given(method("POST"))
        .and(path("/drives/drive-src/items/item-9/copy"))
        .and(query_param("@microsoft.graph.conflictBehavior", "fail"))
        .and(body_json(json!({
            "name": "report.xlsx",
            "parentReference": { "driveId": "drive-test", "id": "dest-root" },
        })))
        .respond_with(ResponseTemplate::new(202).insert_header("Location", monitor.as_str()))
        .mount(&server)
        .await;

    let (source, dest) = copy_args();
    let started = service
        .copy_node(&source, &dest, "report.xlsx", ConflictBehavior::Fail)
        .await
        .unwrap();
    match started {
        CopyStarted::Accepted(handle) => assert_eq!(handle.as_str(), monitor),
        CopyStarted::Completed(_) => panic!("expected a monitor handle"),
    }
}

#[tokio::test]
async fn synchronous_copy_returns_the_new_node() {
    let (server, service) = setup_tree().await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-src/items/item-9/copy"))
        .and(query_param("@microsoft.graph.conflictBehavior", "replace"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(item_json("copy-1", "report.xlsx", false, 64)),
        )
        .mount(&server)
        .await;

    let (source, dest) = copy_args();
    let started = service
        .copy_node(&source, &dest, "report.xlsx", ConflictBehavior::Replace)
        .await
        .unwrap();
    match started {
        CopyStarted::Completed(node) => assert_eq!(node.id.as_str(), "copy-1"),
        CopyStarted::Accepted(_) => panic!("expected synchronous completion"),
    }
}

#[tokio::test]
async fn rejected_copy_start_surfaces_the_diagnostic() {
    let (server, service) = setup_tree().await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-src/items/item-9/copy"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "nameAlreadyExists", "message": "An item with that name exists" }
        })))
        .mount(&server)
        .await;

    let (source, dest) = copy_args();
    let err = service
        .copy_node(&source, &dest, "report.xlsx", ConflictBehavior::Fail)
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("nameAlreadyExists"));
}

#[tokio::test]
async fn in_progress_poll_reports_percent_and_pace() {
    let (server, service) = setup_tree().await;
    let monitor = format!("{}/monitor/op-1", server.uri());
    Mock::given(method("GET"))
        .and(path("/monitor/op-1"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Retry-After", "7")
                .set_body_json(json!({ "status": "inProgress", "percentageComplete": 41.5 })),
        )
        .mount(&server)
        .await;

    let status = service
        .poll_operation(&OperationHandle::new(monitor))
        .await
        .unwrap();
    assert_eq!(
        status,
        OperationStatus::InProgress {
            percent: Some(41.5),
            retry_after: Some(Duration::from_secs(7)),
        }
    );
}

#[tokio::test]
async fn completed_poll_carries_the_resource_id() {
    let (server, service) = setup_tree().await;
    let monitor = format!("{}/monitor/op-2", server.uri());
    Mock::given(method("GET"))
        .and(path("/monitor/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "percentageComplete": 100.0,
            "resourceId": "copied-7",
        })))
        .mount(&server)
        .await;

    let status = service
        .poll_operation(&OperationHandle::new(monitor))
        .await
        .unwrap();
    assert_eq!(
        status,
        OperationStatus::Completed {
            resource_id: Some(NodeId::new("copied-7").unwrap()),
        }
    );
}

#[tokio::test]
async fn failed_poll_surfaces_the_description() {
    let (server, service) = setup_tree().await;
    let monitor = format!("{}/monitor/op-3", server.uri());
    Mock::given(method("GET"))
        .and(path("/monitor/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "failed",
            "statusDescription": "Name already exists",
        })))
        .mount(&server)
        .await;

    let status = service
        .poll_operation(&OperationHandle::new(monitor))
        .await
        .unwrap();
    assert_eq!(
        status,
        OperationStatus::Failed {
            message: "Name already exists".to_string(),
        }
    );
}

#[tokio::test]
async fn rejected_poll_is_an_authorization_status_not_an_error() {
    let (server, service) = setup_tree().await;
    for (op, code) in [("op-4", 401u16), ("op-5", 403)] {
        Mock::given(method("GET"))
            .and(path(format!("/monitor/{op}")))
            .respond_with(ResponseTemplate::new(code))
            .mount(&server)
            .await;

        let monitor = format!("{}/monitor/{op}", server.uri());
        let status = service
            .poll_operation(&OperationHandle::new(monitor))
            .await
            .unwrap();
        assert_eq!(status, OperationStatus::AuthorizationExpired);
    }
}
