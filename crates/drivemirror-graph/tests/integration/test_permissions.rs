//! Sharing permission listing, grants and revocation

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::domain::{Email, NodeId, PermissionId, PermissionRole};
use drivemirror_core::ports::ITreeService;

use crate::common::setup_tree;

#[tokio::test]
async fn listing_collects_grantees_across_pages() {
    let (server, service) = setup_tree().await;
    let page2_url = format!(
        "{}/drives/drive-test/items/item-1/permissions?$skiptoken=p2",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/item-1/permissions"))
        .and(query_param("$skiptoken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "perm-2",
                "roles": ["write"],
                "grantedToIdentitiesV2": [{ "user": { "email": "editor@example.com" } }],
            }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/drives/drive-test/items/item-1/permissions"))
        .and(query_param("$top", "200"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "perm-1",
                "roles": ["read"],
                "grantedToV2": { "user": { "email": "viewer@example.com" } },
            }],
            "@odata.nextLink": page2_url,
        })))
        .mount(&server)
        .await;

    let node = NodeId::new("item-1").unwrap();
    let first = service.list_permissions(&node, None).await.unwrap();
    assert_eq!(first.permissions.len(), 1);
    assert!(first.permissions[0].covers(&Email::new("viewer@example.com").unwrap()));

    let cursor = first.next.clone().unwrap();
    let second = service.list_permissions(&node, Some(&cursor)).await.unwrap();
    assert!(second.permissions[0].covers(&Email::new("editor@example.com").unwrap()));
    assert!(second.next.is_none());
}

#[tokio::test]
async fn grant_sends_a_sign_in_only_invitation() {
    let (server, service) = setup_tree().await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-test/items/item-1/invite"))
        .and(body_json(json!({
            "recipients": [ { "email": "mirror@example.com" } ],
            "requireSignIn": true,
            "sendInvitation": false,
            "roles": [ "read" ],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "perm-9",
                "roles": ["read"],
                "grantedToV2": { "user": { "email": "mirror@example.com" } },
            }],
        })))
        .mount(&server)
        .await;

    let granted = service
        .grant_permission(
            &NodeId::new("item-1").unwrap(),
            &Email::new("mirror@example.com").unwrap(),
            PermissionRole::Read,
        )
        .await
        .unwrap();
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0].id.as_str(), "perm-9");
    assert!(granted[0].covers(&Email::new("mirror@example.com").unwrap()));
}

#[tokio::test]
async fn empty_grant_response_is_an_error() {
    let (server, service) = setup_tree().await;
    Mock::given(method("POST"))
        .and(path("/drives/drive-test/items/item-1/invite"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .mount(&server)
        .await;

    let err = service
        .grant_permission(
            &NodeId::new("item-1").unwrap(),
            &Email::new("mirror@example.com").unwrap(),
            PermissionRole::Read,
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no permissions"));
}

#[tokio::test]
async fn revocation_deletes_the_permission() {
    let (server, service) = setup_tree().await;
    Mock::given(method("DELETE"))
        .and(path("/drives/drive-test/items/item-1/permissions/perm-9"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    service
        .revoke_permission(
            &NodeId::new("item-1").unwrap(),
            &PermissionId::new("perm-9").unwrap(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn revoking_a_missing_permission_is_an_error() {
    let (server, service) = setup_tree().await;
    Mock::given(method("DELETE"))
        .and(path("/drives/drive-test/items/item-1/permissions/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "itemNotFound", "message": "permission does not exist" }
        })))
        .mount(&server)
        .await;

    let err = service
        .revoke_permission(
            &NodeId::new("item-1").unwrap(),
            &PermissionId::new("gone").unwrap(),
        )
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("itemNotFound"));
}
