//! Account identity lookup

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use drivemirror_core::ports::ITreeService;

use crate::common::setup_tree;

#[tokio::test]
async fn account_info_prefers_the_mail_attribute() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "displayName": "Dana Mirror",
            "mail": "dana@example.com",
            "userPrincipalName": "dana_example.com#EXT#@contoso.example",
        })))
        .mount(&server)
        .await;

    let info = service.account_info().await.unwrap();
    assert_eq!(info.display_name, "Dana Mirror");
    assert_eq!(info.email.as_str(), "dana@example.com");
}

#[tokio::test]
async fn account_info_falls_back_to_the_principal_name() {
    let (server, service) = setup_tree().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "displayName": "Work Account",
            "userPrincipalName": "work@contoso.example",
        })))
        .mount(&server)
        .await;

    let info = service.account_info().await.unwrap();
    assert_eq!(info.email.as_str(), "work@contoso.example");
}
