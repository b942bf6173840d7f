//! Device client with a persisted token

mod common;

use comfort_cloud::oauth::{Freshness, TokenStorage};
use comfort_cloud::{ComfortCloudClient, Error};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

fn client(server: &MockServer, dir: &tempfile::TempDir) -> ComfortCloudClient {
    let storage = TokenStorage::new(dir.path().join("token.json"));
    ComfortCloudClient::from_parts(session(server, None), storage)
}

async fn mount_groups(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/device/group"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uiFlg": false,
            "groupCount": 1,
            "groupList": [{
                "groupId": 1,
                "groupName": "Home",
                "deviceList": [{
                    "deviceGuid": "CS-Z25/XKEW+1",
                    "deviceHashGuid": "hash-1",
                    "deviceName": "Bedroom",
                    "deviceType": "3"
                }]
            }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn login_without_token_file_logs_in_and_saves() {
    let server = MockServer::start().await;
    let access_token = mount_full_login(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, &dir);

    assert_eq!(client.login().await.unwrap(), Freshness::Relogged);

    let saved = client.storage().load().expect("token saved");
    assert_eq!(saved.access_token, access_token);
    assert_eq!(saved.acc_client_id, ACC_CLIENT_ID);
}

#[tokio::test]
async fn login_reuses_valid_token_file() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, &dir);
    client.storage().save(&valid_token()).unwrap();

    assert_eq!(client.login().await.unwrap(), Freshness::AlreadyValid);
    assert_eq!(client.session().token().await.unwrap().acc_client_id, "acc-7");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn login_refreshes_expired_token_file() {
    let server = MockServer::start().await;
    let new_access = jwt(now(), now() + 3600);
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": new_access})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, &dir);
    client.storage().save(&expired_token("refresh-old")).unwrap();

    assert_eq!(client.login().await.unwrap(), Freshness::Refreshed);
    let saved = client.storage().load().unwrap();
    assert_eq!(saved.access_token, new_access);
    assert_eq!(saved.acc_client_id, "acc-old");
}

#[tokio::test]
async fn lists_groups_and_fetches_device_status() {
    let server = MockServer::start().await;
    mount_groups(&server).await;
    Mock::given(method("GET"))
        .and(path("/deviceStatus/CS-Z25fXKEW%2B1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"parameters": {"operate": 1}})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, &dir);
    client.storage().save(&valid_token()).unwrap();
    client.login().await.unwrap();

    let groups = client.fetch_groups_and_devices().await.unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(client.devices().await.len(), 1);

    let (device, status) = client.get_device("hash-1").await.unwrap();
    assert_eq!(device.device_name, "Bedroom");
    assert_eq!(status["parameters"]["operate"], 1);

    let md5_id = format!("{:x}", md5::compute("CS-Z25/XKEW+1"));
    let (device, _) = client.get_device(&md5_id).await.unwrap();
    assert_eq!(device.device_hash_guid, "hash-1");
}

#[tokio::test]
async fn unknown_device_is_not_found() {
    let server = MockServer::start().await;
    mount_groups(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let client = client(&server, &dir);
    client.storage().save(&valid_token()).unwrap();
    client.login().await.unwrap();

    let err = client.get_device("nope").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}
