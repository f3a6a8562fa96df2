#![cfg(feature = "integration-tests")]

use common::mongo::MongoClient;
use mongodb::bson::doc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

async fn setup_mongo() -> (ContainerAsync<Mongo>, MongoClient) {
    let mongo = Mongo::default().start().await.unwrap();
    let host = mongo.get_host().await.unwrap();
    let port = mongo.get_host_port_ipv4(27017).await.unwrap();

    let client = MongoClient::connect(
        &format!("mongodb://{}:{}", host, port),
        Duration::from_secs(5),
    )
    .await
    .unwrap();

    (mongo, client)
}

#[tokio::test]
async fn test_ping_succeeds_against_running_server() {
    let (_container, client) = setup_mongo().await;

    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_collection_handle_inserts_into_addressed_location() {
    let (_container, client) = setup_mongo().await;

    let collection = client.collection("presence_db", "sensors_a");
    collection
        .insert_one(doc! { "sensor_id": "sensor-42", "person_count": 7 })
        .await
        .unwrap();

    let stored = collection
        .find_one(doc! { "sensor_id": "sensor-42" })
        .await
        .unwrap()
        .expect("document should be stored");
    assert_eq!(stored.get_i32("person_count").unwrap(), 7);
}

#[tokio::test]
async fn test_ping_fails_when_server_unreachable() {
    let client = MongoClient::connect("mongodb://127.0.0.1:1", Duration::from_millis(500))
        .await
        .unwrap();

    assert!(client.ping().await.is_err());
}
