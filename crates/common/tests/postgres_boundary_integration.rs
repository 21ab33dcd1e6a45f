#![cfg(feature = "integration-tests")]

use chrono::{TimeZone, Utc};
use common::domain::{DeviceKeyResolver, DispatchSink, DomainError, ScaledAmount, CASH_CHANNEL};
use common::postgres::{
    PostgresClient, PostgresConfig, PostgresDeviceKeyResolver, PostgresDispatchSink,
};
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

const OWNER_ID: &str = "6f1c2a8e-0d2b-4a51-9d0e-0a8f7c1b2e31";
const EMBEDDED_ID: &str = "0c9d7e3a-55b0-4c4a-8d61-2f4b9a7e6c10";

// Minimal registry tables; the real schema is owned by the registry service
// and keys devices by an int4 `subdomain`
const SCHEMA: &str = "
    CREATE TABLE embeddeds (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        subdomain INTEGER NOT NULL UNIQUE,
        passkey TEXT NOT NULL,
        status TEXT,
        status_at TIMESTAMPTZ
    );
    CREATE TABLE sales (
        id BIGSERIAL PRIMARY KEY,
        owner_id UUID NOT NULL,
        embedded_id UUID NOT NULL,
        item_number INTEGER NOT NULL,
        item_price NUMERIC(12, 2) NOT NULL,
        channel TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    CREATE TABLE paxcounter (
        id BIGSERIAL PRIMARY KEY,
        owner_id UUID NOT NULL,
        embedded_id UUID NOT NULL,
        count INTEGER NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );
";

async fn setup_test_db() -> (ContainerAsync<Postgres>, PostgresClient) {
    let postgres = Postgres::default().start().await.unwrap();
    let host = postgres.get_host().await.unwrap();
    let port = postgres.get_host_port_ipv4(5432).await.unwrap();

    let config = PostgresConfig {
        host: host.to_string(),
        port,
        max_pool_size: 5,
        ..PostgresConfig::default()
    };
    let client = PostgresClient::new(&config).expect("Failed to create client");

    let conn = client.get_connection().await.unwrap();
    conn.batch_execute(SCHEMA).await.unwrap();
    conn.execute(
        "INSERT INTO embeddeds (id, owner_id, subdomain, passkey)
         VALUES ($1::text::uuid, $2::text::uuid, $3::bigint, $4)",
        &[&EMBEDDED_ID, &OWNER_ID, &42_i64, &"abc"],
    )
    .await
    .unwrap();

    (postgres, client)
}

#[tokio::test]
async fn test_resolve_known_domain() {
    let (_container, client) = setup_test_db().await;
    let resolver = PostgresDeviceKeyResolver::new(client);

    let record = resolver.resolve(42).await.unwrap().unwrap();

    assert_eq!(record.domain_id, 42);
    assert_eq!(record.internal_id, EMBEDDED_ID);
    assert_eq!(record.owner_id, OWNER_ID);
    assert_eq!(record.passkey, b"abc".to_vec());
    assert!(record.status.is_none());
}

#[tokio::test]
async fn test_resolve_unknown_domain_returns_none() {
    let (_container, client) = setup_test_db().await;
    let resolver = PostgresDeviceKeyResolver::new(client);

    let record = resolver.resolve(7).await.unwrap();

    assert!(record.is_none());
}

#[tokio::test]
async fn test_record_status_updates_registry_row() {
    let (_container, client) = setup_test_db().await;
    let sink = PostgresDispatchSink::new(client.clone());
    let resolver = PostgresDeviceKeyResolver::new(client);
    let observed_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

    sink.record_status(42, "online", observed_at).await.unwrap();

    let record = resolver.resolve(42).await.unwrap().unwrap();
    assert_eq!(record.status.as_deref(), Some("online"));
    assert_eq!(record.status_at, Some(observed_at));
}

#[tokio::test]
async fn test_record_status_unknown_domain() {
    let (_container, client) = setup_test_db().await;
    let sink = PostgresDispatchSink::new(client);

    let result = sink.record_status(999, "online", Utc::now()).await;

    assert!(matches!(result, Err(DomainError::DeviceNotFound(999))));
}

#[tokio::test]
async fn test_record_sale_stores_exact_price() {
    let (_container, client) = setup_test_db().await;
    let sink = PostgresDispatchSink::new(client.clone());
    let price = ScaledAmount::from_scale_factor(200, 1, 2);

    sink.record_sale(OWNER_ID, EMBEDDED_ID, 5, price, CASH_CHANNEL)
        .await
        .unwrap();

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "SELECT item_number, item_price::text, channel FROM sales WHERE embedded_id = $1::text::uuid",
            &[&EMBEDDED_ID],
        )
        .await
        .unwrap();
    let item_number: i32 = row.get(0);
    let item_price: String = row.get(1);
    let channel: String = row.get(2);

    assert_eq!(item_number, 5);
    assert_eq!(item_price, "2.00");
    assert_eq!(channel, "cash");
}

#[tokio::test]
async fn test_record_pax_count() {
    let (_container, client) = setup_test_db().await;
    let sink = PostgresDispatchSink::new(client.clone());

    sink.record_pax_count(OWNER_ID, EMBEDDED_ID, 7).await.unwrap();

    let conn = client.get_connection().await.unwrap();
    let row = conn
        .query_one(
            "SELECT count FROM paxcounter WHERE embedded_id = $1::text::uuid",
            &[&EMBEDDED_ID],
        )
        .await
        .unwrap();
    let count: i32 = row.get(0);

    assert_eq!(count, 7);
}
