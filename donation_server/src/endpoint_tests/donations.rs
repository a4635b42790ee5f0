use actix_web::http::StatusCode;
use donation_engine::{
    buckets::{BucketCounts, DonationBucket},
    CounterStoreError,
};

use super::{
    helpers::{api_for, get_request, memory_api, post_request, SEEDED_JSON},
    mocks::MockStore,
};

#[actix_web::test]
async fn health_check() {
    let (api, _) = memory_api().await;
    let (status, body) = get_request(api, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn fetch_donations_on_fresh_store() {
    let (api, _) = memory_api().await;
    let (status, body) = get_request(api, "/donations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SEEDED_JSON);
}

#[actix_web::test]
async fn fetch_donations_reloads_from_the_store() {
    let (api, store) = memory_api().await;
    store.set_counts(BucketCounts::try_from_rows([(1, 100), (2, 40), (3, 35), (4, 25)]).unwrap());
    let (status, body) = get_request(api.clone(), "/donations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"1":100,"2":40,"3":35,"4":25}"#);
    assert_eq!(api.snapshot().get(DonationBucket::Pizza), 40);
}

#[actix_web::test]
async fn fetch_donations_when_the_database_is_down() {
    let mut store = MockStore::new();
    store.expect_load_all().returning(|| Err(CounterStoreError::Unavailable("database is locked".into())));
    let api = api_for(store);
    let (status, body) = get_request(api, "/donations").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, r#"{"error":"An error occurred on the backend of the server. Could not load the donation counts."}"#);
}

#[actix_web::test]
async fn pizza_payment() {
    let (api, store) = memory_api().await;
    let payload = r#"[{"name": "Пицца Маргарита", "quantity": 2}]"#;
    let (status, body) = post_request(api.clone(), "/donations/payment_completed", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"1":22,"2":9,"3":10,"4":3}"#);
    assert_eq!(store.count(DonationBucket::Pizza), Some(9));
    assert_eq!(store.count(DonationBucket::Total), Some(22));
    let (_, body) = get_request(api, "/donations").await;
    assert_eq!(body, r#"{"1":22,"2":9,"3":10,"4":3}"#);
}

#[actix_web::test]
async fn payment_with_unmatched_and_malformed_items() {
    let (api, store) = memory_api().await;
    let payload = r#"[
        {"name": "Кола", "quantity": 1},
        {"name": "Компот", "quantity": 5},
        {"quantity": 3},
        {"name": "Кат Бургер", "quantity": "many"}
    ]"#;
    let (status, body) = post_request(api, "/donations/payment_completed", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"1":21,"2":7,"3":11,"4":3}"#);
    assert_eq!(store.increment_calls(), 2);
}

#[actix_web::test]
async fn payment_that_is_not_a_list() {
    let (api, store) = memory_api().await;
    let (status, body) = post_request(api.clone(), "/donations/payment_completed", r#"{"name": "Кола"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid payload. Purchased items must be a list"}"#);
    let (status, body) = post_request(api.clone(), "/donations/payment_completed", "[]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid payload. The list of purchased items is empty"}"#);
    assert_eq!(store.increment_calls(), 0);
    assert_eq!(api.snapshot().counts(), BucketCounts::seeded());
}

#[actix_web::test]
async fn payment_that_is_not_json() {
    let (api, store) = memory_api().await;
    let (status, _) = post_request(api, "/donations/payment_completed", "pizza please").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.increment_calls(), 0);
}

#[actix_web::test]
async fn payment_when_writes_fail() {
    let mut store = MockStore::new();
    store.expect_increment().times(2).returning(|_, _| Err(CounterStoreError::Unavailable("disk I/O error".into())));
    store.expect_load_all().times(1).returning(|| Ok(BucketCounts::seeded()));
    let api = api_for(store);
    let payload = r#"[{"name": "Пицца", "quantity": 2}]"#;
    let (status, body) = post_request(api.clone(), "/donations/payment_completed", payload).await;
    // The counts are reconciled with the store rather than reporting an error
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SEEDED_JSON);
    assert_eq!(api.snapshot().counts(), BucketCounts::seeded());
}
