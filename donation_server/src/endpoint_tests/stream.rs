use actix_web::{
    body::MessageBody,
    http::{
        header::{self, ContentType},
        StatusCode,
    },
    test,
    test::TestRequest,
    App,
};
use bytes::Bytes;
use donation_engine::test_utils::MemoryCounterStore;
use futures::future::poll_fn;

use super::helpers::memory_api;
use crate::routes::{DonationStreamRoute, PaymentCompletedRoute};

#[actix_web::test]
async fn viewers_receive_current_counts_and_updates() {
    let (api, store) = memory_api().await;
    let app = App::new()
        .app_data(api.clone())
        .service(DonationStreamRoute::<MemoryCounterStore>::new())
        .service(PaymentCompletedRoute::<MemoryCounterStore>::new());
    let service = test::init_service(app).await;

    let req = TestRequest::get().uri("/donations/stream").to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get(header::CONTENT_TYPE).unwrap(), "text/event-stream");
    assert_eq!(res.headers().get(header::CACHE_CONTROL).unwrap(), "no-cache");
    assert_eq!(api.gateway().viewer_count(), 1);

    let mut body = Box::pin(res.into_body());
    let first = poll_fn(|cx| body.as_mut().poll_next(cx)).await.unwrap().unwrap();
    assert_eq!(first, Bytes::from("event: updateDonations\ndata: {\"1\":20,\"2\":7,\"3\":10,\"4\":3}\n\n"));

    let req = TestRequest::post()
        .uri("/donations/payment_completed")
        .insert_header(ContentType::json())
        .set_payload(r#"[{"name": "Кат Бургер", "quantity": 4}]"#)
        .to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(store.increment_calls(), 2);

    let update = poll_fn(|cx| body.as_mut().poll_next(cx)).await.unwrap().unwrap();
    assert_eq!(update, Bytes::from("event: updateDonations\ndata: {\"1\":24,\"2\":7,\"3\":10,\"4\":7}\n\n"));

    drop(body);
    assert_eq!(api.gateway().viewer_count(), 0);
}

#[actix_web::test]
async fn batches_without_donations_are_not_streamed() {
    let (api, _) = memory_api().await;
    let (_, mut viewer) = api.subscribe();
    let payload = serde_json::json!([{"name": "Компот", "quantity": 2}]);
    api.process_payment(&payload).await.unwrap();
    assert!(viewer.try_recv().is_none());
    assert_eq!(api.gateway().viewer_count(), 1);
}
