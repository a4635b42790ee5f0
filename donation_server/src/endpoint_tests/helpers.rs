use actix_web::{
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    App,
};
use donation_engine::{
    cache::AggregationCache,
    events::BroadcastGateway,
    test_utils::MemoryCounterStore,
    CounterStore,
    DonationFlowApi,
};
use log::debug;

use crate::routes::{health, DonationStreamRoute, DonationsRoute, PaymentCompletedRoute};

pub const SEEDED_JSON: &str = r#"{"1":20,"2":7,"3":10,"4":3}"#;

/// An api backed by a freshly seeded in-memory store. The store is returned too, so tests can inspect it.
pub async fn memory_api() -> (web::Data<DonationFlowApi<MemoryCounterStore>>, MemoryCounterStore) {
    let _ = env_logger::try_init().ok();
    let store = MemoryCounterStore::new();
    let api = DonationFlowApi::initialize(store.clone(), BroadcastGateway::default())
        .await
        .expect("Failed to initialize api");
    (web::Data::new(api), store)
}

/// An api around `store` that starts with the default counts, without touching the store.
pub fn api_for<B: CounterStore>(store: B) -> web::Data<DonationFlowApi<B>> {
    let _ = env_logger::try_init().ok();
    web::Data::new(DonationFlowApi::new(store, AggregationCache::default(), BroadcastGateway::default()))
}

pub async fn get_request<B: CounterStore + 'static>(
    api: web::Data<DonationFlowApi<B>>,
    path: &str,
) -> (StatusCode, String) {
    send(api, TestRequest::get().uri(path)).await
}

pub async fn post_request<B: CounterStore + 'static>(
    api: web::Data<DonationFlowApi<B>>,
    path: &str,
    body: &str,
) -> (StatusCode, String) {
    let req = TestRequest::post().uri(path).insert_header(ContentType::json()).set_payload(body.to_string());
    send(api, req).await
}

async fn send<B: CounterStore + 'static>(
    api: web::Data<DonationFlowApi<B>>,
    req: TestRequest,
) -> (StatusCode, String) {
    let app = App::new()
        .app_data(api)
        .service(health)
        .service(DonationsRoute::<B>::new())
        .service(PaymentCompletedRoute::<B>::new())
        .service(DonationStreamRoute::<B>::new());
    let service = test::init_service(app).await;
    debug!("Making request");
    let res = test::call_service(&service, req.to_request()).await;
    let status = res.status();
    let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
    (status, body)
}
