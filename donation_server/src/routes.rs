//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Any database access must be awaited, never blocked on.
//! The donation stream in particular is long-lived, so it must never hold a worker thread while it waits for updates.
use actix_web::{get, http::header, web, HttpResponse, Responder};
use donation_engine::{events::DonationsUpdated, CounterStore, DonationFlowApi};
use futures::{stream, StreamExt};
use log::*;
use serde_json::Value;

use crate::{errors::ServerError, helpers::sse_event};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Donations  ----------------------------------------------------
route!(donations => Get "/donations" impl CounterStore);
/// Route handler for the current donation counts.
///
/// The counts are reloaded from the database first, so this also brings the in-memory counts back in line with the
/// store. Responds with `500` if the database cannot be read.
pub async fn donations<B: CounterStore>(api: web::Data<DonationFlowApi<B>>) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received donations request");
    let snapshot = api.refresh_from_store().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

route!(payment_completed => Post "/donations/payment_completed" impl CounterStore);
/// Route handler for "payment completed" notifications.
///
/// The body is the list of purchased items, `[{ "name": "Пицца Маргарита", "quantity": 2 }, ...]`.
/// Responds with the donation counts after the batch was applied, or `400` if the body is not a non-empty list.
pub async fn payment_completed<B: CounterStore>(
    api: web::Data<DonationFlowApi<B>>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ServerError> {
    let payload = body.into_inner();
    debug!("💻️ Received payment completed notification: {payload}");
    let snapshot = api.process_payment(&payload).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

route!(donation_stream => Get "/donations/stream" impl CounterStore);
/// Route handler for the live donation stream.
///
/// The viewer immediately receives the current counts, and then every update as a server-sent `updateDonations` event.
/// The viewer is disconnected from the broadcast gateway when the stream is dropped.
pub async fn donation_stream<B: CounterStore>(api: web::Data<DonationFlowApi<B>>) -> HttpResponse {
    let (current, subscription) = api.subscribe();
    info!("💻️ Viewer #{} connected to the donation stream", subscription.id());
    let initial = stream::once(async move { DonationsUpdated::new(current) });
    let updates = stream::unfold(subscription, |mut subscription| async move {
        subscription.recv().await.map(|event| (event, subscription))
    });
    let body = initial.chain(updates).map(|event| {
        sse_event(&event).map_err(|e| {
            error!("💻️ Could not serialize donation update. {e}");
            ServerError::Unspecified(e.to_string())
        })
    });
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(body)
}
