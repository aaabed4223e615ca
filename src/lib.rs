pub mod archive;
pub mod config;
pub mod download;
pub mod error;
pub mod external;
pub mod form;
pub mod imaging;
pub mod pdf;
pub mod raster;
pub mod routes;
pub mod workspace;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{Service as _, ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::Logger;
use actix_web::{web, App};
use config::Settings;
use tracing::Instrument;

/// Builds the application. Shared by the server binary and the integration tests.
pub fn app(
    settings: web::Data<Settings>,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let debug_trace = settings.debug_trace;

    App::new()
        .app_data(settings)
        .configure(routes::configure)
        // `request_id` is filled in once the handler allocates its workspace.
        .wrap_fn(|req, srv| {
            let span = tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.path(),
                request_id = tracing::field::Empty,
            );
            srv.call(req).instrument(span)
        })
        .wrap(error::trace_policy(debug_trace))
        .wrap(Logger::default())
        .wrap(Cors::permissive())
}
