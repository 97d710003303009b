//! OpenAPI specification generation and app factory.

use crate::{
    config::MetricsConfig,
    handlers::{
        forecast, get_metrics, health, history, overview, search_cities, version, weather,
        weather_batch,
    },
    middleware::{MetricsMiddleware, RequestIdMiddleware},
    services::{AppMetrics, WeatherService},
};
use actix_web::App;
use paperclip::actix::{web, OpenApiExt};
use paperclip::v2::models::{DefaultApiRaw, Info};

/// Creates the shared OpenAPI specification for the API
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "Tarnished Weather API".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Resilient weather data acquisition over one or more upstream providers.\n\n\
                ## Locations\n\
                Weather endpoints accept either `city` or both `lat` and `lon`, never both. \
                Place names are normalized and checked for injection patterns before use.\n\
                \n\
                ## Degraded responses\n\
                When every configured provider is unavailable, current, forecast and history \
                endpoints return synthesized data with `is_fallback: true`. Synthesized data is \
                never cached.\n\
                \n\
                ## Errors\n\
                - `400`: invalid location or out-of-range `days`\n\
                - `404`: the city is unknown to the provider\n\
                - `503`: misconfiguration, or search that timed out or has no geocoder available\n\
                \n\
                Every response carries an `X-Request-ID` header; a client-supplied value is reused."
                    .into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Creates the application with all routes, middleware and shared state.
///
/// Used by the binary and by integration tests, so both exercise the same
/// wiring.
pub fn create_app(
    service: web::Data<WeatherService>,
    metrics: web::Data<AppMetrics>,
    metrics_config: MetricsConfig,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .wrap(RequestIdMiddleware)
        .wrap(MetricsMiddleware)
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(service)
        .app_data(metrics)
        .app_data(web::Data::new(metrics_config))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .service(web::resource("/api/weather").route(web::get().to(weather)))
        .service(web::resource("/api/weather/batch").route(web::get().to(weather_batch)))
        .service(web::resource("/api/forecast").route(web::get().to(forecast)))
        .service(web::resource("/api/history").route(web::get().to(history)))
        .service(web::resource("/api/cities").route(web::get().to(search_cities)))
        .service(web::resource("/api/overview").route(web::get().to(overview)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}
