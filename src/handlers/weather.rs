//! Weather endpoint handlers.
//!
//! Every handler delegates to the shared [`WeatherService`] and maps
//! pipeline errors to HTTP responses carrying only
//! [`WeatherError::user_message`] text.

use crate::{
    models::{
        BatchWeatherQuery, CityMatch, CitySearchQuery, CityWeatherResult, ForecastQuery,
        ForecastSnapshot, HistoryQuery, LocationInput, WeatherOverview, WeatherQuery,
        WeatherSnapshot,
    },
    services::{error::WeatherError, validation::ValidationError, WeatherService},
};
use actix_web::{web, Error, HttpRequest, Result};
use paperclip::actix::api_v2_operation;

/// Default number of past days for the history endpoint.
pub const DEFAULT_HISTORY_DAYS: u32 = 3;

/// Convert a pipeline error into an HTTP error with user-safe text.
pub fn error_response(error: &WeatherError) -> Error {
    let message = error.user_message();
    match error {
        WeatherError::Validation(_) => actix_web::error::ErrorBadRequest(message),
        WeatherError::NotFound => actix_web::error::ErrorNotFound(message),
        _ => {
            tracing::warn!(
                target: "weather_pipeline",
                error = %error,
                "Weather request failed"
            );
            actix_web::error::ErrorServiceUnavailable(message)
        }
    }
}

fn weather_service(req: &HttpRequest) -> Result<&web::Data<WeatherService>, Error> {
    req.app_data::<web::Data<WeatherService>>()
        .ok_or_else(|| actix_web::error::ErrorServiceUnavailable("Weather service unavailable"))
}

fn describe(input: &LocationInput) -> String {
    match input {
        LocationInput::Name(name) => name.clone(),
        LocationInput::Coordinates { lat, lon } => format!("{lat},{lon}"),
    }
}

/// Current weather endpoint
#[api_v2_operation(
    summary = "Current Weather Endpoint",
    description = "Returns normalized current conditions for a city (?city=London) or coordinates (?lat=51.5&lon=-0.12). When every provider is unavailable the response is synthesized and flagged with is_fallback.",
    tags("Weather")
)]
pub async fn weather(
    req: HttpRequest,
    query: web::Query<WeatherQuery>,
) -> Result<web::Json<WeatherSnapshot>, Error> {
    let service = weather_service(&req)?;
    let location = query
        .location()
        .map_err(|e| error_response(&WeatherError::from(e)))?;

    service
        .get_current_weather(&location)
        .await
        .map(web::Json)
        .map_err(|e| error_response(&e))
}

/// Daily forecast endpoint
#[api_v2_operation(
    summary = "Forecast Endpoint",
    description = "Returns a daily forecast of 1 to 7 days (default 5) for a city or coordinates.",
    tags("Weather")
)]
pub async fn forecast(
    req: HttpRequest,
    query: web::Query<ForecastQuery>,
) -> Result<web::Json<ForecastSnapshot>, Error> {
    let service = weather_service(&req)?;
    let location = query
        .location()
        .map_err(|e| error_response(&WeatherError::from(e)))?;

    service
        .get_forecast(&location, query.days)
        .await
        .map(web::Json)
        .map_err(|e| error_response(&e))
}

/// Historical weather endpoint
#[api_v2_operation(
    summary = "Historical Weather Endpoint",
    description = "Returns daily conditions for the 1 to 7 full days (default 3) before today for a city.",
    tags("Weather")
)]
pub async fn history(
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> Result<web::Json<ForecastSnapshot>, Error> {
    let service = weather_service(&req)?;

    service
        .get_historical_weather(&query.city, query.days.unwrap_or(DEFAULT_HISTORY_DAYS))
        .await
        .map(web::Json)
        .map_err(|e| error_response(&e))
}

/// City search endpoint
#[api_v2_operation(
    summary = "City Search Endpoint",
    description = "Returns up to five place-name suggestions for search-as-you-type. The query is limited to 50 characters.",
    tags("Weather")
)]
pub async fn search_cities(
    req: HttpRequest,
    query: web::Query<CitySearchQuery>,
) -> Result<web::Json<Vec<CityMatch>>, Error> {
    let service = weather_service(&req)?;

    service
        .search_cities(&query.q)
        .await
        .map(web::Json)
        .map_err(|e| error_response(&e))
}

/// Multi-city weather endpoint
///
/// Always answers 200 unless the list itself is empty; each entry carries
/// either weather or the reason its lookup failed.
#[api_v2_operation(
    summary = "Multi-City Weather Endpoint",
    description = "Returns current conditions for a comma separated list of cities (?cities=London,Paris). Each entry succeeds or fails independently.",
    tags("Weather")
)]
pub async fn weather_batch(
    req: HttpRequest,
    query: web::Query<BatchWeatherQuery>,
) -> Result<web::Json<Vec<CityWeatherResult>>, Error> {
    let service = weather_service(&req)?;
    let locations = query.locations();
    if locations.is_empty() {
        return Err(error_response(&WeatherError::from(
            ValidationError::EmptyInput,
        )));
    }

    let results = service.get_weather_for_cities(&locations).await;
    let body = locations
        .iter()
        .zip(results)
        .map(|(location, result)| match result {
            Ok(snapshot) => CityWeatherResult {
                query: describe(location),
                weather: Some(snapshot),
                error: None,
            },
            Err(error) => CityWeatherResult {
                query: describe(location),
                weather: None,
                error: Some(error.user_message().to_string()),
            },
        })
        .collect();

    Ok(web::Json(body))
}

/// Current conditions plus forecast endpoint
#[api_v2_operation(
    summary = "Weather Overview Endpoint",
    description = "Returns current conditions and a five day forecast fetched concurrently. The forecast is null when it could not be retrieved.",
    tags("Weather")
)]
pub async fn overview(
    req: HttpRequest,
    query: web::Query<WeatherQuery>,
) -> Result<web::Json<WeatherOverview>, Error> {
    let service = weather_service(&req)?;
    let location = query
        .location()
        .map_err(|e| error_response(&WeatherError::from(e)))?;

    service
        .get_overview(&location)
        .await
        .map(web::Json)
        .map_err(|e| error_response(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                WeatherError::Validation(ValidationError::EmptyInput),
                StatusCode::BAD_REQUEST,
            ),
            (WeatherError::NotFound, StatusCode::NOT_FOUND),
            (WeatherError::Timeout { attempts: 1 }, StatusCode::SERVICE_UNAVAILABLE),
            (
                WeatherError::Upstream {
                    status: Some(500),
                    attempts: 3,
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (error, expected) in cases {
            let response = error_response(&error).error_response();
            assert_eq!(response.status(), expected, "{error:?}");
        }
    }

    #[test]
    fn test_describe_location() {
        assert_eq!(describe(&LocationInput::name("Oslo")), "Oslo");
        assert_eq!(describe(&LocationInput::coordinates(1.5, -2.25)), "1.5,-2.25");
    }
}
