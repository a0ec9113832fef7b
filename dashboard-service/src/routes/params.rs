use std::fmt::Display;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::Json;
use meter_client::domain::TimeRange;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, Time};

use crate::error::{ApiError, ApiResult};

/// Unwrap a query extraction, turning axum's plain-text rejection into a JSON
/// 400.
pub fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    extracted
        .map(|Query(q)| q)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// Same for request bodies: malformed or mistyped JSON becomes a JSON 400.
pub fn json<T>(extracted: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    extracted
        .map(|Json(body)| body)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

pub fn required_meter_id(meter_id: Option<String>) -> ApiResult<String> {
    meter_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("meterId is required"))
}

/// `value` or `default`, rejected when outside `min..=max`.
pub fn in_range<T>(name: &str, value: Option<T>, default: T, min: T, max: T) -> ApiResult<T>
where
    T: PartialOrd + Display + Copy,
{
    let value = value.unwrap_or(default);
    if value < min || value > max {
        return Err(ApiError::bad_request(format!(
            "{name} must be between {min} and {max}"
        )));
    }
    Ok(value)
}

/// RFC3339 timestamp or a bare `YYYY-MM-DD`. A bare date means the start of
/// that UTC day, or its last instant when `end_of_day` is set.
pub fn parse_timestamp(raw: &str, end_of_day: bool) -> ApiResult<OffsetDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(ts);
    }

    let date = Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ApiError::bad_request(format!("invalid date '{raw}'")))?;
    let start = date.with_time(Time::MIDNIGHT).assume_utc();
    if !end_of_day {
        return Ok(start);
    }
    Ok(start + Duration::days(1) - Duration::nanoseconds(1))
}

/// The range applies only when both bounds are given.
pub fn date_range(start: Option<&str>, end: Option<&str>) -> ApiResult<TimeRange> {
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(TimeRange::unbounded());
    };

    let start = parse_timestamp(start, false)?;
    let end = parse_timestamp(end, true)?;
    if start > end {
        return Err(ApiError::bad_request("startDate must not be after endDate"));
    }
    Ok(TimeRange::between(start, end))
}

pub fn count_request(endpoint: &'static str) {
    metrics::counter!("http_requests_total", "endpoint" => endpoint).increment(1);
}
