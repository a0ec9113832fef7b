use std::convert::Infallible;
use std::time::Duration as StdDuration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::{Stream, StreamExt};
use meter_client::domain::MeterReading;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;

use crate::auth::Session;
use crate::routes::params::count_request;
use crate::state::AppState;

/// Readings per pushed message.
const READINGS_PER_TICK: i64 = 10;

#[derive(Debug, Serialize)]
pub struct ReadingsMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Vec<MeterReading>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Readings newer than the stream window, newest first. `None` when the
/// store failed; the tick is skipped.
pub async fn recent_readings_message(state: &AppState) -> Option<ReadingsMessage> {
    let now = state.now();
    let since = now - Duration::seconds(state.config.stream.window_seconds);

    match state.readings.recent_readings(since, READINGS_PER_TICK).await {
        Ok(data) => Some(ReadingsMessage {
            kind: "meter_reading",
            data,
            timestamp: now,
        }),
        Err(e) => {
            tracing::error!(error = %e, "live reading query failed");
            None
        }
    }
}

fn to_event(message: &ReadingsMessage) -> Option<Event> {
    match Event::default().json_data(message) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode live reading event");
            None
        }
    }
}

async fn readings_stream(
    State(state): State<AppState>,
    _session: Session,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    count_request("stream_readings");

    let mut interval =
        tokio::time::interval(StdDuration::from_secs(state.config.stream.interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let events = IntervalStream::new(interval)
        .then(move |_| {
            let state = state.clone();
            async move { recent_readings_message(&state).await }
        })
        .filter_map(|message| async move { message.as_ref().and_then(to_event) })
        .map(Ok);

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stream/readings", get(readings_stream))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, NOW};

    #[tokio::test]
    async fn message_holds_readings_inside_the_window() {
        let state = test_state();
        let message = recent_readings_message(&state).await.unwrap();

        assert_eq!(message.timestamp, NOW);
        assert_eq!(message.data.len(), 1);
        assert_eq!(message.data[0].meter_id, "MTR-002");

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "meter_reading");
        assert_eq!(json["timestamp"], "2024-03-15T12:00:00Z");
    }

    #[test]
    fn messages_encode_as_events() {
        let message = ReadingsMessage {
            kind: "meter_reading",
            data: Vec::new(),
            timestamp: NOW,
        };
        assert!(to_event(&message).is_some());
    }
}
