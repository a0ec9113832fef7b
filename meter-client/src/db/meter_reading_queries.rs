use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{
    DailyPower, HourlyProfile, HourlyTrend, MeterInfo, MeterReading, Period, PeriodConsumption,
    ReadingStats, TimeRange,
};

const READING_COLUMNS: &str = r#"
    id, meter_id, ts,
    v1, v2, v3,
    i1, i2, i3,
    pf1, pf2, pf3,
    kva1, kva2, kva3, kvat,
    kw1, kw2, kw3, kwt,
    kvar1, kvar2, kvar3, kvart,
    kvah, kwh, kvarh
"#;

/// One row per distinct meter id with its newest timestamp and row count.
pub async fn list_meters(pool: &PgPool) -> Result<Vec<MeterInfo>> {
    let rows = sqlx::query_as::<_, MeterInfo>(
        r#"
        SELECT
            meter_id,
            MAX(ts)  AS last_reading,
            COUNT(*) AS reading_count
        FROM meter_readings
        GROUP BY meter_id
        ORDER BY meter_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The newest reading of every meter, sorted by meter id.
///
/// Ties on the max timestamp resolve to whichever row Postgres meets first.
pub async fn latest_readings(pool: &PgPool) -> Result<Vec<MeterReading>> {
    let sql = format!(
        r#"
        SELECT DISTINCT ON (meter_id) {READING_COLUMNS}
        FROM meter_readings
        ORDER BY meter_id, ts DESC
        "#
    );

    let rows = sqlx::query_as::<_, MeterReading>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn latest_for_meter(pool: &PgPool, meter_id: &str) -> Result<Option<MeterReading>> {
    let sql = format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM meter_readings
        WHERE meter_id = $1
        ORDER BY ts DESC
        LIMIT 1
        "#
    );

    let row = sqlx::query_as::<_, MeterReading>(&sql)
        .bind(meter_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Readings for one meter, newest first.
pub async fn readings_for_meter(
    pool: &PgPool,
    meter_id: &str,
    limit: i64,
    range: TimeRange,
) -> Result<Vec<MeterReading>> {
    let sql = format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM meter_readings
        WHERE meter_id = $1
          AND ($2::timestamptz IS NULL OR ts >= $2)
          AND ($3::timestamptz IS NULL OR ts <= $3)
        ORDER BY ts DESC
        LIMIT $4
        "#
    );

    let rows = sqlx::query_as::<_, MeterReading>(&sql)
        .bind(meter_id)
        .bind(range.start)
        .bind(range.end)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Daily power/energy averages (UTC days) for one meter, oldest day first.
pub async fn daily_power(
    pool: &PgPool,
    meter_id: &str,
    since: OffsetDateTime,
) -> Result<Vec<DailyPower>> {
    let rows = sqlx::query_as::<_, DailyPower>(
        r#"
        SELECT
            (ts AT TIME ZONE 'UTC')::date AS day,
            AVG(kwt)                      AS avg_power,
            MAX(kwt)                      AS peak_power,
            AVG(kwh)                      AS avg_energy,
            COUNT(*)                      AS reading_count
        FROM meter_readings
        WHERE meter_id = $1
          AND ts >= $2
        GROUP BY 1
        ORDER BY 1
        "#,
    )
    .bind(meter_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Summary statistics over a window. Missing phase values count as 0 in the
/// three-phase means.
pub async fn reading_stats(
    pool: &PgPool,
    meter_id: &str,
    range: TimeRange,
) -> Result<ReadingStats> {
    let row = sqlx::query_as::<_, ReadingStats>(
        r#"
        SELECT
            COUNT(*)                                                         AS total_readings,
            AVG(kwt)                                                         AS avg_power,
            MAX(kwt)                                                         AS peak_power,
            MIN(kwt)                                                         AS min_power,
            AVG(kwh)                                                         AS avg_energy,
            MAX(kwh)                                                         AS max_energy,
            AVG((COALESCE(pf1, 0) + COALESCE(pf2, 0) + COALESCE(pf3, 0)) / 3) AS avg_power_factor,
            MIN((COALESCE(pf1, 0) + COALESCE(pf2, 0) + COALESCE(pf3, 0)) / 3) AS min_power_factor,
            AVG((COALESCE(v1, 0) + COALESCE(v2, 0) + COALESCE(v3, 0)) / 3)    AS avg_voltage,
            MIN(ts)                                                          AS first_reading,
            MAX(ts)                                                          AS last_reading
        FROM meter_readings
        WHERE meter_id = $1
          AND ($2::timestamptz IS NULL OR ts >= $2)
          AND ($3::timestamptz IS NULL OR ts <= $3)
        "#,
    )
    .bind(meter_id)
    .bind(range.start)
    .bind(range.end)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Consumption buckets for one meter, newest bucket first.
pub async fn consumption(
    pool: &PgPool,
    meter_id: &str,
    period: Period,
    limit: i64,
) -> Result<Vec<PeriodConsumption>> {
    let rows = sqlx::query_as::<_, PeriodConsumption>(
        r#"
        SELECT
            date_trunc($2, ts AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'          AS period_start,
            AVG(kwt)                                                         AS avg_power,
            MAX(kwt)                                                         AS peak_power,
            MIN(kwt)                                                         AS min_power,
            AVG(kwh)                                                         AS avg_energy,
            MAX(kwh)                                                         AS max_energy,
            AVG((COALESCE(pf1, 0) + COALESCE(pf2, 0) + COALESCE(pf3, 0)) / 3) AS avg_power_factor,
            AVG((COALESCE(v1, 0) + COALESCE(v2, 0) + COALESCE(v3, 0)) / 3)    AS avg_voltage,
            COUNT(*)                                                         AS reading_count
        FROM meter_readings
        WHERE meter_id = $1
        GROUP BY 1
        ORDER BY 1 DESC
        LIMIT $3
        "#,
    )
    .bind(meter_id)
    .bind(period.date_trunc_unit())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Hourly buckets for one meter, newest hour first.
pub async fn hourly_profile(
    pool: &PgPool,
    meter_id: &str,
    limit: i64,
) -> Result<Vec<HourlyProfile>> {
    let rows = sqlx::query_as::<_, HourlyProfile>(
        r#"
        SELECT
            date_trunc('hour', ts AT TIME ZONE 'UTC') AT TIME ZONE 'UTC'      AS hour,
            AVG(kwt)                                                         AS avg_power,
            AVG(kwh)                                                         AS avg_energy,
            AVG((COALESCE(pf1, 0) + COALESCE(pf2, 0) + COALESCE(pf3, 0)) / 3) AS avg_power_factor,
            COUNT(*)                                                         AS reading_count
        FROM meter_readings
        WHERE meter_id = $1
        GROUP BY 1
        ORDER BY 1 DESC
        LIMIT $2
        "#,
    )
    .bind(meter_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The most recent `limit` hourly buckets across all meters, oldest first.
pub async fn hourly_trend(pool: &PgPool, limit: i64) -> Result<Vec<HourlyTrend>> {
    let rows = sqlx::query_as::<_, HourlyTrend>(
        r#"
        SELECT hour, avg_power, total_energy, reading_count
        FROM (
            SELECT
                date_trunc('hour', ts AT TIME ZONE 'UTC') AT TIME ZONE 'UTC' AS hour,
                AVG(kwt)                                                    AS avg_power,
                SUM(kwh)                                                    AS total_energy,
                COUNT(*)                                                    AS reading_count
            FROM meter_readings
            GROUP BY 1
            ORDER BY 1 DESC
            LIMIT $1
        ) recent
        ORDER BY hour
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Readings of any meter newer than `since`, newest first.
pub async fn recent_readings(
    pool: &PgPool,
    since: OffsetDateTime,
    limit: i64,
) -> Result<Vec<MeterReading>> {
    let sql = format!(
        r#"
        SELECT {READING_COLUMNS}
        FROM meter_readings
        WHERE ts >= $1
        ORDER BY ts DESC
        LIMIT $2
        "#
    );

    let rows = sqlx::query_as::<_, MeterReading>(&sql)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}
