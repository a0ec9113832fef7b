use std::collections::BTreeMap;

use meter_client::domain::MeterReading;

/// Keep only the newest reading of each meter, sorted by meter id.
///
/// When a meter has several rows at its max timestamp the first one seen wins.
pub fn latest_per_meter<'a, I>(readings: I) -> Vec<MeterReading>
where
    I: IntoIterator<Item = &'a MeterReading>,
{
    let mut newest: BTreeMap<&str, &MeterReading> = BTreeMap::new();

    for reading in readings {
        newest
            .entry(reading.meter_id.as_str())
            .and_modify(|current| {
                if reading.ts > current.ts {
                    *current = reading;
                }
            })
            .or_insert(reading);
    }

    newest.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn reading(meter: &str, ts: time::OffsetDateTime, kwt: f64) -> MeterReading {
        let mut r = MeterReading::empty(meter, ts);
        r.kwt = Some(kwt);
        r
    }

    #[test]
    fn returns_one_newest_row_per_meter() {
        let rows = vec![
            reading("MTR-002", datetime!(2024-01-01 10:00:00 UTC), 1.0),
            reading("MTR-001", datetime!(2024-01-01 09:00:00 UTC), 2.0),
            reading("MTR-002", datetime!(2024-01-01 12:00:00 UTC), 3.0),
            reading("MTR-001", datetime!(2024-01-01 11:00:00 UTC), 4.0),
            reading("MTR-002", datetime!(2024-01-01 11:00:00 UTC), 5.0),
        ];

        let latest = latest_per_meter(&rows);

        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].meter_id, "MTR-001");
        assert_eq!(latest[0].kwt, Some(4.0));
        assert_eq!(latest[1].meter_id, "MTR-002");
        assert_eq!(latest[1].kwt, Some(3.0));

        for l in &latest {
            assert!(rows
                .iter()
                .filter(|r| r.meter_id == l.meter_id)
                .all(|r| r.ts <= l.ts));
        }
    }

    #[test]
    fn empty_input_is_an_empty_set() {
        let rows: Vec<MeterReading> = Vec::new();
        assert!(latest_per_meter(&rows).is_empty());
    }
}
