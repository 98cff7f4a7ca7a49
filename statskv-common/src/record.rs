//! The stats record kept in the store and the update that refreshes it

use crate::schema::{self, ValidationIssues};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store key holding the serialized [`StatsRecord`]
pub const STATS_KEY: &str = "STATS";

/// `Sun, 11 Sep 2022 10:19:53 GMT`
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Body of a write request, built only through [`InboundUpdate::from_json`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundUpdate {
    pub total_guilds: i64,
    pub total_channels: i64,
    pub total_members: i64,
    pub increment_total_stats_sent: Option<bool>,
}

impl InboundUpdate {
    /// Check a parsed JSON value against the update schema
    pub fn from_json(value: &Value) -> Result<Self, ValidationIssues> {
        schema::inbound_update(value)
    }

    /// Parse and check a raw request body.
    ///
    /// A body that is not JSON at all is checked as `{}`, so the caller gets
    /// the usual per-field `Required` issues instead of a parse error.
    pub fn from_body(body: &[u8]) -> Result<Self, ValidationIssues> {
        let value = serde_json::from_slice(body).unwrap_or_else(|_| Value::Object(Map::new()));
        Self::from_json(&value)
    }
}

/// When the record was last written, in three representations of the same instant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdated {
    /// HTTP-date in UTC
    pub date: String,
    pub timestamp_milliseconds: i64,
    /// Always `floor(timestamp_milliseconds / 1000)`
    pub timestamp_seconds: i64,
}

impl LastUpdated {
    pub fn at(instant: DateTime<Utc>) -> Self {
        let millis = instant.timestamp_millis();
        Self {
            date: instant.format(HTTP_DATE_FORMAT).to_string(),
            timestamp_milliseconds: millis,
            timestamp_seconds: millis.div_euclid(1000),
        }
    }
}

/// The singleton counters record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    pub total_guilds: i64,
    pub total_channels: i64,
    pub total_members: i64,
    /// Only ever incremented
    pub total_stats_sent: i64,
    pub last_updated: LastUpdated,
    /// Stored fields outside the schema, written back untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StatsRecord {
    /// Field names covered by the schema
    pub const FIELDS: [&'static str; 5] = [
        "totalGuilds",
        "totalChannels",
        "totalMembers",
        "totalStatsSent",
        "lastUpdated",
    ];

    /// A record with every counter at zero
    pub fn zeroed(instant: DateTime<Utc>) -> Self {
        Self {
            total_guilds: 0,
            total_channels: 0,
            total_members: 0,
            total_stats_sent: 0,
            last_updated: LastUpdated::at(instant),
            extra: Map::new(),
        }
    }

    /// Check a parsed JSON value against the record schema
    pub fn from_json(value: &Value) -> Result<Self, ValidationIssues> {
        schema::stats_record(value)
    }

    /// Merge an update into the record.
    ///
    /// The three totals are replaced, not added. `totalStatsSent` moves by
    /// one only when the update asks for it, and `lastUpdated` is always
    /// restamped with `instant`.
    pub fn apply(&mut self, update: &InboundUpdate, instant: DateTime<Utc>) {
        self.total_guilds = update.total_guilds;
        self.total_channels = update.total_channels;
        self.total_members = update.total_members;

        if update.increment_total_stats_sent == Some(true) {
            self.total_stats_sent = self.total_stats_sent.saturating_add(1);
        }

        self.last_updated = LastUpdated::at(instant);
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample() -> StatsRecord {
        StatsRecord::from_json(&json!({
            "totalGuilds": 2,
            "totalChannels": 111,
            "totalMembers": 129179,
            "totalStatsSent": 3,
            "lastUpdated": {
                "date": "Sun, 11 Sep 2022 10:19:53 GMT",
                "timestampMilliseconds": 1662891593340i64,
                "timestampSeconds": 1662891593
            }
        }))
        .unwrap()
    }

    fn update(increment: Option<bool>) -> InboundUpdate {
        InboundUpdate {
            total_guilds: 3,
            total_channels: 120,
            total_members: 130000,
            increment_total_stats_sent: increment,
        }
    }

    #[test]
    fn test_last_updated_representations_agree() {
        let instant = Utc.timestamp_millis_opt(1662891593340).unwrap();
        let stamp = LastUpdated::at(instant);
        assert_eq!(stamp.date, "Sun, 11 Sep 2022 10:19:53 GMT");
        assert_eq!(stamp.timestamp_milliseconds, 1662891593340);
        assert_eq!(stamp.timestamp_seconds, 1662891593);
    }

    #[test]
    fn test_date_pads_single_digit_day() {
        let instant = Utc.with_ymd_and_hms(2022, 9, 4, 7, 5, 9).unwrap();
        assert_eq!(LastUpdated::at(instant).date, "Sun, 04 Sep 2022 07:05:09 GMT");
    }

    #[test]
    fn test_seconds_floor_before_epoch() {
        let instant = Utc.timestamp_millis_opt(-1).unwrap();
        let stamp = LastUpdated::at(instant);
        assert_eq!(stamp.timestamp_seconds, -1);
    }

    #[test]
    fn test_apply_replaces_totals_and_increments() {
        let mut record = sample();
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        record.apply(&update(Some(true)), instant);

        assert_eq!(record.total_guilds, 3);
        assert_eq!(record.total_channels, 120);
        assert_eq!(record.total_members, 130000);
        assert_eq!(record.total_stats_sent, 4);
        assert_eq!(record.last_updated, LastUpdated::at(instant));
    }

    #[test]
    fn test_apply_without_increment_keeps_stats_sent() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let mut record = sample();
        record.apply(&update(None), instant);
        assert_eq!(record.total_stats_sent, 3);

        let mut record = sample();
        record.apply(&update(Some(false)), instant);
        assert_eq!(record.total_stats_sent, 3);
    }

    #[test]
    fn test_serialized_shape() {
        let mut record = StatsRecord::zeroed(Utc.timestamp_millis_opt(1_000).unwrap());
        record.extra.insert("owner".to_string(), json!("bot"));

        let value: Value = serde_json::from_str(&record.to_json_string().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "totalGuilds": 0,
                "totalChannels": 0,
                "totalMembers": 0,
                "totalStatsSent": 0,
                "lastUpdated": {
                    "date": "Thu, 01 Jan 1970 00:00:01 GMT",
                    "timestampMilliseconds": 1000,
                    "timestampSeconds": 1
                },
                "owner": "bot"
            })
        );
    }

    #[test]
    fn test_from_body_treats_garbage_as_empty_object() {
        let issues = InboundUpdate::from_body(b"not json").unwrap_err();
        assert_eq!(issues.len(), 3);
        assert_eq!(issues.messages_at(&["totalGuilds"]), vec!["Required"]);
    }

    #[test]
    fn test_from_body_valid() {
        let parsed = InboundUpdate::from_body(
            br#"{"totalGuilds":3,"totalChannels":120,"totalMembers":130000}"#,
        )
        .unwrap();
        assert_eq!(parsed, update(None));
    }
}
