use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{PlannerError, PlannerResult};

use super::record_values;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Surrogate identifier of an event, unique within the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A scheduled social event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Stable identifier.
    pub id: EventId,
    /// Headline shown on the card.
    pub title: String,
    /// Calendar day of the event.
    pub date: NaiveDate,
    /// Optional start time; events without one start at midnight.
    #[serde(default, with = "clock", skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    /// Where it happens.
    #[serde(default)]
    pub location: String,
    /// What is planned.
    #[serde(default)]
    pub activity: String,
    /// Free-text list of who is coming.
    #[serde(default)]
    pub people: String,
}

impl Event {
    /// Build an event from a draft and an already allocated id.
    pub fn from_draft(id: EventId, draft: EventDraft) -> Self {
        Self {
            id,
            title: draft.title,
            date: draft.date,
            time: draft.time,
            location: draft.location,
            activity: draft.activity,
            people: draft.people,
        }
    }

    /// Replace every field except the id.
    pub fn apply(&mut self, draft: EventDraft) {
        let id = self.id;
        *self = Self::from_draft(id, draft);
    }

    /// Moment the event starts, treating a missing time as `00:00`.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or_default())
    }

    /// Names from the comma separated `people` field.
    pub fn attendees(&self) -> Vec<&str> {
        self.people
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Copy the editable fields back out, e.g. to prefill an edit form.
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            date: self.date,
            time: self.time,
            location: self.location.clone(),
            activity: self.activity.clone(),
            people: self.people.clone(),
        }
    }
}

/// Every editable field of an event; the payload of add and edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Headline shown on the card.
    pub title: String,
    /// Calendar day of the event.
    pub date: NaiveDate,
    /// Optional start time.
    pub time: Option<NaiveTime>,
    /// Where it happens.
    pub location: String,
    /// What is planned.
    pub activity: String,
    /// Free-text list of who is coming.
    pub people: String,
}

impl EventDraft {
    /// Parse raw form input. The title must not be blank; an empty `time`
    /// means "no time".
    pub fn parse(
        title: &str,
        date: &str,
        time: &str,
        location: &str,
        activity: &str,
        people: &str,
    ) -> PlannerResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(PlannerError::Blank("title"));
        }
        let date = parse_date(date).ok_or_else(|| PlannerError::InvalidField {
            field: "date",
            value: date.to_string(),
        })?;
        let time = if time.trim().is_empty() {
            None
        } else {
            Some(parse_time(time).ok_or_else(|| PlannerError::InvalidField {
                field: "time",
                value: time.to_string(),
            })?)
        };
        Ok(Self {
            title: title.to_string(),
            date,
            time,
            location: location.trim().to_string(),
            activity: activity.trim().to_string(),
            people: people.trim().to_string(),
        })
    }
}

/// Sort by start moment, keeping the stored order for ties.
pub fn sort_chronologically(events: &mut [Event]) {
    events.sort_by_key(Event::starts_at);
}

/// Lenient on-disk shape: older pages stored events without ids and with
/// empty strings for missing times.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawEvent {
    id: Option<u64>,
    title: String,
    date: String,
    time: Option<String>,
    location: String,
    activity: String,
    people: String,
}

/// A stored `events` collection, decoded for use and re-encoded on save.
///
/// Entries that cannot be decoded at all are kept in `retained` and written
/// back untouched after the decoded events. Events whose stored time could
/// not be read are shown without a time, and are written back exactly as
/// stored (plus their id) until they are edited.
#[derive(Debug, Clone, Default)]
pub struct StoredEvents {
    /// Decoded events in collection order.
    pub events: Vec<Event>,
    verbatim: Vec<(Event, Value)>,
    retained: Vec<Value>,
}

impl StoredEvents {
    /// Decode a raw collection.
    ///
    /// Records missing an id (or repeating one already seen) get
    /// `max(existing ids, 0) + 1` in collection order.
    pub fn decode(raw: &Value) -> Self {
        let mut parsed = Vec::new();
        let mut retained = Vec::new();
        for (position, value) in record_values(raw).into_iter().enumerate() {
            let record: RawEvent = match serde_json::from_value(value.clone()) {
                Ok(record) => record,
                Err(err) => {
                    warn!(position, %err, "Keeping unreadable event record as stored");
                    retained.push(value.clone());
                    continue;
                }
            };
            let Some(date) = parse_date(&record.date) else {
                warn!(position, date = %record.date, "Keeping event with invalid date as stored");
                retained.push(value.clone());
                continue;
            };
            let (time, lossy) = match record.time.as_deref().map(str::trim) {
                None | Some("") => (None, false),
                Some(raw_time) => match parse_time(raw_time) {
                    Some(time) => (Some(time), false),
                    None => {
                        warn!(position, time = raw_time, "Showing event without its invalid time");
                        (None, true)
                    }
                },
            };
            let draft = EventDraft {
                title: record.title,
                date,
                time,
                location: record.location,
                activity: record.activity,
                people: record.people,
            };
            parsed.push((record.id, draft, lossy.then(|| value.clone())));
        }

        let mut next_id = parsed
            .iter()
            .filter_map(|(id, _, _)| *id)
            .chain(retained.iter().filter_map(stored_id))
            .max()
            .unwrap_or(0)
            + 1;
        let mut seen = HashSet::new();
        let mut events = Vec::with_capacity(parsed.len());
        let mut verbatim = Vec::new();
        for (id, draft, original) in parsed {
            let id = match id {
                Some(id) if seen.insert(id) => id,
                _ => {
                    let fresh = next_id;
                    next_id += 1;
                    seen.insert(fresh);
                    fresh
                }
            };
            let event = Event::from_draft(EventId(id), draft);
            if let Some(original) = original {
                verbatim.push((event.clone(), original));
            }
            events.push(event);
        }

        Self {
            events,
            verbatim,
            retained,
        }
    }

    /// Id for a new event: one past every id in the collection, including
    /// the ids of entries kept as stored.
    pub fn next_id(&self) -> EventId {
        let max = self
            .events
            .iter()
            .map(|event| event.id.0)
            .chain(self.retained.iter().filter_map(stored_id))
            .max()
            .unwrap_or(0);
        EventId(max + 1)
    }

    /// Number of stored entries that could not be decoded.
    pub fn retained_len(&self) -> usize {
        self.retained.len()
    }

    /// Encode the whole collection for writing.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        let mut records = Vec::with_capacity(self.events.len() + self.retained.len());
        for event in &self.events {
            let record = match self.verbatim.iter().find(|(decoded, _)| decoded == event) {
                Some((_, original)) => with_id(original.clone(), event.id),
                None => serde_json::to_value(event)?,
            };
            records.push(record);
        }
        records.extend(self.retained.iter().cloned());
        Ok(Value::Array(records))
    }
}

/// Convert a raw `events` collection into typed events, leaving out entries
/// that cannot be decoded.
pub fn normalize_events(raw: &Value) -> Vec<Event> {
    StoredEvents::decode(raw).events
}

fn stored_id(value: &Value) -> Option<u64> {
    value.get("id").and_then(Value::as_u64)
}

fn with_id(mut record: Value, id: EventId) -> Value {
    if let Value::Object(map) = &mut record {
        map.insert("id".to_string(), Value::from(id.0));
    }
    record
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// `HH:MM` encoding for optional times.
mod clock {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_str(&time.format(super::TIME_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => super::parse_time(value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid time {value:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft(title: &str, date: &str, time: &str) -> EventDraft {
        EventDraft::parse(title, date, time, "Somewhere", "Something", "A, B").unwrap()
    }

    #[test]
    fn missing_time_starts_at_midnight() {
        let event = Event::from_draft(EventId(1), draft("Picnic", "2026-03-01", ""));
        assert_eq!(event.time, None);
        assert_eq!(
            event.starts_at(),
            NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn draft_rejects_bad_dates_and_times() {
        let err = EventDraft::parse("x", "31/01/2026", "", "", "", "").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidField { field: "date", .. }));

        let err = EventDraft::parse("x", "2026-01-31", "2pm", "", "", "").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidField { field: "time", .. }));

        let err = EventDraft::parse("   ", "2026-01-31", "", "", "", "").unwrap_err();
        assert!(matches!(err, PlannerError::Blank("title")));
    }

    #[test]
    fn serialises_time_as_hours_and_minutes() {
        let event = Event::from_draft(EventId(7), draft("Movie", "2026-01-31", "14:00"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["id"], json!(7));
        assert_eq!(value["date"], json!("2026-01-31"));
        assert_eq!(value["time"], json!("14:00"));

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn assigns_ids_to_legacy_records() {
        let raw = json!([
            {
                "title": "First", "date": "2026-01-31", "time": "14:00",
                "location": "", "activity": "", "people": ""
            },
            {"id": 4, "title": "Second", "date": "2026-02-01", "time": ""},
            {"title": "Third", "date": "2026-02-02"},
            {"id": 4, "title": "Clash", "date": "2026-02-03"}
        ]);

        let events = normalize_events(&raw);
        let ids: Vec<u64> = events.iter().map(|event| event.id.0).collect();
        assert_eq!(ids, vec![5, 4, 6, 7]);
        assert_eq!(events[1].time, None);
        assert_eq!(events[0].time, NaiveTime::from_hms_opt(14, 0, 0));
    }

    #[test]
    fn skips_records_with_unreadable_dates() {
        let raw = json!({
            "-a": {"title": "Good", "date": "2026-05-05"},
            "-b": {"title": "Bad", "date": ""},
            "-c": "not an event"
        });
        let events = normalize_events(&raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Good");
    }

    #[test]
    fn undecodable_entries_survive_re_encoding() -> serde_json::Result<()> {
        let tbd = json!({
            "id": 7, "title": "TBD hangout", "date": "", "time": "",
            "location": "", "activity": "", "people": ""
        });
        let picnic = json!({
            "title": "Picnic", "date": "2026-05-01", "time": "2pm",
            "location": "Park", "activity": "", "people": ""
        });
        let raw = json!([tbd.clone(), picnic.clone()]);

        let stored = StoredEvents::decode(&raw);
        assert_eq!(stored.events.len(), 1);
        assert_eq!(stored.events[0].time, None);
        assert_eq!(stored.events[0].id, EventId(8));
        assert_eq!(stored.retained_len(), 1);
        assert_eq!(stored.next_id(), EventId(9));

        let mut expected_picnic = picnic;
        expected_picnic["id"] = json!(8);
        assert_eq!(stored.to_value()?, json!([expected_picnic, tbd]));
        Ok(())
    }

    #[test]
    fn edited_events_drop_their_stored_form() -> serde_json::Result<()> {
        let raw = json!([{"id": 1, "title": "Picnic", "date": "2026-05-01", "time": "2pm"}]);
        let mut stored = StoredEvents::decode(&raw);
        stored.events[0].apply(draft("Picnic", "2026-05-01", "14:00"));

        let encoded = stored.to_value()?;
        assert_eq!(encoded[0]["time"], json!("14:00"));
        assert_eq!(encoded[0]["location"], json!("Somewhere"));
        Ok(())
    }

    #[test]
    fn sort_is_stable_for_equal_start_times() {
        let mut events = vec![
            Event::from_draft(EventId(1), draft("Late", "2026-01-31", "19:00")),
            Event::from_draft(EventId(2), draft("Tie A", "2026-01-31", "14:00")),
            Event::from_draft(EventId(3), draft("Tie B", "2026-01-31", "14:00")),
            Event::from_draft(EventId(4), draft("Morning", "2026-01-31", "")),
        ];
        sort_chronologically(&mut events);
        let titles: Vec<&str> = events.iter().map(|event| event.title.as_str()).collect();
        assert_eq!(titles, vec!["Morning", "Tie A", "Tie B", "Late"]);
    }

    #[test]
    fn attendees_split_on_commas() {
        let mut event = Event::from_draft(EventId(1), draft("x", "2026-01-31", ""));
        event.people = "Nimeesha, Tanish,, Olwethu ".to_string();
        assert_eq!(event.attendees(), vec!["Nimeesha", "Tanish", "Olwethu"]);
    }
}
