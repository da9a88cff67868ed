//! Data models for the flashcard system

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::{CardError, Result};
use crate::kv::{AttrValue, Item, KvError, UpdateAction};

/// Maximum number of tags on a card
pub const MAX_TAGS: usize = 10;
/// Maximum characters per tag; longer tags are truncated
pub const MAX_TAG_LENGTH: usize = 50;
pub const MAX_FRONT_LENGTH: usize = 1000;
pub const MAX_BACK_LENGTH: usize = 2000;
/// Review history keeps only the most recent entries
pub const MAX_HISTORY_ENTRIES: usize = 100;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Spaced repetition state of a card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingState {
    /// Current interval in days
    pub interval: u32,
    /// SM-2 ease factor, never below 1.3
    pub ease_factor: f64,
    /// Consecutive successful reviews
    pub repetitions: u32,
    /// When the card is due; None means never due
    pub next_review_at: Option<DateTime<Utc>>,
}

impl SchedulingState {
    /// State of a card that has never been reviewed, due at `now`
    pub fn new_card(now: DateTime<Utc>) -> Self {
        Self {
            interval: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            repetitions: 0,
            next_review_at: Some(now),
        }
    }

    pub fn phase(&self) -> CardPhase {
        match self.repetitions {
            0 => CardPhase::New,
            1 => CardPhase::Learning,
            _ => CardPhase::Reviewing,
        }
    }
}

/// Where a card sits in the learning process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardPhase {
    New,
    Learning,
    Reviewing,
}

/// One recorded review, embedded in its card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewHistoryEntry {
    pub reviewed_at: DateTime<Utc>,
    pub grade: u8,
    pub ease_factor_before: f64,
    pub ease_factor_after: f64,
    pub interval_before: u32,
    pub interval_after: u32,
}

/// A flashcard owned by a single user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub card_id: String,
    pub user_id: String,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub schedule: SchedulingState,
    #[serde(default)]
    pub review_history: Vec<ReviewHistoryEntry>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Card {
    /// A new card, due immediately
    pub fn new(user_id: &str, front: String, back: String, now: DateTime<Utc>) -> Self {
        Self {
            card_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            front,
            back,
            deck_id: None,
            tags: Vec::new(),
            schedule: SchedulingState::new_card(now),
            review_history: Vec::new(),
            created_at: now,
            updated_at: None,
        }
    }

    /// Append a history entry, evicting the oldest beyond the cap
    pub fn record_review(&mut self, entry: ReviewHistoryEntry) {
        self.review_history.push(entry);
        if self.review_history.len() > MAX_HISTORY_ENTRIES {
            let excess = self.review_history.len() - MAX_HISTORY_ENTRIES;
            self.review_history.drain(..excess);
        }
    }

    /// Calendar date the card is due on
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.schedule.next_review_at.map(|t| t.date_naive())
    }

    /// Serialize to a store item
    pub fn to_item(&self) -> Item {
        let mut item = Item::new();
        item.insert(attr::USER_ID.into(), AttrValue::string(&self.user_id));
        item.insert(attr::CARD_ID.into(), AttrValue::string(&self.card_id));
        item.insert(attr::FRONT.into(), AttrValue::string(&self.front));
        item.insert(attr::BACK.into(), AttrValue::string(&self.back));
        item.insert(attr::TAGS.into(), tags_value(&self.tags));
        item.insert(attr::INTERVAL.into(), AttrValue::number(self.schedule.interval.into()));
        item.insert(attr::EASE_FACTOR.into(), ease_value(self.schedule.ease_factor));
        item.insert(attr::REPETITIONS.into(), AttrValue::number(self.schedule.repetitions.into()));
        item.insert(attr::REVIEW_HISTORY.into(), history_value(&self.review_history));
        item.insert(attr::CREATED_AT.into(), timestamp_value(self.created_at));
        if let Some(deck_id) = &self.deck_id {
            item.insert(attr::DECK_ID.into(), AttrValue::string(deck_id));
        }
        if let Some(next) = self.schedule.next_review_at {
            item.insert(attr::NEXT_REVIEW_AT.into(), timestamp_value(next));
        }
        if let Some(updated) = self.updated_at {
            item.insert(attr::UPDATED_AT.into(), timestamp_value(updated));
        }
        item
    }

    /// Parse a store item; missing scheduling attributes take new-card defaults
    pub fn from_item(item: &Item) -> std::result::Result<Self, KvError> {
        let interval = optional_u32(item, attr::INTERVAL)?.unwrap_or(0);
        let repetitions = optional_u32(item, attr::REPETITIONS)?.unwrap_or(0);
        let ease_factor = match item.get(attr::EASE_FACTOR) {
            Some(v) => parse_ease(v)?,
            None => DEFAULT_EASE_FACTOR,
        };

        let tags = match item.get(attr::TAGS) {
            Some(v) => v
                .as_list()
                .ok_or_else(|| invalid(attr::TAGS))?
                .iter()
                .map(|t| t.as_str().map(str::to_string).ok_or_else(|| invalid(attr::TAGS)))
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let review_history = match item.get(attr::REVIEW_HISTORY) {
            Some(v) => v
                .as_list()
                .ok_or_else(|| invalid(attr::REVIEW_HISTORY))?
                .iter()
                .map(history_entry_from_value)
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            card_id: required_str(item, attr::CARD_ID)?,
            user_id: required_str(item, attr::USER_ID)?,
            front: required_str(item, attr::FRONT)?,
            back: required_str(item, attr::BACK)?,
            deck_id: optional_str(item, attr::DECK_ID)?,
            tags,
            schedule: SchedulingState {
                interval,
                ease_factor,
                repetitions,
                next_review_at: optional_timestamp(item, attr::NEXT_REVIEW_AT)?,
            },
            review_history,
            created_at: parse_timestamp(&required_str(item, attr::CREATED_AT)?, attr::CREATED_AT)?,
            updated_at: optional_timestamp(item, attr::UPDATED_AT)?,
        })
    }
}

/// Stored attribute names
pub mod attr {
    pub const USER_ID: &str = "user_id";
    pub const CARD_ID: &str = "card_id";
    pub const FRONT: &str = "front";
    pub const BACK: &str = "back";
    pub const DECK_ID: &str = "deck_id";
    pub const TAGS: &str = "tags";
    pub const INTERVAL: &str = "interval";
    pub const EASE_FACTOR: &str = "ease_factor";
    pub const REPETITIONS: &str = "repetitions";
    pub const NEXT_REVIEW_AT: &str = "next_review_at";
    pub const REVIEW_HISTORY: &str = "review_history";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
    pub const CARD_COUNT: &str = "card_count";
    pub const REVIEWED_AT: &str = "reviewed_at";
    pub const GRADE: &str = "grade";
    pub const EASE_FACTOR_BEFORE: &str = "ease_factor_before";
    pub const EASE_FACTOR_AFTER: &str = "ease_factor_after";
    pub const INTERVAL_BEFORE: &str = "interval_before";
    pub const INTERVAL_AFTER: &str = "interval_after";
}

// ==================== Value Encoding ====================

/// ISO-8601 UTC with fixed nanosecond precision, so stored strings sort chronologically
pub fn timestamp_value(t: DateTime<Utc>) -> AttrValue {
    AttrValue::S(t.to_rfc3339_opts(SecondsFormat::Nanos, true))
}

/// Ease factors are stored as decimal strings to avoid numeric-type drift
pub fn ease_value(ease_factor: f64) -> AttrValue {
    AttrValue::S(ease_factor.to_string())
}

pub fn tags_value(tags: &[String]) -> AttrValue {
    AttrValue::L(tags.iter().map(AttrValue::string).collect())
}

pub fn history_value(history: &[ReviewHistoryEntry]) -> AttrValue {
    AttrValue::L(history.iter().map(history_entry_value).collect())
}

fn history_entry_value(entry: &ReviewHistoryEntry) -> AttrValue {
    let mut map = BTreeMap::new();
    map.insert(attr::REVIEWED_AT.to_string(), timestamp_value(entry.reviewed_at));
    map.insert(attr::GRADE.to_string(), AttrValue::number(entry.grade.into()));
    map.insert(attr::EASE_FACTOR_BEFORE.to_string(), ease_value(entry.ease_factor_before));
    map.insert(attr::EASE_FACTOR_AFTER.to_string(), ease_value(entry.ease_factor_after));
    map.insert(attr::INTERVAL_BEFORE.to_string(), AttrValue::number(entry.interval_before.into()));
    map.insert(attr::INTERVAL_AFTER.to_string(), AttrValue::number(entry.interval_after.into()));
    AttrValue::M(map)
}

fn history_entry_from_value(value: &AttrValue) -> std::result::Result<ReviewHistoryEntry, KvError> {
    let map = value.as_map().ok_or_else(|| invalid(attr::REVIEW_HISTORY))?;
    let get = |name: &str| map.get(name).ok_or_else(|| invalid(name));
    let number = |name: &str| -> std::result::Result<i64, KvError> {
        get(name)?.as_i64().ok_or_else(|| invalid(name))
    };

    Ok(ReviewHistoryEntry {
        reviewed_at: parse_timestamp(get(attr::REVIEWED_AT)?.as_str().ok_or_else(|| invalid(attr::REVIEWED_AT))?, attr::REVIEWED_AT)?,
        grade: u8::try_from(number(attr::GRADE)?).map_err(|_| invalid(attr::GRADE))?,
        ease_factor_before: parse_ease(get(attr::EASE_FACTOR_BEFORE)?)?,
        ease_factor_after: parse_ease(get(attr::EASE_FACTOR_AFTER)?)?,
        interval_before: u32::try_from(number(attr::INTERVAL_BEFORE)?).map_err(|_| invalid(attr::INTERVAL_BEFORE))?,
        interval_after: u32::try_from(number(attr::INTERVAL_AFTER)?).map_err(|_| invalid(attr::INTERVAL_AFTER))?,
    })
}

fn invalid(name: &str) -> KvError {
    KvError::InvalidItem(format!("bad or missing attribute '{}'", name))
}

fn required_str(item: &Item, name: &str) -> std::result::Result<String, KvError> {
    item.get(name)
        .and_then(AttrValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| invalid(name))
}

fn optional_str(item: &Item, name: &str) -> std::result::Result<Option<String>, KvError> {
    match item.get(name) {
        None | Some(AttrValue::Null) => Ok(None),
        Some(v) => v.as_str().map(|s| Some(s.to_string())).ok_or_else(|| invalid(name)),
    }
}

fn optional_u32(item: &Item, name: &str) -> std::result::Result<Option<u32>, KvError> {
    match item.get(name) {
        None => Ok(None),
        Some(v) => v
            .as_i64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(name)),
    }
}

fn optional_timestamp(item: &Item, name: &str) -> std::result::Result<Option<DateTime<Utc>>, KvError> {
    optional_str(item, name)?
        .map(|s| parse_timestamp(&s, name))
        .transpose()
}

pub fn parse_timestamp(s: &str, name: &str) -> std::result::Result<DateTime<Utc>, KvError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| invalid(name))
}

/// Accepts the decimal-string encoding and, for tolerance, a stored number
fn parse_ease(value: &AttrValue) -> std::result::Result<f64, KvError> {
    match value {
        AttrValue::S(s) | AttrValue::N(s) => s.parse().map_err(|_| invalid(attr::EASE_FACTOR)),
        _ => Err(invalid(attr::EASE_FACTOR)),
    }
}

// ==================== Validation ====================

/// Trim tags, drop blanks and duplicates, truncate long ones.
/// More than [`MAX_TAGS`] supplied tags is rejected outright.
pub fn normalize_tags(tags: Vec<String>) -> Result<Vec<String>> {
    if tags.len() > MAX_TAGS {
        return Err(CardError::Validation(format!("Maximum {} tags allowed", MAX_TAGS)));
    }

    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag: String = tag.trim().chars().take(MAX_TAG_LENGTH).collect();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }
    Ok(normalized)
}

pub fn validate_front(front: &str) -> Result<()> {
    validate_text("front", front, MAX_FRONT_LENGTH)
}

pub fn validate_back(back: &str) -> Result<()> {
    validate_text("back", back, MAX_BACK_LENGTH)
}

fn validate_text(field: &str, text: &str, max: usize) -> Result<()> {
    let len = text.chars().count();
    if len == 0 {
        return Err(CardError::Validation(format!("{} must not be empty", field)));
    }
    if len > max {
        return Err(CardError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

// ==================== Partial Updates ====================

/// Fields a caller may change on an existing card; None leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUpdate {
    pub front: Option<String>,
    pub back: Option<String>,
    pub deck_id: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Editable card attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardField {
    Front,
    Back,
    DeckId,
    Tags,
}

impl CardField {
    pub fn attr(self) -> &'static str {
        match self {
            CardField::Front => attr::FRONT,
            CardField::Back => attr::BACK,
            CardField::DeckId => attr::DECK_ID,
            CardField::Tags => attr::TAGS,
        }
    }
}

/// Accumulates validated `(field, value)` pairs; an empty builder means no write
#[derive(Debug, Default)]
pub struct UpdateBuilder {
    fields: Vec<(CardField, AttrValue)>,
}

impl UpdateBuilder {
    /// Validate `update` and collect the fields it sets
    pub fn from_update(update: CardUpdate) -> Result<Self> {
        let mut builder = Self::default();
        if let Some(front) = update.front {
            validate_front(&front)?;
            builder.set(CardField::Front, AttrValue::S(front));
        }
        if let Some(back) = update.back {
            validate_back(&back)?;
            builder.set(CardField::Back, AttrValue::S(back));
        }
        if let Some(deck_id) = update.deck_id {
            builder.set(CardField::DeckId, AttrValue::S(deck_id));
        }
        if let Some(tags) = update.tags {
            builder.set(CardField::Tags, tags_value(&normalize_tags(tags)?));
        }
        Ok(builder)
    }

    pub fn set(&mut self, field: CardField, value: AttrValue) {
        self.fields.retain(|(f, _)| *f != field);
        self.fields.push((field, value));
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(CardField, AttrValue)] {
        &self.fields
    }

    /// Store actions for the accumulated fields plus the `updated_at` touch
    pub fn into_actions(self, now: DateTime<Utc>) -> Vec<UpdateAction> {
        let mut actions: Vec<UpdateAction> = self
            .fields
            .into_iter()
            .map(|(field, value)| UpdateAction::Set {
                attr: field.attr().to_string(),
                value,
            })
            .collect();
        actions.push(UpdateAction::Set {
            attr: attr::UPDATED_AT.to_string(),
            value: timestamp_value(now),
        });
        actions
    }
}

/// Previous or updated scheduling snapshot returned to clients after a review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSnapshot {
    pub ease_factor: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub due_date: Option<NaiveDate>,
}

impl From<&SchedulingState> for ReviewSnapshot {
    fn from(state: &SchedulingState) -> Self {
        Self {
            ease_factor: state.ease_factor,
            interval: state.interval,
            repetitions: state.repetitions,
            due_date: state.next_review_at.map(|t| t.date_naive()),
        }
    }
}

/// Outcome of a submitted review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewOutcome {
    pub card_id: String,
    pub grade: u8,
    pub previous: ReviewSnapshot,
    pub updated: ReviewSnapshot,
    pub reviewed_at: DateTime<Utc>,
}

/// A due card as shown in a review session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueCard {
    pub card_id: String,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub overdue_days: i64,
}

/// Due cards plus the next due date when nothing is due
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DueSummary {
    pub due_cards: Vec<DueCard>,
    pub total_due_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_due_date: Option<NaiveDate>,
}

/// One page of cards and the cursor for the next page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPage {
    pub cards: Vec<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn sample_card() -> Card {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let mut card = Card::new("user-1", "Question".to_string(), "Answer".to_string(), now);
        card.deck_id = Some("deck-1".to_string());
        card.tags = vec!["jp".to_string(), "n5".to_string()];
        card.schedule.ease_factor = 2.36;
        card.schedule.interval = 6;
        card.schedule.repetitions = 2;
        card.updated_at = Some(now + Duration::minutes(5));
        card
    }

    fn entry(i: u32) -> ReviewHistoryEntry {
        ReviewHistoryEntry {
            reviewed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i.into()),
            grade: 4,
            ease_factor_before: 2.5,
            ease_factor_after: 2.5,
            interval_before: i,
            interval_after: i + 1,
        }
    }

    #[test]
    fn test_new_card_defaults() {
        let now = Utc::now();
        let card = Card::new("u", "f".to_string(), "b".to_string(), now);
        assert_eq!(card.schedule.interval, 0);
        assert_eq!(card.schedule.ease_factor, 2.5);
        assert_eq!(card.schedule.repetitions, 0);
        assert_eq!(card.schedule.next_review_at, Some(now));
        assert_eq!(card.schedule.phase(), CardPhase::New);
        assert!(card.updated_at.is_none());
    }

    #[test]
    fn test_item_roundtrip_preserves_fields() {
        let mut card = sample_card();
        card.record_review(entry(1));
        card.record_review(entry(2));

        let item = card.to_item();
        assert_eq!(item.get(attr::EASE_FACTOR), Some(&AttrValue::string("2.36")));

        let parsed = Card::from_item(&item).unwrap();
        assert_eq!(parsed, card);
        assert_eq!(parsed.review_history[0].interval_before, 1);
        assert_eq!(parsed.review_history[1].interval_before, 2);
    }

    #[test]
    fn test_item_roundtrip_with_subsecond_timestamp() {
        let mut card = sample_card();
        card.created_at = Utc::now();
        card.schedule.next_review_at = None;
        let parsed = Card::from_item(&card.to_item()).unwrap();
        assert_eq!(parsed.created_at, card.created_at);
        assert!(parsed.schedule.next_review_at.is_none());
    }

    #[test]
    fn test_from_item_defaults_missing_schedule() {
        let mut item = sample_card().to_item();
        item.remove(attr::EASE_FACTOR);
        item.remove(attr::INTERVAL);
        item.remove(attr::REPETITIONS);
        item.remove(attr::TAGS);

        let card = Card::from_item(&item).unwrap();
        assert_eq!(card.schedule.ease_factor, DEFAULT_EASE_FACTOR);
        assert_eq!(card.schedule.interval, 0);
        assert!(card.tags.is_empty());
    }

    #[test]
    fn test_from_item_rejects_bad_ease_factor() {
        let mut item = sample_card().to_item();
        item.insert(attr::EASE_FACTOR.to_string(), AttrValue::string("easy"));
        assert!(matches!(Card::from_item(&item), Err(KvError::InvalidItem(_))));
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut card = sample_card();
        for i in 0..105 {
            card.record_review(entry(i));
        }
        assert_eq!(card.review_history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(card.review_history[0].interval_before, 5);
        assert_eq!(card.review_history[99].interval_before, 104);
    }

    #[test]
    fn test_normalize_tags() {
        let long = "x".repeat(60);
        let tags = vec![
            "  rust ".to_string(),
            "".to_string(),
            "   ".to_string(),
            long,
            "rust".to_string(),
        ];
        let normalized = normalize_tags(tags).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0], "rust");
        assert_eq!(normalized[1].chars().count(), MAX_TAG_LENGTH);
    }

    #[test]
    fn test_too_many_tags_rejected() {
        let tags: Vec<String> = (0..11).map(|i| format!("t{}", i)).collect();
        assert!(matches!(normalize_tags(tags), Err(CardError::Validation(_))));
    }

    #[test]
    fn test_validate_text_limits() {
        assert!(validate_front("").is_err());
        assert!(validate_front(&"a".repeat(1000)).is_ok());
        assert!(validate_front(&"a".repeat(1001)).is_err());
        assert!(validate_back(&"a".repeat(2000)).is_ok());
        assert!(validate_back(&"a".repeat(2001)).is_err());
    }

    #[test]
    fn test_update_builder_empty_when_nothing_set() {
        let builder = UpdateBuilder::from_update(CardUpdate::default()).unwrap();
        assert!(builder.is_empty());
    }

    #[test]
    fn test_update_builder_collects_fields() {
        let update = CardUpdate {
            front: Some("New".to_string()),
            tags: Some(vec![" a ".to_string()]),
            ..Default::default()
        };
        let builder = UpdateBuilder::from_update(update).unwrap();
        let fields: Vec<CardField> = builder.fields().iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec![CardField::Front, CardField::Tags]);

        let actions = builder.into_actions(Utc::now());
        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[2], UpdateAction::Set { attr: name, .. } if name == attr::UPDATED_AT));
    }

    #[test]
    fn test_update_builder_validates() {
        let update = CardUpdate {
            back: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(UpdateBuilder::from_update(update), Err(CardError::Validation(_))));
    }
}
