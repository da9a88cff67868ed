//! Applying a graded review to a card
//!
//! A review reads the card, runs SM-2 on its current state, writes the new
//! state together with one more history entry, and then appends an audit
//! record to the reviews table. The audit write is best-effort: its failure is
//! logged and dropped, never returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::algorithm::{next_state, preview_intervals};
use super::errors::{CardError, Result};
use super::models::{attr, ease_value, timestamp_value, ReviewHistoryEntry, ReviewOutcome, ReviewSnapshot};
use super::storage::CardStore;
use crate::kv::{AttrValue, Item, Key, KvError, KvStore, QueryRequest, SortRange};

/// Analytics log of reviews, one record per review.
///
/// Records live under the user's partition with sort key `{card_id}#{reviewed_at}`,
/// so a card's records share a prefix and sort by review time.
pub struct ReviewLog {
    store: Arc<dyn KvStore>,
    table: String,
}

impl ReviewLog {
    pub fn new(store: Arc<dyn KvStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }

    pub async fn record(&self, user_id: &str, card_id: &str, entry: &ReviewHistoryEntry) -> std::result::Result<(), KvError> {
        let reviewed_at = timestamp_value(entry.reviewed_at);
        let key = Key::composite(user_id, record_sort_key(card_id, reviewed_at.as_str().unwrap_or_default()));

        let mut item = Item::new();
        item.insert(attr::USER_ID.into(), AttrValue::string(user_id));
        item.insert(attr::CARD_ID.into(), AttrValue::string(card_id));
        item.insert(attr::REVIEWED_AT.into(), reviewed_at);
        item.insert(attr::GRADE.into(), AttrValue::number(entry.grade.into()));
        item.insert(attr::EASE_FACTOR_BEFORE.into(), ease_value(entry.ease_factor_before));
        item.insert(attr::EASE_FACTOR_AFTER.into(), ease_value(entry.ease_factor_after));
        item.insert(attr::INTERVAL_BEFORE.into(), AttrValue::number(entry.interval_before.into()));
        item.insert(attr::INTERVAL_AFTER.into(), AttrValue::number(entry.interval_after.into()));

        self.store.put_item(&self.table, &key, item, None).await
    }

    /// Keys of every record logged for one card, oldest first
    pub async fn record_keys(&self, user_id: &str, card_id: &str) -> std::result::Result<Vec<Key>, KvError> {
        let mut request = QueryRequest::new(&self.table, user_id);
        request.range = SortRange::BeginsWith {
            prefix: record_sort_key(card_id, ""),
        };

        let mut keys = Vec::new();
        loop {
            let output = self.store.query(request.clone()).await?;
            for item in &output.items {
                let reviewed_at = item
                    .get(attr::REVIEWED_AT)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| KvError::InvalidItem(format!("review record of card {} has no reviewed_at", card_id)))?;
                keys.push(Key::composite(user_id, record_sort_key(card_id, reviewed_at)));
            }
            match output.last_evaluated_key {
                Some(next) => request.exclusive_start_key = Some(next),
                None => return Ok(keys),
            }
        }
    }
}

fn record_sort_key(card_id: &str, reviewed_at: &str) -> String {
    format!("{}#{}", card_id, reviewed_at)
}

/// Runs reviews against a [`CardStore`]
pub struct ReviewOrchestrator {
    cards: Arc<CardStore>,
    log: ReviewLog,
}

impl ReviewOrchestrator {
    pub fn new(cards: Arc<CardStore>) -> Self {
        let log = ReviewLog::new(cards.kv(), cards.tables().reviews.clone());
        Self { cards, log }
    }

    pub fn with_log(cards: Arc<CardStore>, log: ReviewLog) -> Self {
        Self { cards, log }
    }

    /// Grade a card now
    pub async fn submit_review(&self, user_id: &str, card_id: &str, grade: i32) -> Result<ReviewOutcome> {
        self.submit_review_at(user_id, card_id, grade, Utc::now()).await
    }

    /// Grade a card as of `now`
    pub async fn submit_review_at(
        &self,
        user_id: &str,
        card_id: &str,
        grade: i32,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let grade_value = match u8::try_from(grade) {
            Ok(g) if i32::from(g) <= super::algorithm::MAX_GRADE => g,
            _ => return Err(CardError::InvalidGrade(grade)),
        };

        // Another user's card reads as missing
        let mut card = self.cards.get(user_id, card_id).await?;
        let last_updated = card.updated_at;
        let previous = ReviewSnapshot::from(&card.schedule);

        let result = next_state(grade, &card.schedule, now)?;
        let entry = ReviewHistoryEntry {
            reviewed_at: now,
            grade: grade_value,
            ease_factor_before: card.schedule.ease_factor,
            ease_factor_after: result.ease_factor,
            interval_before: card.schedule.interval,
            interval_after: result.interval,
        };

        card.schedule = result.into();
        card.record_review(entry.clone());

        let saved = self
            .cards
            .update_review_state(user_id, card_id, &card.schedule, &card.review_history, last_updated)
            .await?;

        self.record_audit(user_id, card_id, &entry).await;

        log::info!(
            "Reviewed card {} for user {}: grade {}, next in {} days",
            card_id,
            user_id,
            grade,
            saved.schedule.interval
        );

        Ok(ReviewOutcome {
            card_id: card_id.to_string(),
            grade: grade_value,
            previous,
            updated: ReviewSnapshot::from(&saved.schedule),
            reviewed_at: now,
        })
    }

    /// Interval each grade would give the card, without recording anything
    pub async fn preview(&self, user_id: &str, card_id: &str) -> Result<[u32; 6]> {
        let card = self.cards.get(user_id, card_id).await?;
        Ok(preview_intervals(&card.schedule))
    }

    async fn record_audit(&self, user_id: &str, card_id: &str, entry: &ReviewHistoryEntry) {
        if let Err(e) = self.log.record(user_id, card_id, entry).await {
            log::warn!(
                "Failed to record review audit for card {} of user {}: {}",
                card_id,
                user_id,
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableNames;
    use crate::flashcards::models::MAX_HISTORY_ENTRIES;
    use crate::kv::testing::FaultyStore;
    use crate::kv::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 2, 7, 30, 0).unwrap()
    }

    fn setup() -> (Arc<MemoryStore>, Arc<CardStore>, ReviewOrchestrator) {
        let store = Arc::new(MemoryStore::new());
        let cards = Arc::new(CardStore::new(store.clone(), TableNames::default()));
        let reviews = ReviewOrchestrator::new(cards.clone());
        (store, cards, reviews)
    }

    async fn new_card(cards: &CardStore, user_id: &str) -> String {
        cards
            .create(user_id, "Q".to_string(), "A".to_string(), None, None)
            .await
            .unwrap()
            .card_id
    }

    #[tokio::test]
    async fn test_first_review() {
        let (store, cards, reviews) = setup();
        let card_id = new_card(&cards, "u1").await;

        let outcome = reviews.submit_review_at("u1", &card_id, 5, now()).await.unwrap();
        assert_eq!(outcome.grade, 5);
        assert_eq!(outcome.previous.interval, 0);
        assert_eq!(outcome.previous.repetitions, 0);
        assert_eq!(outcome.previous.ease_factor, 2.5);
        assert_eq!(outcome.updated.interval, 1);
        assert_eq!(outcome.updated.repetitions, 1);
        assert_eq!(outcome.updated.ease_factor, 2.6);
        assert_eq!(outcome.updated.due_date, Some((now() + Duration::days(1)).date_naive()));

        let card = cards.get("u1", &card_id).await.unwrap();
        assert_eq!(card.review_history.len(), 1);
        assert_eq!(card.review_history[0].interval_after, 1);
        assert_eq!(card.schedule.next_review_at, Some(now() + Duration::days(1)));

        let log = ReviewLog::new(store.clone(), cards.tables().reviews.clone());
        let keys = log.record_keys("u1", &card_id).await.unwrap();
        assert_eq!(keys.len(), 1);
        let audit = store
            .get_item(&cards.tables().reviews, &keys[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(audit.get(attr::GRADE), Some(&AttrValue::number(5)));
        assert_eq!(audit.get(attr::EASE_FACTOR_AFTER), Some(&AttrValue::string("2.6")));
    }

    #[tokio::test]
    async fn test_sequence_walks_phases() {
        let (_store, cards, reviews) = setup();
        let card_id = new_card(&cards, "u1").await;

        let intervals: Vec<u32> = {
            let mut out = Vec::new();
            for (i, grade) in [4, 4, 4, 1].into_iter().enumerate() {
                let at = now() + Duration::days(i as i64 * 10);
                out.push(reviews.submit_review_at("u1", &card_id, grade, at).await.unwrap().updated.interval);
            }
            out
        };
        // 1, 6, round(6 * 2.5) = 15, then a lapse resets to 1
        assert_eq!(intervals, vec![1, 6, 15, 1]);

        let card = cards.get("u1", &card_id).await.unwrap();
        assert_eq!(card.schedule.repetitions, 0);
        assert_eq!(card.review_history.len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_grade_checked_before_lookup() {
        let (_store, _cards, reviews) = setup();
        for grade in [-1, 6, 300] {
            let result = reviews.submit_review("u1", "missing", grade).await;
            assert!(matches!(result, Err(CardError::InvalidGrade(g)) if g == grade));
        }
    }

    #[tokio::test]
    async fn test_other_users_card_is_not_found() {
        let (_store, cards, reviews) = setup();
        let card_id = new_card(&cards, "owner").await;

        let result = reviews.submit_review("intruder", &card_id, 4).await;
        assert!(matches!(result, Err(CardError::CardNotFound(_))));

        let card = cards.get("owner", &card_id).await.unwrap();
        assert!(card.review_history.is_empty());
    }

    #[tokio::test]
    async fn test_history_is_capped() {
        let (_store, cards, reviews) = setup();
        let card_id = new_card(&cards, "u1").await;

        for i in 0..(MAX_HISTORY_ENTRIES + 3) {
            let at = now() + Duration::minutes(i as i64);
            reviews.submit_review_at("u1", &card_id, 3, at).await.unwrap();
        }

        let card = cards.get("u1", &card_id).await.unwrap();
        assert_eq!(card.review_history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(card.review_history[0].reviewed_at, now() + Duration::minutes(3));
        for pair in card.review_history.windows(2) {
            assert!(pair[0].reviewed_at < pair[1].reviewed_at);
        }
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_review() {
        let store = Arc::new(FaultyStore::new());
        let tables = TableNames::default();
        store.fail_puts_to(&tables.reviews);
        let cards = Arc::new(CardStore::new(store.clone(), tables.clone()));
        let reviews = ReviewOrchestrator::new(cards.clone());

        let card_id = new_card(&cards, "u1").await;
        let outcome = reviews.submit_review_at("u1", &card_id, 4, now()).await.unwrap();
        assert_eq!(outcome.updated.repetitions, 1);

        let card = cards.get("u1", &card_id).await.unwrap();
        assert_eq!(card.review_history.len(), 1);
        assert_eq!(store.inner().len(&tables.reviews), 0);
    }

    #[tokio::test]
    async fn test_preview() {
        let (_store, cards, reviews) = setup();
        let card_id = new_card(&cards, "u1").await;
        assert_eq!(reviews.preview("u1", &card_id).await.unwrap(), [1, 1, 1, 1, 1, 1]);
    }

    #[tokio::test]
    async fn test_every_review_is_logged() {
        let (store, cards, reviews) = setup();
        let card_id = new_card(&cards, "u1").await;
        let other_id = new_card(&cards, "u1").await;

        for i in 0..3 {
            let at = now() + Duration::days(i);
            reviews.submit_review_at("u1", &card_id, 4, at).await.unwrap();
        }
        reviews.submit_review_at("u1", &other_id, 2, now()).await.unwrap();

        let log = ReviewLog::new(store.clone(), cards.tables().reviews.clone());
        let keys = log.record_keys("u1", &card_id).await.unwrap();
        assert_eq!(keys.len(), 3);
        assert_eq!(log.record_keys("u1", &other_id).await.unwrap().len(), 1);

        let reviewed: Vec<_> = {
            let mut out = Vec::new();
            for key in &keys {
                let record = store.get_item(&cards.tables().reviews, key).await.unwrap().unwrap();
                out.push(record[attr::REVIEWED_AT].as_str().unwrap().to_string());
            }
            out
        };
        assert!(reviewed.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_concurrent_reviews_do_not_lose_history() {
        let store = Arc::new(FaultyStore::new());
        let cards = Arc::new(CardStore::new(store.clone(), TableNames::default()));
        let reviews = ReviewOrchestrator::new(cards.clone());
        let card_id = new_card(&cards, "u1").await;
        store.interleave_writes();

        let (first, second) = tokio::join!(
            reviews.submit_review_at("u1", &card_id, 4, now()),
            reviews.submit_review_at("u1", &card_id, 5, now() + Duration::seconds(1)),
        );

        let (won, lost) = if first.is_ok() { (first, second) } else { (second, first) };
        assert!(won.is_ok());
        assert!(matches!(lost, Err(CardError::Internal(_))));

        let card = cards.get("u1", &card_id).await.unwrap();
        assert_eq!(card.review_history.len(), 1);
        assert_eq!(card.schedule.repetitions, 1);
    }
}
