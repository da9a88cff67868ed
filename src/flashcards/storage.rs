//! Card storage on top of the key-value store
//!
//! Layout:
//! ```text
//! cards    (user_id, card_id)   one item per card
//!   user_id-due-index      sorted by next_review_at
//!   user_id-created-index  sorted by created_at
//! users    (user_id)            card_count
//! reviews  (user_id, card_id#reviewed_at)   one audit record per review
//! ```
//!
//! Creates and deletes go through [`TransactionCoordinator`] so the user's
//! `card_count` moves with them; every other write is a single-item update.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as CURSOR, Engine};
use chrono::{DateTime, Utc};

use super::errors::{CardError, Result};
use super::models::*;
use super::review::ReviewLog;
use super::transaction::{TransactionCoordinator, MAX_AUDIT_DELETES};
use crate::config::TableNames;
use crate::kv::{
    AttrValue, Condition, IndexSpec, Item, Key, KvError, KvStore, PageKey, QueryRequest, UpdateAction,
    UpdateRequest,
};

/// Page size for [`CardStore::list`] when none is given
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Largest page [`CardStore::list`] and the due index will return
pub const MAX_PAGE_LIMIT: usize = 100;

/// CRUD over cards, scoped to their owner
pub struct CardStore {
    store: Arc<dyn KvStore>,
    coordinator: TransactionCoordinator,
}

impl CardStore {
    pub fn new(store: Arc<dyn KvStore>, tables: TableNames) -> Self {
        let coordinator = TransactionCoordinator::new(store.clone(), tables);
        Self { store, coordinator }
    }

    pub fn tables(&self) -> &TableNames {
        self.coordinator.tables()
    }

    /// The backing store, shared with the due index and the review audit log
    pub fn kv(&self) -> Arc<dyn KvStore> {
        self.store.clone()
    }

    // ==================== Card Operations ====================

    /// Create a new card, counting it against the user's limit
    pub async fn create(
        &self,
        user_id: &str,
        front: String,
        back: String,
        deck_id: Option<String>,
        tags: Option<Vec<String>>,
    ) -> Result<Card> {
        validate_front(&front)?;
        validate_back(&back)?;
        let tags = normalize_tags(tags.unwrap_or_default())?;

        let mut card = Card::new(user_id, front, back, Utc::now());
        card.deck_id = deck_id;
        card.tags = tags;

        self.coordinator.create_card(&card).await?;
        log::info!("Created card {} for user {}", card.card_id, user_id);
        Ok(card)
    }

    /// Get a specific card
    pub async fn get(&self, user_id: &str, card_id: &str) -> Result<Card> {
        let item = self
            .store
            .get_item(&self.tables().cards, &Key::composite(user_id, card_id))
            .await?
            .ok_or_else(|| CardError::CardNotFound(card_id.to_string()))?;
        Ok(Card::from_item(&item)?)
    }

    /// Apply a partial update. Nothing is written when no field is given.
    pub async fn update(&self, user_id: &str, card_id: &str, update: CardUpdate) -> Result<Card> {
        let builder = UpdateBuilder::from_update(update)?;
        if builder.is_empty() {
            return self.get(user_id, card_id).await;
        }

        let request = UpdateRequest {
            table: self.tables().cards.clone(),
            key: Key::composite(user_id, card_id),
            actions: builder.into_actions(Utc::now()),
            condition: Some(card_exists()),
        };
        let item = self.update_existing(card_id, request).await?;
        log::debug!("Updated card {} for user {}", card_id, user_id);
        Ok(Card::from_item(&item)?)
    }

    /// Delete a card, its audit records, and one unit of the user's counter.
    ///
    /// Audit records beyond what one transaction holds are removed after the
    /// commit, best-effort.
    pub async fn delete(&self, user_id: &str, card_id: &str) -> Result<()> {
        // A card that was never there is not-found, not counter drift
        self.get(user_id, card_id).await?;

        let log = ReviewLog::new(self.store.clone(), self.tables().reviews.clone());
        let audit_keys = log.record_keys(user_id, card_id).await?;
        let (in_transaction, overflow) = audit_keys.split_at(audit_keys.len().min(MAX_AUDIT_DELETES));

        self.coordinator
            .delete_card(user_id, card_id, in_transaction)
            .await?;

        for key in overflow {
            if let Err(e) = self.store.delete_item(&self.tables().reviews, key, None).await {
                log::warn!("Failed to remove review audit record {:?} of deleted card {}: {}", key, card_id, e);
            }
        }

        log::info!("Deleted card {} for user {}", card_id, user_id);
        Ok(())
    }

    /// List cards newest first, optionally limited to one deck
    pub async fn list(
        &self,
        user_id: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
        deck_id: Option<&str>,
    ) -> Result<CardPage> {
        let mut request = QueryRequest::new(&self.tables().cards, user_id);
        request.index = Some(IndexSpec {
            name: self.tables().created_index.clone(),
            sort_attr: attr::CREATED_AT.to_string(),
        });
        request.ascending = false;
        request.limit = Some(clamp_limit(limit, DEFAULT_LIST_LIMIT));
        request.exclusive_start_key = cursor.map(decode_cursor).transpose()?;
        request.filter = deck_id.map(|d| (attr::DECK_ID.to_string(), AttrValue::string(d)));

        let output = self.store.query(request).await?;
        let cards = output
            .items
            .iter()
            .map(Card::from_item)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CardPage {
            cards,
            next_cursor: output.last_evaluated_key.as_ref().map(encode_cursor).transpose()?,
        })
    }

    /// Persist scheduling fields and history after a review.
    ///
    /// A single-item write; the counter is not involved. `last_updated` is the
    /// card's `updated_at` as it was read: if another write landed since, nothing
    /// is written and the review fails as `Internal`.
    pub async fn update_review_state(
        &self,
        user_id: &str,
        card_id: &str,
        state: &SchedulingState,
        history: &[ReviewHistoryEntry],
        last_updated: Option<DateTime<Utc>>,
    ) -> Result<Card> {
        let now = Utc::now();
        let mut actions = vec![
            UpdateAction::Set {
                attr: attr::INTERVAL.to_string(),
                value: AttrValue::number(state.interval.into()),
            },
            UpdateAction::Set {
                attr: attr::EASE_FACTOR.to_string(),
                value: ease_value(state.ease_factor),
            },
            UpdateAction::Set {
                attr: attr::REPETITIONS.to_string(),
                value: AttrValue::number(state.repetitions.into()),
            },
            UpdateAction::Set {
                attr: attr::REVIEW_HISTORY.to_string(),
                value: history_value(history),
            },
            UpdateAction::Set {
                attr: attr::UPDATED_AT.to_string(),
                value: timestamp_value(now),
            },
        ];
        actions.push(match state.next_review_at {
            Some(next) => UpdateAction::Set {
                attr: attr::NEXT_REVIEW_AT.to_string(),
                value: timestamp_value(next),
            },
            None => UpdateAction::Remove {
                attr: attr::NEXT_REVIEW_AT.to_string(),
            },
        });

        let unchanged = match last_updated {
            Some(t) => Condition::AttributeEquals {
                attr: attr::UPDATED_AT.to_string(),
                value: timestamp_value(t),
            },
            None => Condition::AttributeNotExists {
                attr: attr::UPDATED_AT.to_string(),
            },
        };
        let request = UpdateRequest {
            table: self.tables().cards.clone(),
            key: Key::composite(user_id, card_id),
            actions,
            condition: Some(Condition::All {
                conditions: vec![card_exists(), unchanged],
            }),
        };

        match self.store.update_item(request).await {
            Ok(item) => Ok(Card::from_item(&item)?),
            Err(KvError::ConditionalCheckFailed) => {
                // Tell a deleted card apart from a concurrent write
                self.get(user_id, card_id).await?;
                log::warn!("Card {} of user {} changed while it was being reviewed", card_id, user_id);
                Err(CardError::Internal(format!(
                    "Card {} was modified concurrently, review not saved",
                    card_id
                )))
            }
            Err(e) => {
                log::error!("Failed to save review state of card {}: {}", card_id, e);
                Err(e.into())
            }
        }
    }

    /// Live cards the user owns, as tracked by the counter.
    /// A user with no counter record has zero cards.
    pub async fn card_count(&self, user_id: &str) -> Result<i64> {
        let item = self
            .store
            .get_item(&self.tables().users, &Key::partition(user_id))
            .await?;
        let count = item
            .as_ref()
            .and_then(|i| i.get(attr::CARD_COUNT))
            .map(|v| {
                v.as_i64().ok_or_else(|| {
                    CardError::Internal(format!("card_count of user {} is not an integer", user_id))
                })
            })
            .transpose()?;
        Ok(count.unwrap_or(0))
    }

    async fn update_existing(&self, card_id: &str, request: UpdateRequest) -> Result<Item> {
        match self.store.update_item(request).await {
            Ok(item) => Ok(item),
            Err(KvError::ConditionalCheckFailed) => Err(CardError::CardNotFound(card_id.to_string())),
            Err(e) => {
                log::error!("Failed to update card {}: {}", card_id, e);
                Err(e.into())
            }
        }
    }
}

fn card_exists() -> Condition {
    Condition::AttributeExists {
        attr: attr::CARD_ID.to_string(),
    }
}

/// Clamp a requested page size to `1..=MAX_PAGE_LIMIT`
pub fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_PAGE_LIMIT)
}

/// Cursors are opaque to callers: URL-safe base64 over the JSON page key
pub fn encode_cursor(key: &PageKey) -> Result<String> {
    let json = serde_json::to_vec(key).map_err(|e| CardError::Internal(e.to_string()))?;
    Ok(CURSOR.encode(json))
}

pub fn decode_cursor(cursor: &str) -> Result<PageKey> {
    let bytes = CURSOR
        .decode(cursor)
        .map_err(|_| CardError::Validation("Invalid cursor".to_string()))?;
    serde_json::from_slice(&bytes).map_err(|_| CardError::Validation("Invalid cursor".to_string()))
}
