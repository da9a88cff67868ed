//! Due-card queries over the `(user_id, next_review_at)` index
//!
//! Read-only. Cards without `next_review_at` are absent from the index and so
//! are never due. Results lag the store's writes by whatever the index lags.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::errors::Result;
use super::models::{attr, timestamp_value, Card, CardPage, DueCard, DueSummary};
use super::storage::{clamp_limit, decode_cursor, encode_cursor};
use crate::config::TableNames;
use crate::kv::{IndexSpec, KvStore, QueryRequest, SortRange};

/// Page size for due queries when none is given
pub const DEFAULT_DUE_LIMIT: usize = 20;

pub struct DueIndex {
    store: Arc<dyn KvStore>,
    tables: TableNames,
}

impl DueIndex {
    pub fn new(store: Arc<dyn KvStore>, tables: TableNames) -> Self {
        Self { store, tables }
    }

    fn request(&self, user_id: &str, before: Option<DateTime<Utc>>) -> QueryRequest {
        let mut request = QueryRequest::new(&self.tables.cards, user_id);
        request.index = Some(IndexSpec {
            name: self.tables.due_index.clone(),
            sort_attr: attr::NEXT_REVIEW_AT.to_string(),
        });
        if let Some(before) = before {
            request.range = SortRange::LessOrEqual {
                value: timestamp_value(before),
            };
        }
        request
    }

    /// Cards due at or before `before`, oldest due first
    pub async fn query(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> Result<CardPage> {
        let mut request = self.request(user_id, Some(before));
        request.limit = Some(clamp_limit(limit, DEFAULT_DUE_LIMIT));
        request.exclusive_start_key = cursor.map(decode_cursor).transpose()?;

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

    /// Number of cards due at or before `before`, without reading them
    pub async fn count(&self, user_id: &str, before: DateTime<Utc>) -> Result<usize> {
        let mut total = 0;
        let mut start = None;
        loop {
            let mut request = self.request(user_id, Some(before));
            request.count_only = true;
            request.exclusive_start_key = start;

            let output = self.store.query(request).await?;
            total += output.count;
            match output.last_evaluated_key {
                Some(key) => start = Some(key),
                None => break,
            }
        }
        Ok(total)
    }

    /// Earliest scheduled review, due or not
    pub async fn next_due_at(&self, user_id: &str) -> Result<Option<DateTime<Utc>>> {
        let mut request = self.request(user_id, None);
        request.limit = Some(1);

        let output = self.store.query(request).await?;
        match output.items.first() {
            Some(item) => Ok(Card::from_item(item)?.schedule.next_review_at),
            None => Ok(None),
        }
    }

    /// Due cards for a review session, with how overdue each is.
    /// When nothing is due, `next_due_date` says when something will be.
    pub async fn summary(&self, user_id: &str, now: DateTime<Utc>, limit: Option<usize>) -> Result<DueSummary> {
        let page = self.query(user_id, now, limit, None).await?;
        let due_cards: Vec<DueCard> = page.cards.into_iter().map(|card| due_card(card, now)).collect();

        let total_due_count = if page.next_cursor.is_some() {
            self.count(user_id, now).await?
        } else {
            due_cards.len()
        };

        let next_due_date = if due_cards.is_empty() {
            self.next_due_at(user_id).await?.map(|t| t.date_naive())
        } else {
            None
        };

        log::debug!(
            "User {} has {} due cards (next due {:?})",
            user_id,
            total_due_count,
            next_due_date
        );

        Ok(DueSummary {
            due_cards,
            total_due_count,
            next_due_date,
        })
    }
}

fn due_card(card: Card, now: DateTime<Utc>) -> DueCard {
    let overdue_days = card
        .schedule
        .next_review_at
        .map(|due| (now - due).num_days().max(0))
        .unwrap_or(0);

    DueCard {
        due_date: card.due_date(),
        card_id: card.card_id,
        front: card.front,
        back: card.back,
        deck_id: card.deck_id,
        overdue_days,
    }
}
