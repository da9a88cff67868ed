//! Atomic multi-item writes that keep the per-user card counter in step
//!
//! Create (item order is fixed):
//! 0. users:   `card_count = (card_count or 0) + 1` if `(card_count or 0) < limit`
//! 1. cards:   put the card if no card with that id exists
//!
//! Delete:
//! 0.  cards:   delete the card if it exists
//! 1.  users:   `card_count = card_count - 1` if `card_count > 0`
//! 2.. reviews: delete each of the card's audit records, unconditionally
//!
//! A cancelled transaction is attributed by the position of the item whose
//! precondition failed, never by the bare fact of cancellation. On delete a
//! failed card item wins over a failed counter item: the loser of two racing
//! deletes of a user's last card fails both.

use std::sync::Arc;

use super::errors::{CardError, Result};
use super::models::{attr, Card};
use crate::config::TableNames;
use crate::kv::{
    AttrValue, CancellationCode, CancellationReason, Condition, Key, KvError, KvStore, TransactItem,
    UpdateAction, UpdateRequest,
};

/// Ceiling on live cards per user
pub const MAX_CARDS_PER_USER: i64 = 2000;

const CREATE_COUNTER_INDEX: usize = 0;
const CREATE_CARD_INDEX: usize = 1;

const DELETE_CARD_INDEX: usize = 0;
const DELETE_COUNTER_INDEX: usize = 1;

/// Most items a store accepts in one transaction
pub const MAX_TRANSACTION_ITEMS: usize = 100;

/// Audit records a delete can remove inside its own transaction
pub const MAX_AUDIT_DELETES: usize = MAX_TRANSACTION_ITEMS - 2;

/// Which atomic operation was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    CreateCard,
    DeleteCard,
}

impl TransactionKind {
    fn counter_index(self) -> usize {
        match self {
            TransactionKind::CreateCard => CREATE_COUNTER_INDEX,
            TransactionKind::DeleteCard => DELETE_COUNTER_INDEX,
        }
    }

    fn card_index(self) -> usize {
        match self {
            TransactionKind::CreateCard => CREATE_CARD_INDEX,
            TransactionKind::DeleteCard => DELETE_CARD_INDEX,
        }
    }
}

/// Which item a cancellation is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancellationCause {
    /// The store gave no per-item reasons
    Unattributed,
    /// The counter item's precondition failed
    CounterPrecondition,
    /// The card item's precondition failed
    CardPrecondition,
    /// Some item failed for a reason other than its precondition
    Other(String),
}

/// Attribute a cancellation to an item by its fixed position in the operation
pub fn attribute_cancellation(kind: TransactionKind, reasons: Option<&[CancellationReason]>) -> CancellationCause {
    let reasons = match reasons {
        Some(r) if !r.is_empty() => r,
        _ => return CancellationCause::Unattributed,
    };

    let failed_at = |index: usize| reasons.get(index).map_or(false, |r| r.is_conditional_check_failed());

    let card_failed = failed_at(kind.card_index());
    let counter_failed = failed_at(kind.counter_index());
    match kind {
        TransactionKind::CreateCard if counter_failed => return CancellationCause::CounterPrecondition,
        TransactionKind::CreateCard if card_failed => return CancellationCause::CardPrecondition,
        TransactionKind::DeleteCard if card_failed => return CancellationCause::CardPrecondition,
        TransactionKind::DeleteCard if counter_failed => return CancellationCause::CounterPrecondition,
        _ => {}
    }

    let codes: Vec<String> = reasons
        .iter()
        .filter(|r| r.code != CancellationCode::None)
        .map(|r| format!("{:?}", r.code))
        .collect();
    CancellationCause::Other(codes.join(", "))
}

/// Map an attributed cancellation to the domain error the caller sees
pub fn classify_cancellation(
    kind: TransactionKind,
    cause: &CancellationCause,
    card_id: &str,
) -> CardError {
    match (kind, cause) {
        (TransactionKind::CreateCard, CancellationCause::CounterPrecondition) => {
            CardError::CardLimitExceeded {
                limit: MAX_CARDS_PER_USER,
            }
        }
        (TransactionKind::DeleteCard, CancellationCause::CounterPrecondition) => CardError::Internal(
            "Cannot delete card: card_count already at 0, counter would go negative".to_string(),
        ),
        (TransactionKind::DeleteCard, CancellationCause::CardPrecondition) => {
            CardError::CardNotFound(card_id.to_string())
        }
        (TransactionKind::CreateCard, CancellationCause::CardPrecondition) => {
            CardError::Internal(format!("Card id collision on create: {}", card_id))
        }
        (_, CancellationCause::Unattributed) => {
            CardError::Internal("Transaction cancelled without failure reasons".to_string())
        }
        (_, CancellationCause::Other(codes)) => {
            CardError::Internal(format!("Transaction cancelled: {}", codes))
        }
    }
}

/// Issues the counter-maintaining transactions against the store
pub struct TransactionCoordinator {
    store: Arc<dyn KvStore>,
    tables: TableNames,
}

impl TransactionCoordinator {
    pub fn new(store: Arc<dyn KvStore>, tables: TableNames) -> Self {
        Self { store, tables }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    /// Insert `card` and increment its owner's counter, or neither
    pub async fn create_card(&self, card: &Card) -> Result<()> {
        let items = vec![
            TransactItem::Update(UpdateRequest {
                table: self.tables.users.clone(),
                key: Key::partition(&card.user_id),
                actions: vec![
                    UpdateAction::Set {
                        attr: attr::USER_ID.to_string(),
                        value: AttrValue::string(&card.user_id),
                    },
                    UpdateAction::Add {
                        attr: attr::CARD_COUNT.to_string(),
                        delta: 1,
                        default: 0,
                    },
                ],
                condition: Some(Condition::NumberLessThan {
                    attr: attr::CARD_COUNT.to_string(),
                    value: MAX_CARDS_PER_USER,
                    default: Some(0),
                }),
            }),
            TransactItem::Put {
                table: self.tables.cards.clone(),
                key: Key::composite(&card.user_id, &card.card_id),
                item: card.to_item(),
                condition: Some(Condition::AttributeNotExists {
                    attr: attr::CARD_ID.to_string(),
                }),
            },
        ];

        self.execute(TransactionKind::CreateCard, &card.user_id, &card.card_id, items)
            .await
    }

    /// Remove the card and the given audit records and decrement the counter, or none of it.
    /// At most [`MAX_AUDIT_DELETES`] audit keys fit.
    pub async fn delete_card(&self, user_id: &str, card_id: &str, audit_keys: &[Key]) -> Result<()> {
        if audit_keys.len() > MAX_AUDIT_DELETES {
            return Err(CardError::Internal(format!(
                "{} audit records exceed the {} a delete transaction can hold",
                audit_keys.len(),
                MAX_AUDIT_DELETES
            )));
        }

        let mut items = vec![
            TransactItem::Delete {
                table: self.tables.cards.clone(),
                key: Key::composite(user_id, card_id),
                condition: Some(Condition::AttributeExists {
                    attr: attr::CARD_ID.to_string(),
                }),
            },
            TransactItem::Update(UpdateRequest {
                table: self.tables.users.clone(),
                key: Key::partition(user_id),
                actions: vec![UpdateAction::Add {
                    attr: attr::CARD_COUNT.to_string(),
                    delta: -1,
                    default: 0,
                }],
                condition: Some(Condition::NumberGreaterThan {
                    attr: attr::CARD_COUNT.to_string(),
                    value: 0,
                    default: None,
                }),
            }),
        ];
        items.extend(audit_keys.iter().map(|key| TransactItem::Delete {
            table: self.tables.reviews.clone(),
            key: key.clone(),
            condition: None,
        }));

        self.execute(TransactionKind::DeleteCard, user_id, card_id, items)
            .await
    }

    async fn execute(
        &self,
        kind: TransactionKind,
        user_id: &str,
        card_id: &str,
        items: Vec<TransactItem>,
    ) -> Result<()> {
        match self.store.transact_write(items).await {
            Ok(()) => {
                log::debug!("{:?} committed for user {} card {}", kind, user_id, card_id);
                Ok(())
            }
            Err(KvError::TransactionCanceled { reasons }) => {
                let cause = attribute_cancellation(kind, reasons.as_deref());
                match (kind, &cause) {
                    (TransactionKind::CreateCard, CancellationCause::CounterPrecondition) => {
                        log::info!("User {} reached the card limit", user_id);
                    }
                    (TransactionKind::DeleteCard, CancellationCause::CardPrecondition) => {
                        log::info!("Card {} of user {} was already deleted", card_id, user_id);
                    }
                    (TransactionKind::DeleteCard, CancellationCause::CounterPrecondition) => {
                        // Counter drift: the card exists but the counter is already 0.
                        // Nothing is written to compensate.
                        log::error!(
                            "Card counter drift for user {}: card {} exists but card_count is 0 (reasons: {:?})",
                            user_id,
                            card_id,
                            reasons
                        );
                    }
                    _ => {
                        log::error!(
                            "{:?} cancelled for user {} card {} with reasons: {:?}",
                            kind,
                            user_id,
                            card_id,
                            reasons
                        );
                    }
                }
                Err(classify_cancellation(kind, &cause, card_id))
            }
            Err(KvError::Timeout) => {
                log::warn!("{:?} timed out for user {} card {}", kind, user_id, card_id);
                Err(CardError::Internal("Store request timed out".to_string()))
            }
            Err(e) => {
                log::error!("{:?} failed for user {} card {}: {}", kind, user_id, card_id, e);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;

    fn failed() -> CancellationReason {
        CancellationReason::new(CancellationCode::ConditionalCheckFailed, "The conditional request failed")
    }

    fn ok() -> CancellationReason {
        CancellationReason::none()
    }

    #[test]
    fn test_missing_or_empty_reasons_are_unattributed() {
        for kind in [TransactionKind::CreateCard, TransactionKind::DeleteCard] {
            assert_eq!(attribute_cancellation(kind, None), CancellationCause::Unattributed);
            assert_eq!(attribute_cancellation(kind, Some(&[])), CancellationCause::Unattributed);
            assert!(matches!(
                classify_cancellation(kind, &CancellationCause::Unattributed, "c1"),
                CardError::Internal(_)
            ));
        }
    }

    #[test]
    fn test_create_counter_failure_is_limit() {
        let cause = attribute_cancellation(TransactionKind::CreateCard, Some(&[failed(), ok()]));
        assert_eq!(cause, CancellationCause::CounterPrecondition);
        assert!(matches!(
            classify_cancellation(TransactionKind::CreateCard, &cause, "c1"),
            CardError::CardLimitExceeded { limit: 2000 }
        ));
    }

    #[test]
    fn test_create_other_failure_is_internal() {
        let reasons = [
            CancellationReason::new(CancellationCode::ValidationError, "bad expression"),
            ok(),
        ];
        let cause = attribute_cancellation(TransactionKind::CreateCard, Some(&reasons));
        assert!(matches!(cause, CancellationCause::Other(_)));
        assert!(matches!(
            classify_cancellation(TransactionKind::CreateCard, &cause, "c1"),
            CardError::Internal(_)
        ));

        let conflict = [ok(), CancellationReason::new(CancellationCode::TransactionConflict, "conflict")];
        let cause = attribute_cancellation(TransactionKind::CreateCard, Some(&conflict));
        assert!(matches!(
            classify_cancellation(TransactionKind::CreateCard, &cause, "c1"),
            CardError::Internal(_)
        ));
    }

    #[test]
    fn test_delete_card_failure_is_not_found() {
        let cause = attribute_cancellation(TransactionKind::DeleteCard, Some(&[failed(), ok(), ok()]));
        assert_eq!(cause, CancellationCause::CardPrecondition);
        let cause = attribute_cancellation(TransactionKind::DeleteCard, Some(&[failed(), ok()]));
        assert_eq!(cause, CancellationCause::CardPrecondition);
        assert!(matches!(
            classify_cancellation(TransactionKind::DeleteCard, &cause, "c1"),
            CardError::CardNotFound(id) if id == "c1"
        ));
    }

    #[test]
    fn test_delete_counter_failure_is_internal() {
        let cause = attribute_cancellation(TransactionKind::DeleteCard, Some(&[ok(), failed(), ok()]));
        assert_eq!(cause, CancellationCause::CounterPrecondition);
        match classify_cancellation(TransactionKind::DeleteCard, &cause, "c1") {
            CardError::Internal(msg) => assert!(msg.contains("card_count")),
            other => panic!("expected internal error, got {:?}", other),
        }
    }

    #[test]
    fn test_delete_card_checked_before_counter() {
        // A lost race on the last card fails the card and the zeroed counter together
        let cause = attribute_cancellation(TransactionKind::DeleteCard, Some(&[failed(), failed()]));
        assert_eq!(cause, CancellationCause::CardPrecondition);
        assert!(matches!(
            classify_cancellation(TransactionKind::DeleteCard, &cause, "c1"),
            CardError::CardNotFound(_)
        ));

        // Create still reports the limit when both items fail
        let cause = attribute_cancellation(TransactionKind::CreateCard, Some(&[failed(), failed()]));
        assert_eq!(cause, CancellationCause::CounterPrecondition);
    }

    #[test]
    fn test_short_reason_list_does_not_panic() {
        let cause = attribute_cancellation(TransactionKind::DeleteCard, Some(&[ok()]));
        assert!(matches!(cause, CancellationCause::Other(_)));
    }

    #[tokio::test]
    async fn test_delete_without_counter_reports_drift() {
        let store = Arc::new(MemoryStore::new());
        let tables = TableNames::default();
        let card = Card::new("u1", "Q".to_string(), "A".to_string(), chrono::Utc::now());

        // Card present, counter record absent
        store
            .put_item(&tables.cards, &Key::composite("u1", &card.card_id), card.to_item(), None)
            .await
            .unwrap();

        let coordinator = TransactionCoordinator::new(store.clone(), tables.clone());
        let result = coordinator.delete_card("u1", &card.card_id, &[]).await;
        assert!(matches!(result, Err(CardError::Internal(_))));

        // Nothing was removed
        assert!(store
            .get_item(&tables.cards, &Key::composite("u1", &card.card_id))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_delete_rejects_oversized_audit_list() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = TransactionCoordinator::new(store, TableNames::default());
        let keys: Vec<Key> = (0..=MAX_AUDIT_DELETES).map(|i| Key::composite("u1", format!("c1#{}", i))).collect();
        let result = coordinator.delete_card("u1", "c1", &keys).await;
        assert!(matches!(result, Err(CardError::Internal(_))));
    }
}
