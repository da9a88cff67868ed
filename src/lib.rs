//! Memoru: a flashcard store with SM-2 spaced repetition
//!
//! - [`flashcards`]: cards, scheduling, due queries, and reviews
//! - [`kv`]: the key-value store contract and its backends
//! - [`config`]: configuration loading

pub mod config;
pub mod flashcards;
pub mod kv;
