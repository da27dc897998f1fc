//! # askdoc
//!
//! Document question answering over a local corpus: ingest documents into
//! an object store and a vector index, then answer questions grounded in
//! the most relevant chunks.
//!
//! ```text
//!              ingest                         ask
//!   bytes ──► extract ──► chunk ──► embed     question ──► embed
//!     │                               │                      │
//!     ▼                               ▼                      ▼
//!  ObjectStore                   VectorIndex ◄──── similarity search
//!  (originals)                  (chunks + vectors)           │
//!                                                            ▼
//!                                             relevance gate ──► prompt ──► LLM
//! ```
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`config`] | TOML configuration and validation |
//! | [`error`] | Crate error type |
//! | [`extract`] | Format detection and text extraction (PDF, text, Markdown) |
//! | [`chunk`] | Deterministic fixed-width chunking and chunk ids |
//! | [`store`] | Object store trait, filesystem and in-memory backends |
//! | [`index`] | Vector index trait and in-memory backend |
//! | [`index_sqlite`] | SQLite-backed vector index |
//! | [`db`] | SQLite pool setup |
//! | [`embedding`] | Embedding client trait, OpenAI backend, vector codecs |
//! | [`generate`] | Generation client trait and OpenAI backend |
//! | [`ingest`] | Ingestion pipeline: store, extract, chunk, embed, upsert |
//! | [`retrieve`] | Similarity search with relevance gating |
//! | [`answer`] | Prompt assembly and question answering |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generate;
pub mod index;
pub mod index_sqlite;
pub mod ingest;
pub mod retrieve;
pub mod store;

pub use error::{Error, Result};
