//! # PDF-QA
//!
//! Ask natural-language questions about your PDFs, grounded in their
//! content.
//!
//! PDF-QA ingests a PDF, splits the extracted text into overlapping
//! chunks, embeds them, and builds a per-document vector index persisted
//! in SQLite. A question is answered by retrieving the most similar
//! chunks and asking the configured language model for an answer grounded
//! in those excerpts.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────┐   ┌──────────┐
//! │  PDF file │──▶│ extract → chunk →    │──▶│  SQLite   │
//! │  (ingest) │   │ embed → vector index │   │ (indexes) │
//! └───────────┘   └──────────────────────┘   └────┬─────┘
//!                                                 │
//! ┌───────────┐   ┌──────────────────────┐        │
//! │ question  │──▶│ embed → top-k search │◀───────┘
//! │  (ask)    │   │ → grounded prompt →  │──▶ answer + sources
//! └───────────┘   │ completion           │
//!                 └──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed pipeline errors |
//! | [`chunk`] | Overlapping-window text chunking |
//! | [`extract`] | PDF text extraction |
//! | [`provider`] | Language-model provider abstraction |
//! | [`embedder`] | Embedding batching and normalization |
//! | [`index`] | Per-document vector index |
//! | [`store`] | Index persistence |
//! | [`jobs`] | Indexing job controller |
//! | [`qa`] | Retrieval-augmented question answering |

pub mod chunk;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedder;
pub mod error;
pub mod extract;
pub mod get;
pub mod index;
pub mod ingest;
pub mod jobs;
pub mod migrate;
pub mod models;
pub mod provider;
pub mod qa;
pub mod store;
