//! # Grantmuse
//!
//! Document-grounded grant assistant backend for Canadian musicians.
//!
//! Grantmuse stores uploaded grant documents (guidelines, budgets, program
//! descriptions), extracts searchable text and metadata from them, and
//! answers questions by selecting the most relevant documents, excerpting
//! them, and forwarding excerpts plus the question to an external
//! text-generation API. Every answer comes back with the list of document
//! excerpts that informed it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────┐
//! │  Blob    │──▶│ Processor  │──▶│  SQLite   │
//! │  store   │   │ text+meta │   │ documents │
//! └──────────┘   └───────────┘   └────┬─────┘
//!                                     │
//!              user question          ▼
//!             ────────────▶ rank ─▶ snippet ─▶ chat ─▶ external LLM
//!                                                │
//!                                                ▼
//!                                     {response, sources}
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! gmuse init                          # create database
//! gmuse add guidelines.txt            # store a document
//! gmuse process <id>                  # extract text + metadata
//! gmuse ask "When is the FACTOR deadline?"
//! gmuse serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`storage`] | Filesystem blob store for uploaded files |
//! | [`process`] | Text extraction, category and tag detection |
//! | [`chunk`] | Paragraph-aligned text chunking |
//! | [`rank`] | Lexical relevance ranking |
//! | [`snippet`] | Query-relevant excerpt extraction |
//! | [`generation`] | External LLM client |
//! | [`chat`] | Answer orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`store`] | Document and interaction persistence |

pub mod chat;
pub mod chunk;
pub mod config;
pub mod db;
pub mod generation;
pub mod migrate;
pub mod models;
pub mod process;
pub mod rank;
pub mod server;
pub mod snippet;
pub mod storage;
pub mod store;
