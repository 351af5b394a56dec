//! # Concierge
//!
//! A tiered retrieval-and-answer chat service for a single firm's knowledge
//! base.
//!
//! Each question is answered by the cheapest tier that can handle it:
//!
//! 1. **Fast path**: one oracle call over a short overview document.
//! 2. **Routing**: the oracle picks up to three documents from the index.
//! 3. **Synthesis**: the oracle answers from those documents only, or
//!    conversationally when none apply.
//!
//! A per-client sliding-window rate limiter guards the HTTP endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────────────────────┐
//! │  HTTP    │──▶│ Admission │──▶│ Pipeline                     │
//! │ /chat    │   │ (per-IP)  │   │ fast path → router → synth   │
//! └──────────┘   └───────────┘   └──────────────┬───────────────┘
//!                                               │
//!                          ┌────────────────────┤
//!                          ▼                    ▼
//!                   ┌────────────┐       ┌────────────┐
//!                   │   Corpus   │       │   Oracle   │
//!                   │ index+docs │       │   (LLM)    │
//!                   └────────────┘       └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`corpus`] | Index, overview and document loading |
//! | [`oracle`] | Language-model abstraction |
//! | [`history`] | Conversation history adapter |
//! | [`admission`] | Per-client rate limiting |
//! | [`fast_path`] | Overview-only answers |
//! | [`routing`] | Document selection |
//! | [`synthesis`] | Grounded and ungrounded replies |
//! | [`pipeline`] | Tier orchestration |
//! | [`server`] | HTTP server |

pub mod admission;
pub mod config;
pub mod corpus;
pub mod fast_path;
pub mod history;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod routing;
pub mod server;
pub mod synthesis;
