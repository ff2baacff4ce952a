// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the learning and memory context

pub mod embedding_client;
pub mod in_memory;
pub mod repository;
pub mod sled_store;

pub use embedding_client::{HashEmbeddingClient, DEFAULT_EMBEDDING_DIMENSIONS};
pub use in_memory::{InMemorySessionRepository, InMemoryToolProfileRepository, InMemoryVectorIndex};
pub use repository::{
    EmbeddingError, EmbeddingProvider, RepositoryError, SessionRepository, ToolProfileRepository,
    VectorIndex,
};
pub use sled_store::{SledSessionRepository, SledStore, SledToolProfileRepository, SledVectorIndex};
