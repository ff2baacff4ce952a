// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod argument_extractor;
pub mod bootstrap;
pub mod dispatch_service;
pub mod reference_resolver;
pub mod repository_factory;
pub mod tool_invocation_service;

pub use argument_extractor::ArgumentExtractor;
pub use bootstrap::DispatchRuntime;
pub use dispatch_service::{
    DispatchComponents, DispatchOrchestrator, DispatchService, DispatchSettings, UserInsights,
};
pub use reference_resolver::ReferenceResolver;
pub use repository_factory::{create_repositories, Repositories};
pub use tool_invocation_service::{ToolInvocation, ToolInvocationService};
