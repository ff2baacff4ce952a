// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process dispatch engine for CLI commands
//!
//! Builds every service once from the discovered configuration. Tools are
//! served by the echo executor; real backends belong to the host.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use concierge_core::application::{DispatchOrchestrator, DispatchRuntime, ToolInvocation, ToolInvocationService};
use concierge_core::domain::dispatch::RoutingDecision;
use concierge_core::domain::dispatch_config::DispatchConfigManifest;
use concierge_core::infrastructure::EchoToolExecutor;
use concierge_cortex::domain::UserId;

const DEFAULT_CLIENT_ADDR: &str = "127.0.0.1";
const DEFAULT_CLIENT_AGENT: &str = concat!("concierge-cli/", env!("CARGO_PKG_VERSION"));

pub struct EmbeddedEngine {
    runtime: DispatchRuntime,
    invocations: ToolInvocationService,
}

impl EmbeddedEngine {
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config = DispatchConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
        Self::from_config(config).await
    }

    pub async fn from_config(config: DispatchConfigManifest) -> Result<Self> {
        let executor = echo_executor(&config);
        let runtime = DispatchRuntime::build(config)
            .await
            .context("Failed to start dispatch engine")?;
        let invocations = runtime.invocation_service(Arc::new(executor));
        Ok(Self { runtime, invocations })
    }

    pub fn runtime(&self) -> &DispatchRuntime {
        &self.runtime
    }

    pub fn dispatch(&self) -> &Arc<DispatchOrchestrator> {
        &self.runtime.dispatch
    }

    /// Explicit id, or one derived from the client address and agent
    pub fn resolve_user(&self, explicit: Option<&str>, addr: Option<&str>, agent: Option<&str>) -> UserId {
        self.runtime.identity.resolve(
            explicit,
            addr.unwrap_or(DEFAULT_CLIENT_ADDR),
            agent.unwrap_or(DEFAULT_CLIENT_AGENT),
        )
    }

    pub async fn execute(&self, user_id: &UserId, decision: &RoutingDecision) -> Result<ToolInvocation> {
        self.invocations.invoke(user_id, decision).await
    }

    /// Flush durable storage before exit
    pub async fn shutdown(self) -> Result<()> {
        self.runtime.flush().await
    }
}

/// Family members echo their results behind the family's marker
fn echo_executor(config: &DispatchConfigManifest) -> EchoToolExecutor {
    let mut executor = EchoToolExecutor::new();
    for family in &config.spec.families {
        let Some(marker) = &family.result_marker else {
            continue;
        };
        for tool in &family.tools {
            debug!(tool_id = %tool, family = %family.name, "Echo results carry family marker");
            executor = executor.with_marker(tool.clone(), marker.clone());
        }
    }
    executor
}
