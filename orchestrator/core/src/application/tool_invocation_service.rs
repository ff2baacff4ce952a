// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use concierge_cortex::domain::{ToolId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::application::dispatch_service::DispatchService;
use crate::domain::dispatch::{RoutingDecision, ToolExecutor};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub tool: ToolId,
    pub output: String,
    pub success: bool,
}

/// Runs the routed tool and writes the result back as the assistant turn
pub struct ToolInvocationService {
    executor: Arc<dyn ToolExecutor>,
    dispatch: Arc<dyn DispatchService>,
}

impl ToolInvocationService {
    pub fn new(executor: Arc<dyn ToolExecutor>, dispatch: Arc<dyn DispatchService>) -> Self {
        Self { executor, dispatch }
    }

    /// Executor failures are recorded as a failed outcome and surface as an
    /// error string; only bookkeeping errors are returned.
    pub async fn invoke(&self, user_id: &UserId, decision: &RoutingDecision) -> Result<ToolInvocation> {
        let (output, success) = match self.executor.execute(&decision.tool, &decision.arguments).await {
            Ok(output) => (output, true),
            Err(e) => {
                warn!(user_id = %user_id, tool_id = %decision.tool, "Tool execution failed: {}", e);
                (format!("Error: {}", e), false)
            }
        };

        self.dispatch
            .complete_turn(user_id, &decision.tool, &output, success)
            .await?;

        Ok(ToolInvocation {
            tool: decision.tool.clone(),
            output,
            success,
        })
    }
}
