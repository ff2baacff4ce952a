// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Stand-in executor for hosts without real tool backends

use async_trait::async_trait;
use concierge_cortex::domain::ToolId;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::domain::dispatch::{ToolExecutionError, ToolExecutor};

/// Echoes the tool name and arguments. Tools with a result marker prefix
/// each string argument with it so later references can find the items.
#[derive(Debug, Clone, Default)]
pub struct EchoToolExecutor {
    markers: HashMap<ToolId, String>,
}

impl EchoToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_marker(mut self, tool_id: ToolId, marker: impl Into<String>) -> Self {
        self.markers.insert(tool_id, marker.into());
        self
    }
}

#[async_trait]
impl ToolExecutor for EchoToolExecutor {
    async fn execute(&self, tool_id: &ToolId, arguments: &Map<String, Value>) -> Result<String, ToolExecutionError> {
        let mut lines = vec![format!("[{}]", tool_id)];
        let marker = self.markers.get(tool_id);
        for (name, value) in arguments {
            match (marker, value) {
                (Some(marker), Value::String(s)) => lines.push(format!("{} {}", marker, s)),
                (_, Value::String(s)) => lines.push(format!("{}: {}", name, s)),
                (_, other) => lines.push(format!("{}: {}", name, other)),
            }
        }
        Ok(lines.join("\n"))
    }
}
