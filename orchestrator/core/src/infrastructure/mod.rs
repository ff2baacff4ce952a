// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod tool_executor;

pub use event_bus::{DomainEvent, EventBus, EventBusError, EventReceiver, UserEventReceiver};
pub use tool_executor::EchoToolExecutor;
