// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure Layer
//!
//! Adapters for the ports the domain defines: PostgreSQL and in-memory
//! persistence, the connection pool with its embedded migrations, and the
//! in-process event bus.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Implement domain interfaces over concrete technology

pub mod db;
pub mod event_bus;
pub mod repositories;
