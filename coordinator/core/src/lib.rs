// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Volunteer Coordinator Core
//!
//! Activity lifecycle, capacity accounting and attendance verification for
//! volunteer activities.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Domain:** aggregates, value objects and repository contracts
//! - **Application:** workflow services driving the aggregates inside a unit of work
//! - **Infrastructure:** in-memory and PostgreSQL persistence, event bus

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
