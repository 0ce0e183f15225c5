// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Aggregates (`Activity`, `Application`, `StudentCheckIn`,
//! `ActivityDeletionRequest`), value objects and the persistence contracts
//! they are stored through.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure business rules, free of infrastructure concerns

pub mod activity;
pub mod actor;
pub mod application;
pub mod check_in;
pub mod clock;
pub mod config;
pub mod deletion_request;
pub mod error;
pub mod events;
pub mod repository;
pub mod taxonomy;
