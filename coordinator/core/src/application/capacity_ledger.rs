// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Capacity Ledger
//!
//! The only sanctioned writer of an activity's reserved-seat counter. Both
//! operations run inside the caller's unit of work so a seat is reserved or
//! released atomically with the application transition that caused it.

use tracing::debug;

use crate::domain::activity::ActivityId;
use crate::domain::error::CoordinatorError;
use crate::domain::repository::{RepositoryError, SeatReservation, UnitOfWork};

#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityLedger;

impl CapacityLedger {
    pub fn new() -> Self {
        Self
    }

    /// Take one seat, failing with `CapacityExceeded` when the maximum is
    /// reached. Returns the new reserved-seat count.
    pub async fn reserve(
        &self,
        tx: &mut dyn UnitOfWork,
        activity_id: ActivityId,
    ) -> Result<u32, CoordinatorError> {
        match tx.try_reserve_seat(activity_id).await {
            Ok(SeatReservation::Reserved(count)) => {
                debug!(activity_id = %activity_id, reserved = count, "Seat reserved");
                metrics::counter!("volunteer_seats_reserved_total").increment(1);
                Ok(count)
            }
            Ok(SeatReservation::Full) => {
                metrics::counter!("volunteer_seat_reservations_rejected_total").increment(1);
                Err(CoordinatorError::CapacityExceeded(activity_id))
            }
            Err(RepositoryError::NotFound(_)) => {
                Err(CoordinatorError::not_found("activity", activity_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Give back one seat, floored at zero. Returns the new count.
    pub async fn release(
        &self,
        tx: &mut dyn UnitOfWork,
        activity_id: ActivityId,
    ) -> Result<u32, CoordinatorError> {
        match tx.release_seat(activity_id).await {
            Ok(count) => {
                debug!(activity_id = %activity_id, reserved = count, "Seat released");
                metrics::counter!("volunteer_seats_released_total").increment(1);
                Ok(count)
            }
            Err(RepositoryError::NotFound(_)) => {
                Err(CoordinatorError::not_found("activity", activity_id))
            }
            Err(e) => Err(e.into()),
        }
    }
}
