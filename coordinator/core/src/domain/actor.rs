// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Actor
//!
//! The authenticated caller handed to the core by the identity collaborator.
//! Authentication happens upstream; the core only scopes what an actor may
//! manage by role and organization.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::CoordinatorError;

/// Unique identifier for a user (student, organizer or admin)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Unauthenticated visitor; may only browse open activities
    Anonymous,
    Student,
    Organizer,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Anonymous => write!(f, "anonymous"),
            Role::Student => write!(f, "student"),
            Role::Organizer => write!(f, "organizer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Organization affiliation, only meaningful for organizers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Actor {
    pub fn anonymous() -> Self {
        Self {
            user_id: UserId(uuid::Uuid::nil()),
            role: Role::Anonymous,
            organization: None,
        }
    }

    pub fn student(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Student,
            organization: None,
        }
    }

    pub fn organizer(user_id: UserId, organization: impl Into<String>) -> Self {
        Self {
            user_id,
            role: Role::Organizer,
            organization: Some(organization.into()),
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            organization: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.role == Role::Anonymous
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }

    pub fn is_organizer(&self) -> bool {
        self.role == Role::Organizer
    }

    /// Admins manage everything; organizers manage their own organization.
    pub fn manages(&self, organization: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Organizer => self.organization.as_deref() == Some(organization),
            Role::Student | Role::Anonymous => false,
        }
    }

    pub fn require_student(&self) -> Result<(), CoordinatorError> {
        if self.is_student() {
            Ok(())
        } else {
            Err(CoordinatorError::PermissionDenied(
                "only students may perform this action".to_string(),
            ))
        }
    }

    pub fn require_admin(&self) -> Result<(), CoordinatorError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(CoordinatorError::PermissionDenied(
                "only administrators may perform this action".to_string(),
            ))
        }
    }

    pub fn require_manager_of(&self, organization: &str) -> Result<(), CoordinatorError> {
        if self.manages(organization) {
            Ok(())
        } else {
            Err(CoordinatorError::PermissionDenied(
                "you do not manage activities of this organization".to_string(),
            ))
        }
    }

    /// Organization of an organizer, rejecting organizers without one.
    pub fn organizer_organization(&self) -> Result<&str, CoordinatorError> {
        match (&self.role, self.organization.as_deref()) {
            (Role::Organizer, Some(org)) if !org.trim().is_empty() => Ok(org),
            (Role::Organizer, _) => Err(CoordinatorError::PermissionDenied(
                "organizer has no organization affiliation".to_string(),
            )),
            _ => Err(CoordinatorError::PermissionDenied(
                "only organizers may perform this action".to_string(),
            )),
        }
    }
}
