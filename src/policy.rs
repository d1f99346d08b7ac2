//! Object-level permission predicates.
//!
//! Pure functions of (principal, target) — no storage access, no ambient
//! request state. Handlers resolve the principal and the target row first,
//! then ask. A `false` here surfaces as an authorization failure; it is the
//! handler's job to pick 403 or 404.

use crate::storage::{AssignmentRow, TaskRow, UserRow};

/// The authenticated identity acting on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub is_staff: bool,
}

impl Principal {
    pub fn from_user(user: &UserRow) -> Self {
        Self {
            id: user.id.clone(),
            is_staff: user.is_staff,
        }
    }
}

/// Task write-gate: update/delete only for the creator or staff.
/// Reads are not gated at all.
pub fn can_write_task(principal: &Principal, task: &TaskRow) -> bool {
    principal.is_staff || task.creator_id == principal.id
}

/// Self-or-admin gate on user records.
pub fn can_access_user(principal: &Principal, user_id: &str) -> bool {
    principal.is_staff || principal.id == user_id
}

/// Assignment access gate: staff, the referenced task's creator, or the
/// assignee on the row.
pub fn can_access_assignment(principal: &Principal, assignment: &AssignmentRow) -> bool {
    principal.is_staff
        || assignment.task_creator_id == principal.id
        || assignment.user_id == principal.id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str, is_staff: bool) -> Principal {
        Principal {
            id: id.to_string(),
            is_staff,
        }
    }

    fn task(creator_id: &str) -> TaskRow {
        TaskRow {
            id: "t1".into(),
            title: "Ship report".into(),
            description: String::new(),
            due_date: None,
            priority: "medium".into(),
            status: "pending".into(),
            creator_id: creator_id.into(),
            created_at: "2026-01-01T00:00:00+00:00".into(),
            assigned_count: 0,
        }
    }

    fn assignment(user_id: &str, task_creator_id: &str) -> AssignmentRow {
        AssignmentRow {
            id: "a1".into(),
            user_id: user_id.into(),
            task_id: "t1".into(),
            status: "assigned".into(),
            created_at: "2026-01-01T00:00:00+00:00".into(),
            task_title: "Ship report".into(),
            task_due_date: None,
            task_creator_id: task_creator_id.into(),
        }
    }

    #[test]
    fn creator_can_write_own_task() {
        assert!(can_write_task(&principal("u1", false), &task("u1")));
    }

    #[test]
    fn non_creator_cannot_write_task() {
        assert!(!can_write_task(&principal("u2", false), &task("u1")));
    }

    #[test]
    fn staff_can_write_any_task() {
        assert!(can_write_task(&principal("admin", true), &task("u1")));
    }

    #[test]
    fn user_can_access_own_record_only() {
        let p = principal("u1", false);
        assert!(can_access_user(&p, "u1"));
        assert!(!can_access_user(&p, "u2"));
    }

    #[test]
    fn staff_can_access_any_user_record() {
        let admin = principal("admin", true);
        assert!(can_access_user(&admin, "u1"));
        assert!(can_access_user(&admin, "u2"));
    }

    #[test]
    fn assignee_can_access_own_assignment() {
        assert!(can_access_assignment(
            &principal("u2", false),
            &assignment("u2", "u1")
        ));
    }

    #[test]
    fn task_creator_can_access_assignment() {
        assert!(can_access_assignment(
            &principal("u1", false),
            &assignment("u2", "u1")
        ));
    }

    #[test]
    fn unrelated_user_cannot_access_assignment() {
        assert!(!can_access_assignment(
            &principal("u3", false),
            &assignment("u2", "u1")
        ));
    }

    #[test]
    fn staff_can_access_any_assignment() {
        assert!(can_access_assignment(
            &principal("admin", true),
            &assignment("u2", "u1")
        ));
    }
}
