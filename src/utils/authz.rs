// src/utils/authz.rs

use crate::error::AppError;
use crate::models::user::Role;

/// Verified identity claim, decoded once from the bearer token.
/// Handlers receive this through request extensions; the core never reads
/// ambient session state.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub role: Role,
    pub name: String,
}

/// Optional identity for routes that serve anonymous viewers too.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Identity>);

/// A named permission check bound to a specific resource instance.
/// Ownership is carried in the capability itself, re-derived per request
/// from the target row, so a grant on one course never leaks to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateCourse,
    ManageCourse { responsible_user_id: i64 },
    ManageUsers,
    EnrollSelf,
    InviteAttendee { responsible_user_id: i64 },
    EditQuiz { responsible_user_id: i64 },
    ViewDashboard,
}

/// Decides whether `identity` may exercise `capability`.
///
/// * No identity always yields `Unauthenticated`, distinct from `Forbidden`,
///   so callers can choose between a login redirect and an access-denied page.
/// * Admins pass every check.
/// * Instructors pass course-scoped checks only on courses they own.
/// * Learners pass self-enrollment and their own dashboard.
pub fn authorize(identity: Option<&Identity>, capability: Capability) -> Result<(), AppError> {
    let identity = identity.ok_or(AppError::Unauthenticated)?;

    if identity.role == Role::Admin {
        return Ok(());
    }

    let allowed = match capability {
        Capability::CreateCourse => identity.role == Role::Instructor,
        Capability::ManageCourse {
            responsible_user_id,
        }
        | Capability::InviteAttendee {
            responsible_user_id,
        }
        | Capability::EditQuiz {
            responsible_user_id,
        } => identity.role == Role::Instructor && identity.id == responsible_user_id,
        Capability::ManageUsers => false,
        Capability::EnrollSelf => identity.role == Role::Learner,
        Capability::ViewDashboard => true,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: i64, role: Role) -> Identity {
        Identity {
            id,
            role,
            name: "Test User".to_string(),
        }
    }

    #[test]
    fn missing_identity_is_unauthenticated_not_forbidden() {
        let err = authorize(None, Capability::EnrollSelf).unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[test]
    fn admin_passes_everything() {
        let admin = identity(1, Role::Admin);
        for cap in [
            Capability::CreateCourse,
            Capability::ManageCourse {
                responsible_user_id: 99,
            },
            Capability::ManageUsers,
            Capability::EnrollSelf,
            Capability::InviteAttendee {
                responsible_user_id: 99,
            },
            Capability::EditQuiz {
                responsible_user_id: 99,
            },
            Capability::ViewDashboard,
        ] {
            assert!(authorize(Some(&admin), cap).is_ok());
        }
    }

    #[test]
    fn instructor_passes_only_on_owned_courses() {
        let instructor = identity(5, Role::Instructor);
        assert!(authorize(
            Some(&instructor),
            Capability::ManageCourse {
                responsible_user_id: 5
            }
        )
        .is_ok());
        assert!(matches!(
            authorize(
                Some(&instructor),
                Capability::ManageCourse {
                    responsible_user_id: 6
                }
            ),
            Err(AppError::Forbidden)
        ));
        assert!(authorize(
            Some(&instructor),
            Capability::EditQuiz {
                responsible_user_id: 5
            }
        )
        .is_ok());
        assert!(matches!(
            authorize(Some(&instructor), Capability::ManageUsers),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn learner_passes_only_self_enrollment_and_dashboard() {
        let learner = identity(3, Role::Learner);
        assert!(authorize(Some(&learner), Capability::EnrollSelf).is_ok());
        assert!(authorize(Some(&learner), Capability::ViewDashboard).is_ok());
        assert!(matches!(
            authorize(Some(&learner), Capability::CreateCourse),
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            authorize(
                Some(&learner),
                Capability::ManageCourse {
                    responsible_user_id: 3
                }
            ),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn ownership_is_per_resource() {
        let instructor = identity(5, Role::Instructor);
        assert!(authorize(
            Some(&instructor),
            Capability::InviteAttendee {
                responsible_user_id: 5
            }
        )
        .is_ok());
        // owning one course grants nothing on another
        assert!(matches!(
            authorize(
                Some(&instructor),
                Capability::InviteAttendee {
                    responsible_user_id: 8
                }
            ),
            Err(AppError::Forbidden)
        ));
    }
}
