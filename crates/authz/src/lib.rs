//! Authorization guards for catalog operations.
//!
//! Handlers build a [`Principal`] from the session user and call
//! [`authorize`] before doing any work that mutates the catalog.

use serde::Serialize;

/// The authenticated subject a decision is made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: i64,
    pub is_superuser: bool,
}

/// Operations guarded by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ListBooks,
    CreateBook,
    UpdateBook,
    DeleteBook,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ListBooks => "list_books",
            Action::CreateBook => "create_book",
            Action::UpdateBook => "update_book",
            Action::DeleteBook => "delete_book",
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { reason: &'static str },
}

/// Decide whether `principal` may perform `action`.
///
/// Every authenticated user may browse, create and edit books. Deleting is
/// reserved to superusers.
pub fn authorize(principal: &Principal, action: Action) -> Decision {
    let decision = match action {
        Action::ListBooks | Action::CreateBook | Action::UpdateBook => Decision::Allow,
        Action::DeleteBook if principal.is_superuser => Decision::Allow,
        Action::DeleteBook => Decision::Deny {
            reason: "superuser required",
        },
    };

    if let Decision::Deny { reason } = decision {
        tracing::warn!(
            target: "bookshelf-authz",
            user_id = principal.user_id,
            action = action.as_str(),
            reason,
            "authorization denied"
        );
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER: Principal = Principal {
        user_id: 7,
        is_superuser: false,
    };
    const ADMIN: Principal = Principal {
        user_id: 1,
        is_superuser: true,
    };

    #[test]
    fn members_may_edit_but_not_delete() {
        assert_eq!(authorize(&MEMBER, Action::ListBooks), Decision::Allow);
        assert_eq!(authorize(&MEMBER, Action::CreateBook), Decision::Allow);
        assert_eq!(authorize(&MEMBER, Action::UpdateBook), Decision::Allow);
        assert_eq!(
            authorize(&MEMBER, Action::DeleteBook),
            Decision::Deny {
                reason: "superuser required"
            }
        );
    }

    #[test]
    fn superusers_may_do_everything() {
        for action in [
            Action::ListBooks,
            Action::CreateBook,
            Action::UpdateBook,
            Action::DeleteBook,
        ] {
            assert_eq!(authorize(&ADMIN, action), Decision::Allow, "{:?}", action);
        }
    }
}
