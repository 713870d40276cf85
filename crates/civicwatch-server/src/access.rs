//! The access-control layer. Every operation that needs an
//! authorization decision goes through these two predicates; no handler
//! re-implements them inline. Callers confirm existence first so a
//! missing issue always surfaces as not-found rather than forbidden.

use crate::auth::Identity;
use civicwatch_api::ApiError;
use civicwatch_model::UserId;
use civicwatch_store::IssueFilter;

/// Admin-only operations: status/priority/notes updates, statistics.
pub fn ensure_admin(identity: &Identity) -> Result<(), ApiError> {
    if identity.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("admin access required"))
    }
}

/// Owner-or-admin operations: single-issue detail, deletion.
pub fn ensure_owner_or_admin(identity: &Identity, owner: &UserId) -> Result<(), ApiError> {
    if identity.role.is_admin() || identity.user == *owner {
        Ok(())
    } else {
        Err(ApiError::forbidden("not authorized for this issue"))
    }
}

/// Narrows a list filter to the caller's own issues unless the caller is
/// an admin, regardless of what the request supplied.
#[must_use]
pub fn scope_filter(identity: &Identity, mut filter: IssueFilter) -> IssueFilter {
    if !identity.role.is_admin() {
        filter.reported_by = Some(identity.user.clone());
    }
    filter
}
