//! Headless edit pages: page guard, form state and lookup selects, driven through [`ResourceApi`].
//!
//! [`ResourceApi`]: crate::client::ResourceApi

mod edit;
mod select;

pub use edit::{edit_form_for, rental_edit_form, EditForm, FieldKind, FormField, SubmitOutcome};
pub use select::{AsyncSelect, SelectOption};

use crate::authz::{AccessOperation, AccessRequest, PolicyService, Session};
use crate::error::AppError;

/// Where a signed-out visitor is sent.
pub const SIGN_IN_REDIRECT: &str = "/";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageAccess {
    Granted,
    Redirect(String),
    Forbidden(String),
}

/// Page-level guard: a session is required, then the policy must allow `operation` on `entity`.
/// Policy transport failures are returned as errors.
pub async fn guard_page(
    policy: &dyn PolicyService,
    session: Option<&Session>,
    entity: &str,
    operation: AccessOperation,
) -> Result<PageAccess, AppError> {
    let Some(session) = session else {
        return Ok(PageAccess::Redirect(SIGN_IN_REDIRECT.to_string()));
    };
    let request = AccessRequest {
        session,
        entity,
        record_id: None,
        operation,
    };
    match policy.has_access(&request).await {
        Ok(()) => Ok(PageAccess::Granted),
        Err(AppError::Forbidden(msg)) => Ok(PageAccess::Forbidden(msg)),
        Err(e) => Err(e),
    }
}
