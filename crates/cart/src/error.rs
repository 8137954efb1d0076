//! Cart error type and Sentry helpers.
//!
//! Every cart operation returns `Result<T, CartError>`. Failures are logged at
//! the point they happen (with `user_id`/`product_id` fields) and then handed
//! back to the caller, which decides whether to retry, show an error, or
//! ignore it. Local cart state is never partially updated on failure.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The remote store rejected or failed the operation.
    #[error("cart store error: {0}")]
    Store(#[from] StoreError),

    /// `add_item` was called with a non-positive quantity delta.
    #[error("quantity to add must be positive (got {0})")]
    InvalidQuantity(i32),
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Set the Sentry user context from a user ID.
///
/// Called when a user's cart is adopted so errors are associated with them.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Called on sign-out to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Removed item", Some(&[("product_id", "9f0c...")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
