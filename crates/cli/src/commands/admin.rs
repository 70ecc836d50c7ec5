//! Admin user management commands.
//!
//! Accounts are created through the storefront's register endpoint; these
//! commands only change the role of an existing account.

use athleon_core::{Email, UserRole};
use athleon_storefront::db::UserRepository;

use super::{CommandError, connect};

/// Set the role of the account with `email`.
///
/// # Errors
///
/// Returns an error if the email is invalid, no account uses it, or the
/// database call fails.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), CommandError> {
    let email = Email::parse(email).map_err(|_| CommandError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;
    let users = UserRepository::new(&pool);

    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| CommandError::UserNotFound(email.to_string()))?;

    if user.role == role {
        tracing::info!("{} already has role {:?}", email, role);
        return Ok(());
    }

    let user = users.set_role(user.id, role).await?;
    tracing::info!(
        "Role updated! ID: {}, Email: {}, Role: {:?}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}
