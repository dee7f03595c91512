use tracing::{info, warn};

use crate::{
    auth::{
        dto::RegisterForm,
        password::{hash_password, verify_password},
        repo::UserRepo,
        repo_types::User,
    },
    error::AppError,
};

/// Creates the account. `DuplicateEmail` when the email is already registered.
pub async fn register(users: &dyn UserRepo, form: &RegisterForm) -> Result<User, AppError> {
    if users.find_by_email(&form.email).await?.is_some() {
        warn!(email = %form.email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }

    let hash = hash_password(&form.password)?;
    let user = users
        .create(&form.username, &form.email, &hash)
        .await?
        .ok_or(AppError::DuplicateEmail)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Unknown email and wrong password are indistinguishable to the caller.
pub async fn authenticate(
    users: &dyn UserRepo,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    let Some(user) = users.find_by_email(email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::MemoryUserRepo;

    fn form(email: &str, password: &str) -> RegisterForm {
        RegisterForm {
            username: "ana".into(),
            email: email.into(),
            password: password.into(),
            confirm_password: password.into(),
        }
    }

    #[tokio::test]
    async fn registered_user_can_authenticate_only_with_own_password() {
        let users = MemoryUserRepo::default();
        let created = register(&users, &form("ana@example.com", "hazelnut"))
            .await
            .expect("register");

        let user = authenticate(&users, "ana@example.com", "hazelnut")
            .await
            .expect("authenticate");
        assert_eq!(user.id, created.id);

        for wrong in ["Hazelnut", "hazelnut ", "", "walnut"] {
            let err = authenticate(&users, "ana@example.com", wrong).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidCredentials), "{wrong:?}");
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let users = MemoryUserRepo::default();
        register(&users, &form("ana@example.com", "hazelnut")).await.unwrap();
        let err = register(&users, &form("ana@example.com", "other-pass"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let users = MemoryUserRepo::default();
        let err = authenticate(&users, "ghost@example.com", "x").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn stored_password_is_hashed() {
        let users = MemoryUserRepo::default();
        let user = register(&users, &form("ana@example.com", "hazelnut")).await.unwrap();
        assert_ne!(user.password_hash, "hazelnut");
    }
}
