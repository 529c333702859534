use tracing::{info, warn};

use crate::{
    auth::{
        credentials::{normalize_email, spawn_hash, spawn_verify, MIN_PASSWORD_LEN},
        repo_types::User,
    },
    error::{ApiError, ApiResult},
    state::AppState,
    users::dto::{ChangePasswordRequest, UpdateProfileRequest},
    validation::Rules,
};

pub async fn profile(state: &AppState, user_id: i64) -> ApiResult<User> {
    state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

pub async fn update_profile(
    state: &AppState,
    user_id: i64,
    req: UpdateProfileRequest,
) -> ApiResult<()> {
    profile(state, user_id).await?;

    let mut rules = Rules::new();
    let name = rules.required("name", &req.name).map(|n| n.trim().to_string());
    let email = rules.required("email", &req.email).map(normalize_email);
    if let Some(email) = &email {
        if rules.email("email", email) {
            let taken = state
                .users
                .find_by_email(email)
                .await?
                .is_some_and(|other| other.id != user_id);
            if taken {
                rules.fail("email", "The email field must contain a unique value.");
            }
        }
    }
    rules.finish()?;
    let (Some(name), Some(email)) = (name, email) else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };

    state
        .users
        .update_profile(user_id, &name, &email)
        .await
        .map_err(|e| e.for_field("email"))?;
    info!(user_id, email = %email, "profile updated");
    Ok(())
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    req: ChangePasswordRequest,
) -> ApiResult<()> {
    let mut rules = Rules::new();
    let old_password = rules.required("old_password", &req.old_password);
    let new_password = rules.required("new_password", &req.new_password);
    if let Some(new_password) = new_password {
        rules.min_len("new_password", new_password, MIN_PASSWORD_LEN);
    }
    if let Some(confirm) = rules.required("confirm_password", &req.confirm_password) {
        if Some(confirm) != new_password {
            rules.fail(
                "confirm_password",
                "The confirm_password field does not match the new_password field.",
            );
        }
    }
    rules.finish()?;
    let (Some(old_password), Some(new_password)) = (old_password, new_password) else {
        return Err(ApiError::validation("The submitted data is invalid."));
    };

    let user = profile(state, user_id).await?;
    if !spawn_verify(old_password, &user.password_hash).await? {
        warn!(user_id, "change password with wrong old password");
        return Err(ApiError::auth("Invalid old password."));
    }

    state
        .users
        .update_password(user_id, &spawn_hash(new_password).await?)
        .await?;
    info!(user_id, "password changed");
    Ok(())
}
