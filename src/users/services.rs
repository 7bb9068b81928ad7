use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::{
    auth::services::is_valid_email,
    error::{ApiError, ApiResult},
    images::services::optional_media_url,
    recipes::{dto::RecipeMinified, repo as recipe_repo},
    state::AppState,
    users::{
        dto::{PublicUser, RegisterRequest, UserWithRecipes},
        repo_types::{SubscriptionRow, UserProfileRow},
    },
};

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_NAME_FIELD_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn require_field(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("Field '{field}' is required.")));
    }
    if value.chars().count() > MAX_NAME_FIELD_LENGTH {
        return Err(ApiError::validation(format!(
            "Field '{field}' must be at most {MAX_NAME_FIELD_LENGTH} characters."
        )));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }
    Ok(())
}

/// Normalises the email and checks every field of a registration request.
pub fn validate_registration(req: &mut RegisterRequest) -> ApiResult<()> {
    req.email = req.email.trim().to_lowercase();
    if req.email.len() > MAX_EMAIL_LENGTH || !is_valid_email(&req.email) {
        return Err(ApiError::validation("Enter a valid email address."));
    }
    require_field(&req.username, "username")?;
    if !is_valid_username(&req.username) {
        return Err(ApiError::validation(
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        ));
    }
    require_field(&req.first_name, "first_name")?;
    require_field(&req.last_name, "last_name")?;
    validate_password(&req.password)
}

pub fn ensure_not_self(user_id: i64, author_id: i64) -> ApiResult<()> {
    if user_id == author_id {
        return Err(ApiError::validation("You cannot subscribe to yourself."));
    }
    Ok(())
}

pub async fn public_user(st: &AppState, row: UserProfileRow) -> ApiResult<PublicUser> {
    let avatar = optional_media_url(st, row.avatar.as_deref()).await?;
    Ok(PublicUser {
        email: row.email,
        id: row.id,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        is_subscribed: row.is_subscribed,
        avatar,
    })
}

/// Attach each author's newest recipes, at most `recipes_limit` per author.
pub async fn with_recipes(
    st: &AppState,
    rows: Vec<SubscriptionRow>,
    recipes_limit: Option<i64>,
) -> ApiResult<Vec<UserWithRecipes>> {
    let author_ids: Vec<i64> = rows.iter().map(|r| r.author.id).collect();
    let mut by_author: HashMap<i64, Vec<RecipeMinified>> = HashMap::new();
    for recipe in recipe_repo::list_minified_by_authors(&st.db, &author_ids, recipes_limit).await? {
        let author_id = recipe.author_id;
        let minified = RecipeMinified::resolve(st, recipe).await?;
        by_author.entry(author_id).or_default().push(minified);
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let recipes = by_author.remove(&row.author.id).unwrap_or_default();
        out.push(UserWithRecipes {
            user: public_user(st, row.author).await?,
            recipes,
            recipes_count: row.recipes_count,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: "  Cook@Example.com ".into(),
            username: "cook.master+1".into(),
            first_name: "Ivan".into(),
            last_name: "Petrov".into(),
            password: "long-enough-password".into(),
        }
    }

    #[test]
    fn registration_normalises_email() {
        let mut req = request();
        validate_registration(&mut req).unwrap();
        assert_eq!(req.email, "cook@example.com");
    }

    #[test]
    fn registration_rejects_bad_username() {
        let mut req = request();
        req.username = "bad name!".into();
        assert!(matches!(validate_registration(&mut req), Err(ApiError::Validation(_))));
    }

    #[test]
    fn registration_rejects_missing_names_and_short_password() {
        let mut req = request();
        req.first_name = "  ".into();
        assert!(validate_registration(&mut req).is_err());

        let mut req = request();
        req.last_name = "x".repeat(MAX_NAME_FIELD_LENGTH + 1);
        assert!(validate_registration(&mut req).is_err());

        let mut req = request();
        req.password = "short".into();
        assert!(validate_registration(&mut req).is_err());
    }

    #[test]
    fn username_allows_unicode_word_chars() {
        assert!(is_valid_username("повар_2024"));
        assert!(is_valid_username("a.b@c+d-e"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("with space"));
    }

    #[test]
    fn self_subscription_is_always_rejected() {
        for id in [1, 42, i64::MAX] {
            assert!(matches!(ensure_not_self(id, id), Err(ApiError::Validation(_))));
        }
        assert!(ensure_not_self(1, 2).is_ok());
    }

    #[tokio::test]
    async fn public_user_resolves_avatar_url() {
        let st = AppState::fake();
        let row = UserProfileRow {
            id: 3,
            email: "a@b.cd".into(),
            username: "a".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            avatar: Some("users/3/x.png".into()),
            is_subscribed: true,
        };
        let user = public_user(&st, row).await.unwrap();
        assert_eq!(user.avatar.as_deref(), Some("https://fake.local/users/3/x.png"));
        assert!(user.is_subscribed);
    }
}
