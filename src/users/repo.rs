use anyhow::Context;
use sqlx::PgPool;

use crate::users::repo_types::{NewUser, SubscriptionRow, User, UserProfileRow};

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, password_hash, avatar, is_staff, created_at";

// `$1` is always the viewer id (NULL for anonymous requests).
const PROFILE_COLUMNS: &str = r#"
    u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
    EXISTS (
        SELECT 1 FROM subscriptions s
         WHERE s.author_id = u.id AND s.user_id = $1
    ) AS is_subscribed
"#;

impl User {
    /// Find a user by email (the login identifier).
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    pub async fn exists_by_id(db: &PgPool, id: i64) -> anyhow::Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await
            .context("check user exists")?;
        Ok(found)
    }

    pub async fn email_or_username_taken(
        db: &PgPool,
        email: &str,
        username: &str,
    ) -> anyhow::Result<(bool, bool)> {
        let row: (bool, bool) = sqlx::query_as(
            r#"
            SELECT EXISTS (SELECT 1 FROM users WHERE email = $1),
                   EXISTS (SELECT 1 FROM users WHERE username = $2)
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(db)
        .await
        .context("check email/username uniqueness")?;
        Ok(row)
    }

    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, new: &NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.email)
        .bind(new.username)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.password_hash)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    pub async fn set_password_hash(db: &PgPool, id: i64, hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(db)
            .await
            .context("update password")?;
        Ok(())
    }

    /// Replace the avatar key, returning the previous one.
    pub async fn set_avatar(
        db: &PgPool,
        id: i64,
        key: Option<&str>,
    ) -> anyhow::Result<Option<String>> {
        let mut tx = db.begin().await.context("begin tx")?;
        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT avatar FROM users WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("lock user row")?;
        sqlx::query("UPDATE users SET avatar = $2 WHERE id = $1")
            .bind(id)
            .bind(key)
            .execute(&mut *tx)
            .await
            .context("update avatar")?;
        tx.commit().await.context("commit tx")?;
        Ok(previous.flatten())
    }
}

pub async fn profile(
    db: &PgPool,
    viewer: Option<i64>,
    id: i64,
) -> anyhow::Result<Option<UserProfileRow>> {
    let row = sqlx::query_as::<_, UserProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"
    ))
    .bind(viewer)
    .bind(id)
    .fetch_optional(db)
    .await
    .context("load user profile")?;
    Ok(row)
}

pub async fn profiles_by_ids(
    db: &PgPool,
    viewer: Option<i64>,
    ids: &[i64],
) -> anyhow::Result<Vec<UserProfileRow>> {
    let rows = sqlx::query_as::<_, UserProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ANY($2)"
    ))
    .bind(viewer)
    .bind(ids)
    .fetch_all(db)
    .await
    .context("load user profiles")?;
    Ok(rows)
}

pub async fn count_users(db: &PgPool) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await
        .context("count users")?;
    Ok(n)
}

pub async fn list_profiles(
    db: &PgPool,
    viewer: Option<i64>,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<UserProfileRow>> {
    let rows = sqlx::query_as::<_, UserProfileRow>(&format!(
        r#"
        SELECT {PROFILE_COLUMNS}
          FROM users u
         ORDER BY u.username
         LIMIT $2 OFFSET $3
        "#
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list users")?;
    Ok(rows)
}

/// Returns false when the pair already existed.
pub async fn insert_subscription(db: &PgPool, user_id: i64, author_id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query(
        r#"
        INSERT INTO subscriptions (user_id, author_id)
        VALUES ($1, $2)
        ON CONFLICT (author_id, user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(author_id)
    .execute(db)
    .await
    .context("insert subscription")?;
    Ok(res.rows_affected() == 1)
}

/// Returns false when there was nothing to delete.
pub async fn delete_subscription(db: &PgPool, user_id: i64, author_id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(db)
        .await
        .context("delete subscription")?;
    Ok(res.rows_affected() > 0)
}

pub async fn count_subscriptions(db: &PgPool, user_id: i64) -> anyhow::Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("count subscriptions")?;
    Ok(n)
}

const SUBSCRIPTION_QUERY: &str = r#"
    SELECT u.id, u.email, u.username, u.first_name, u.last_name, u.avatar,
           TRUE AS is_subscribed,
           (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
      FROM subscriptions s
      JOIN users u ON u.id = s.author_id
     WHERE s.user_id = $1
"#;

pub async fn list_subscriptions(
    db: &PgPool,
    user_id: i64,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<SubscriptionRow>> {
    let rows = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "{SUBSCRIPTION_QUERY} ORDER BY u.username LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
    .context("list subscriptions")?;
    Ok(rows)
}

pub async fn subscription(
    db: &PgPool,
    user_id: i64,
    author_id: i64,
) -> anyhow::Result<Option<SubscriptionRow>> {
    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
        "{SUBSCRIPTION_QUERY} AND s.author_id = $2"
    ))
    .bind(user_id)
    .bind(author_id)
    .fetch_optional(db)
    .await
    .context("load subscription")?;
    Ok(row)
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::fixtures;

    const PAIRS: &str = "SELECT COUNT(*) FROM subscriptions WHERE author_id = $1";

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn duplicate_subscription_keeps_one_row(db: PgPool) {
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;

        assert!(insert_subscription(&db, reader, author).await.unwrap());
        assert!(!insert_subscription(&db, reader, author).await.unwrap());
        assert_eq!(fixtures::count(&db, PAIRS, author).await, 1);
        assert_eq!(count_subscriptions(&db, reader).await.unwrap(), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn unsubscribing_missing_pair_changes_nothing(db: PgPool) {
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;
        let other = fixtures::user(&db, "other").await;
        insert_subscription(&db, other, author).await.unwrap();

        assert!(!delete_subscription(&db, reader, author).await.unwrap());
        assert_eq!(fixtures::count(&db, PAIRS, author).await, 1);

        assert!(delete_subscription(&db, other, author).await.unwrap());
        assert_eq!(fixtures::count(&db, PAIRS, author).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn self_subscription_is_refused_by_the_schema(db: PgPool) {
        let me = fixtures::user(&db, "me").await;
        assert!(insert_subscription(&db, me, me).await.is_err());
        assert_eq!(fixtures::count(&db, PAIRS, me).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires a Postgres DATABASE_URL"]
    async fn subscription_row_reports_recipe_count(db: PgPool) {
        let author = fixtures::user(&db, "author").await;
        let reader = fixtures::user(&db, "reader").await;
        fixtures::recipe(&db, author, "One").await;
        fixtures::recipe(&db, author, "Two").await;
        insert_subscription(&db, reader, author).await.unwrap();

        let row = subscription(&db, reader, author).await.unwrap().unwrap();
        assert_eq!(row.recipes_count, 2);
        assert!(row.author.is_subscribed);
    }
}
