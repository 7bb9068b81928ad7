//! Rows for tests that run against a real database (`#[sqlx::test]`).
//! Such tests are ignored by default; run them with
//! `DATABASE_URL=... cargo test -- --ignored`.

use sqlx::PgPool;

use crate::{
    recipes::short_hash,
    users::repo_types::{NewUser, User},
};

pub async fn user(db: &PgPool, username: &str) -> i64 {
    let email = format!("{username}@example.com");
    User::create(
        db,
        &NewUser {
            email: &email,
            username,
            first_name: "Test",
            last_name: "Cook",
            password_hash: "not-a-real-hash",
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn tag(db: &PgPool, slug: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO tags (name, slug) VALUES ($1, $1) RETURNING id")
        .bind(slug)
        .fetch_one(db)
        .await
        .unwrap()
}

pub async fn ingredient(db: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, 'g') RETURNING id",
    )
    .bind(name)
    .fetch_one(db)
    .await
    .unwrap()
}

/// Bare recipe row without tags or ingredients.
pub async fn recipe(db: &PgPool, author_id: i64, name: &str) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO recipes (author_id, name, text, image, cooking_time, short_hash)
        VALUES ($1, $2, 'text', 'recipes/images/x.png', 10, $3)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(name)
    .bind(short_hash::candidate())
    .fetch_one(db)
    .await
    .unwrap()
}

/// `SELECT COUNT(*)` over `sql`, which must bind exactly `$1`.
pub async fn count(db: &PgPool, sql: &str, id: i64) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(db).await.unwrap()
}
