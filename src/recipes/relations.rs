//! Per-user recipe membership: favorites and the shopping cart.
//! Both are (user, recipe) unique pairs stored in their own tables.

use anyhow::Context;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Favorite,
    ShoppingCart,
}

impl Relation {
    fn table(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping_carts",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Relation::Favorite => "favorites",
            Relation::ShoppingCart => "shopping cart",
        }
    }

    pub fn duplicate_message(self) -> String {
        format!("Recipe is already in {}.", self.label())
    }

    pub fn missing_message(self) -> String {
        format!("Recipe is not in {}.", self.label())
    }
}

/// Returns false when the pair already existed. The unique constraint keeps
/// concurrent duplicates out as well.
pub async fn add(db: &PgPool, relation: Relation, user_id: i64, recipe_id: i64) -> anyhow::Result<bool> {
    let sql = format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT (user_id, recipe_id) DO NOTHING",
        relation.table()
    );
    let res = sqlx::query(&sql)
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await
        .with_context(|| format!("insert into {}", relation.table()))?;
    Ok(res.rows_affected() == 1)
}

/// Returns false when there was nothing to remove.
pub async fn remove(db: &PgPool, relation: Relation, user_id: i64, recipe_id: i64) -> anyhow::Result<bool> {
    let sql = format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        relation.table()
    );
    let res = sqlx::query(&sql)
        .bind(user_id)
        .bind(recipe_id)
        .execute(db)
        .await
        .with_context(|| format!("delete from {}", relation.table()))?;
    Ok(res.rows_affected() > 0)
}
