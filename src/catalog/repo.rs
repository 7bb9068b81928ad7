use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

/// Escape LIKE metacharacters so user input matches literally.
pub(crate) fn like_prefix(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 1);
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

pub async fn list_tags(db: &PgPool) -> anyhow::Result<Vec<Tag>> {
    let rows = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags ORDER BY name")
        .fetch_all(db)
        .await
        .context("list tags")?;
    Ok(rows)
}

pub async fn get_tag(db: &PgPool, id: i64) -> anyhow::Result<Option<Tag>> {
    let row = sqlx::query_as::<_, Tag>("SELECT id, name, slug FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get tag")?;
    Ok(row)
}

/// Ingredients whose name starts with `prefix`, case-insensitively.
pub async fn list_ingredients(db: &PgPool, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
    let rows = match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, measurement_unit
              FROM ingredients
             WHERE name ILIKE $1
             ORDER BY name
            "#,
        )
        .bind(like_prefix(p))
        .fetch_all(db)
        .await,
        None => {
            sqlx::query_as::<_, Ingredient>(
                "SELECT id, name, measurement_unit FROM ingredients ORDER BY name",
            )
            .fetch_all(db)
            .await
        }
    }
    .context("list ingredients")?;
    Ok(rows)
}

pub async fn get_ingredient(db: &PgPool, id: i64) -> anyhow::Result<Option<Ingredient>> {
    let row = sqlx::query_as::<_, Ingredient>(
        "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get ingredient")?;
    Ok(row)
}

/// Number of distinct ids from `ids` present in `table`.
pub async fn count_existing(db: &PgPool, table: CatalogTable, ids: &[i64]) -> anyhow::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ANY($1)", table.name());
    let n: i64 = sqlx::query_scalar(&sql)
        .bind(ids)
        .fetch_one(db)
        .await
        .with_context(|| format!("count existing {}", table.name()))?;
    Ok(n)
}

#[derive(Debug, Clone, Copy)]
pub enum CatalogTable {
    Tags,
    Ingredients,
}

impl CatalogTable {
    fn name(self) -> &'static str {
        match self {
            CatalogTable::Tags => "tags",
            CatalogTable::Ingredients => "ingredients",
        }
    }
}

/// Bulk insert, skipping rows that collide with existing ones.
/// Returns the number of rows actually created.
pub async fn insert_tags(db: &PgPool, tags: &[(String, String)]) -> anyhow::Result<u64> {
    if tags.is_empty() {
        return Ok(0);
    }
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("INSERT INTO tags (name, slug) ");
    qb.push_values(tags, |mut b, (name, slug)| {
        b.push_bind(name).push_bind(slug);
    });
    qb.push(" ON CONFLICT DO NOTHING");
    let res = qb.build().execute(db).await.context("insert tags")?;
    Ok(res.rows_affected())
}

pub async fn insert_ingredients(db: &PgPool, items: &[(String, String)]) -> anyhow::Result<u64> {
    let mut created = 0;
    // stay well under the bind-parameter limit on large seed files
    for chunk in items.chunks(1000) {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        qb.push_values(chunk, |mut b, (name, unit)| {
            b.push_bind(name).push_bind(unit);
        });
        qb.push(" ON CONFLICT DO NOTHING");
        let res = qb.build().execute(db).await.context("insert ingredients")?;
        created += res.rows_affected();
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_prefix_escapes_wildcards() {
        assert_eq!(like_prefix("соль"), "соль%");
        assert_eq!(like_prefix("100%"), "100\\%%");
        assert_eq!(like_prefix("a_b\\"), "a\\_b\\\\%");
    }
}
