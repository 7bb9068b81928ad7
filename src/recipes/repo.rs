use anyhow::Context;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::recipes::{
    repo_types::{MinifiedRow, RecipeFilter, RecipeIngredientRow, RecipeRow, RecipeTagRow},
    shopping_list::CartLine,
};

fn push_recipe_select(qb: &mut QueryBuilder<'_, Postgres>, viewer: Option<i64>) {
    qb.push(
        r#"
        SELECT r.id, r.author_id, r.name, r.text, r.image, r.cooking_time,
               EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = "#,
    );
    qb.push_bind(viewer);
    qb.push(
        r#") AS is_favorited,
               EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = "#,
    );
    qb.push_bind(viewer);
    qb.push(") AS is_in_shopping_cart FROM recipes r WHERE TRUE");
}

/// Relation filters only apply to an authenticated viewer.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, viewer: Option<i64>, filter: &RecipeFilter) {
    if let Some(author) = filter.author {
        qb.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        qb.push(
            " AND EXISTS (SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id \
             WHERE rt.recipe_id = r.id AND t.slug = ANY(",
        )
        .push_bind(filter.tags.clone())
        .push("))");
    }
    if let Some(user_id) = viewer {
        if filter.is_favorited {
            qb.push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            qb.push(
                " AND EXISTS (SELECT 1 FROM shopping_carts c WHERE c.recipe_id = r.id AND c.user_id = ",
            )
            .push_bind(user_id)
            .push(")");
        }
    }
}

pub async fn count_filtered(
    db: &PgPool,
    viewer: Option<i64>,
    filter: &RecipeFilter,
) -> anyhow::Result<i64> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM recipes r WHERE TRUE");
    push_filters(&mut qb, viewer, filter);
    let n: i64 = qb
        .build_query_scalar::<i64>()
        .fetch_one(db)
        .await
        .context("count recipes")?;
    Ok(n)
}

/// Newest first.
pub async fn list_filtered(
    db: &PgPool,
    viewer: Option<i64>,
    filter: &RecipeFilter,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<RecipeRow>> {
    let mut qb = QueryBuilder::<Postgres>::new("");
    push_recipe_select(&mut qb, viewer);
    push_filters(&mut qb, viewer, filter);
    qb.push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    let rows = qb
        .build_query_as::<RecipeRow>()
        .fetch_all(db)
        .await
        .context("list recipes")?;
    Ok(rows)
}

pub async fn get(db: &PgPool, viewer: Option<i64>, id: i64) -> anyhow::Result<Option<RecipeRow>> {
    let mut qb = QueryBuilder::<Postgres>::new("");
    push_recipe_select(&mut qb, viewer);
    qb.push(" AND r.id = ").push_bind(id);
    let row = qb
        .build_query_as::<RecipeRow>()
        .fetch_optional(db)
        .await
        .context("get recipe")?;
    Ok(row)
}

pub async fn tags_for(db: &PgPool, recipe_ids: &[i64]) -> anyhow::Result<Vec<RecipeTagRow>> {
    let rows = sqlx::query_as::<_, RecipeTagRow>(
        r#"
        SELECT rt.recipe_id, t.id, t.name, t.slug
          FROM recipe_tags rt
          JOIN tags t ON t.id = rt.tag_id
         WHERE rt.recipe_id = ANY($1)
         ORDER BY t.name
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
    .context("load recipe tags")?;
    Ok(rows)
}

pub async fn ingredients_for(
    db: &PgPool,
    recipe_ids: &[i64],
) -> anyhow::Result<Vec<RecipeIngredientRow>> {
    let rows = sqlx::query_as::<_, RecipeIngredientRow>(
        r#"
        SELECT ir.recipe_id, i.id, i.name, i.measurement_unit, ir.amount
          FROM ingredient_in_recipe ir
          JOIN ingredients i ON i.id = ir.ingredient_id
         WHERE ir.recipe_id = ANY($1)
         ORDER BY ir.id
        "#,
    )
    .bind(recipe_ids)
    .fetch_all(db)
    .await
    .context("load recipe ingredients")?;
    Ok(rows)
}

pub async fn get_minified(db: &PgPool, id: i64) -> anyhow::Result<Option<MinifiedRow>> {
    let row = sqlx::query_as::<_, MinifiedRow>(
        "SELECT id, author_id, name, image, cooking_time FROM recipes WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await
    .context("get minified recipe")?;
    Ok(row)
}

/// Newest recipes of each author, at most `per_author` each when given.
pub async fn list_minified_by_authors(
    db: &PgPool,
    author_ids: &[i64],
    per_author: Option<i64>,
) -> anyhow::Result<Vec<MinifiedRow>> {
    if author_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, MinifiedRow>(
        r#"
        SELECT id, author_id, name, image, cooking_time
          FROM (
                SELECT r.id, r.author_id, r.name, r.image, r.cooking_time, r.pub_date,
                       ROW_NUMBER() OVER (PARTITION BY r.author_id
                                          ORDER BY r.pub_date DESC, r.id DESC) AS rn
                  FROM recipes r
                 WHERE r.author_id = ANY($1)
               ) ranked
         WHERE $2::BIGINT IS NULL OR rn <= $2
         ORDER BY author_id, pub_date DESC, id DESC
        "#,
    )
    .bind(author_ids)
    .bind(per_author)
    .fetch_all(db)
    .await
    .context("list recipes by authors")?;
    Ok(rows)
}

pub async fn owner_and_image(db: &PgPool, id: i64) -> anyhow::Result<Option<(i64, String)>> {
    let row = sqlx::query_as::<_, (i64, String)>("SELECT author_id, image FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get recipe owner")?;
    Ok(row)
}

pub async fn exists(db: &PgPool, id: i64) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await
        .context("check recipe exists")?;
    Ok(found)
}

pub async fn short_hash_of(db: &PgPool, id: i64) -> anyhow::Result<Option<String>> {
    let hash: Option<String> = sqlx::query_scalar("SELECT short_hash FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("get short hash")?;
    Ok(hash)
}

pub async fn find_by_short_hash(db: &PgPool, hash: &str) -> anyhow::Result<Option<i64>> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM recipes WHERE short_hash = $1")
        .bind(hash)
        .fetch_optional(db)
        .await
        .context("find recipe by short hash")?;
    Ok(id)
}

pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete recipe")?;
    Ok(())
}

/// Sum of amounts per (ingredient, unit) over every recipe in the cart.
pub async fn cart_lines(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<CartLine>> {
    let rows = sqlx::query_as::<_, CartLine>(
        r#"
        SELECT i.name, i.measurement_unit AS unit, SUM(ir.amount)::BIGINT AS total_amount
          FROM shopping_carts c
          JOIN ingredient_in_recipe ir ON ir.recipe_id = c.recipe_id
          JOIN ingredients i ON i.id = ir.ingredient_id
         WHERE c.user_id = $1
         GROUP BY i.name, i.measurement_unit
         ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("aggregate shopping cart")?;
    Ok(rows)
}

// ---- write path, always inside the caller's transaction ----

pub struct RecipeFields<'a> {
    pub name: &'a str,
    pub text: &'a str,
    pub image: &'a str,
    pub cooking_time: i32,
}

pub async fn insert_recipe_tx(
    tx: &mut Transaction<'_, Postgres>,
    author_id: i64,
    fields: &RecipeFields<'_>,
    short_hash: &str,
) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO recipes (author_id, name, text, image, cooking_time, short_hash)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(author_id)
    .bind(fields.name)
    .bind(fields.text)
    .bind(fields.image)
    .bind(fields.cooking_time)
    .bind(short_hash)
    .fetch_one(&mut **tx)
    .await
    .context("insert recipe")?;
    Ok(id)
}

/// Overwrite only the supplied columns. `short_hash` is never touched.
pub async fn update_fields_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: i64,
    name: Option<&str>,
    text: Option<&str>,
    image: Option<&str>,
    cooking_time: Option<i32>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE recipes
           SET name = COALESCE($2, name),
               text = COALESCE($3, text),
               image = COALESCE($4, image),
               cooking_time = COALESCE($5, cooking_time)
         WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(text)
    .bind(image)
    .bind(cooking_time)
    .execute(&mut **tx)
    .await
    .context("update recipe")?;
    Ok(())
}

/// Replace the tag set wholesale.
pub async fn set_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    tag_ids: &[i64],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("clear recipe tags")?;
    sqlx::query(
        r#"
        INSERT INTO recipe_tags (recipe_id, tag_id)
        SELECT $1, UNNEST($2::BIGINT[])
        "#,
    )
    .bind(recipe_id)
    .bind(tag_ids)
    .execute(&mut **tx)
    .await
    .context("insert recipe tags")?;
    Ok(())
}

/// Delete every ingredient row of the recipe and bulk-insert `items`.
pub async fn replace_ingredients_tx(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: i64,
    items: &[(i64, i32)],
) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM ingredient_in_recipe WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .context("clear recipe ingredients")?;

    let (ids, amounts): (Vec<i64>, Vec<i32>) = items.iter().copied().unzip();
    sqlx::query(
        r#"
        INSERT INTO ingredient_in_recipe (recipe_id, ingredient_id, amount)
        SELECT $1, u.ingredient_id, u.amount
          FROM UNNEST($2::BIGINT[], $3::INTEGER[]) AS u(ingredient_id, amount)
        "#,
    )
    .bind(recipe_id)
    .bind(&ids)
    .bind(&amounts)
    .execute(&mut **tx)
    .await
    .context("insert recipe ingredients")?;
    Ok(())
}
