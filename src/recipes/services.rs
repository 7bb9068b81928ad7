use std::collections::{HashMap, HashSet};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
    catalog::repo::{count_existing, CatalogTable, Tag},
    error::{is_unique_violation, ApiError, ApiResult},
    images::services::{decode_data_uri, discard, media_url, upload_image, DecodedImage},
    recipes::{
        dto::{IngredientAmount, IngredientAmountInput, RecipeRead, RecipeWriteRequest},
        repo::{self, RecipeFields},
        repo_types::RecipeRow,
        short_hash,
    },
    state::AppState,
    users::{repo as user_repo, services::public_user},
};

pub const MIN_AMOUNT_VALUE: i64 = 1;
pub const MAX_AMOUNT_VALUE: i64 = 32_000;
pub const MAX_RECIPE_NAME_LENGTH: usize = 256;

const IMAGE_PREFIX: &str = "recipes/images";
const NAME_CONSTRAINT: &str = "unique_name_author";

/// Fully validated input of a recipe create.
#[derive(Debug)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<i64>,
    pub ingredients: Vec<(i64, i32)>,
    pub image: DecodedImage,
}

/// Validated PATCH: `None` leaves the stored value untouched.
#[derive(Debug, Default)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<(i64, i32)>>,
    pub image: Option<DecodedImage>,
}

fn bounded(value: i64, what: &str) -> ApiResult<i32> {
    if !(MIN_AMOUNT_VALUE..=MAX_AMOUNT_VALUE).contains(&value) {
        return Err(ApiError::validation(format!(
            "{what} must be between {MIN_AMOUNT_VALUE} and {MAX_AMOUNT_VALUE}."
        )));
    }
    Ok(value as i32)
}

fn validate_name(name: String) -> ApiResult<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("Recipe name must not be empty."));
    }
    if name.chars().count() > MAX_RECIPE_NAME_LENGTH {
        return Err(ApiError::validation(format!(
            "Recipe name must be at most {MAX_RECIPE_NAME_LENGTH} characters."
        )));
    }
    Ok(name)
}

fn validate_text(text: String) -> ApiResult<String> {
    if text.trim().is_empty() {
        return Err(ApiError::validation("Recipe text must not be empty."));
    }
    Ok(text)
}

pub fn validate_tags(tags: Vec<i64>) -> ApiResult<Vec<i64>> {
    if tags.is_empty() {
        return Err(ApiError::validation("At least one tag is required."));
    }
    let unique: HashSet<i64> = tags.iter().copied().collect();
    if unique.len() != tags.len() {
        return Err(ApiError::validation("Tags must not repeat."));
    }
    Ok(tags)
}

pub fn validate_ingredients(items: Vec<IngredientAmountInput>) -> ApiResult<Vec<(i64, i32)>> {
    if items.is_empty() {
        return Err(ApiError::validation("At least one ingredient is required."));
    }
    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id) {
            return Err(ApiError::validation("Ingredients must not repeat."));
        }
        out.push((item.id, bounded(item.amount, "Amount")?));
    }
    Ok(out)
}

fn validate_image(raw: String) -> ApiResult<DecodedImage> {
    if raw.trim().is_empty() {
        return Err(ApiError::validation("Image must not be empty."));
    }
    Ok(decode_data_uri(&raw)?)
}

fn required<T>(value: Option<T>, field: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::validation(format!("Field '{field}' is required.")))
}

pub fn validate_create(req: RecipeWriteRequest) -> ApiResult<RecipeDraft> {
    Ok(RecipeDraft {
        tags: validate_tags(required(req.tags, "tags")?)?,
        ingredients: validate_ingredients(required(req.ingredients, "ingredients")?)?,
        image: validate_image(required(req.image, "image")?)?,
        name: validate_name(required(req.name, "name")?)?,
        text: validate_text(required(req.text, "text")?)?,
        cooking_time: bounded(required(req.cooking_time, "cooking_time")?, "Cooking time")?,
    })
}

pub fn validate_patch(req: RecipeWriteRequest) -> ApiResult<RecipePatch> {
    Ok(RecipePatch {
        tags: req.tags.map(validate_tags).transpose()?,
        ingredients: req.ingredients.map(validate_ingredients).transpose()?,
        image: req.image.map(validate_image).transpose()?,
        name: req.name.map(validate_name).transpose()?,
        text: req.text.map(validate_text).transpose()?,
        cooking_time: req
            .cooking_time
            .map(|t| bounded(t, "Cooking time"))
            .transpose()?,
    })
}

/// Every referenced tag and ingredient must exist.
async fn ensure_references(
    st: &AppState,
    tags: Option<&[i64]>,
    ingredients: Option<&[(i64, i32)]>,
) -> ApiResult<()> {
    if let Some(tags) = tags {
        if count_existing(&st.db, CatalogTable::Tags, tags).await? != tags.len() as i64 {
            return Err(ApiError::validation("Some of the given tags do not exist."));
        }
    }
    if let Some(items) = ingredients {
        let ids: Vec<i64> = items.iter().map(|(id, _)| *id).collect();
        if count_existing(&st.db, CatalogTable::Ingredients, &ids).await? != ids.len() as i64 {
            return Err(ApiError::validation("Some of the given ingredients do not exist."));
        }
    }
    Ok(())
}

fn map_write_error(e: anyhow::Error) -> ApiError {
    if is_unique_violation(&e, NAME_CONSTRAINT) {
        ApiError::validation("You already have a recipe with this name.")
    } else {
        ApiError::Internal(e)
    }
}

async fn insert_tx(
    st: &AppState,
    author_id: i64,
    draft: &RecipeDraft,
    image_key: &str,
) -> anyhow::Result<i64> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    let hash = short_hash::generate_unique(&mut tx).await?;
    let fields = RecipeFields {
        name: &draft.name,
        text: &draft.text,
        image: image_key,
        cooking_time: draft.cooking_time,
    };
    let id = repo::insert_recipe_tx(&mut tx, author_id, &fields, &hash).await?;
    repo::set_tags_tx(&mut tx, id, &draft.tags).await?;
    repo::replace_ingredients_tx(&mut tx, id, &draft.ingredients).await?;
    tx.commit().await.context("commit tx")?;
    Ok(id)
}

async fn update_tx(
    st: &AppState,
    recipe_id: i64,
    patch: &RecipePatch,
    new_image: Option<&str>,
) -> anyhow::Result<()> {
    let mut tx = st.db.begin().await.context("begin tx")?;
    repo::update_fields_tx(
        &mut tx,
        recipe_id,
        patch.name.as_deref(),
        patch.text.as_deref(),
        new_image,
        patch.cooking_time,
    )
    .await?;
    if let Some(tags) = &patch.tags {
        repo::set_tags_tx(&mut tx, recipe_id, tags).await?;
    }
    if let Some(items) = &patch.ingredients {
        repo::replace_ingredients_tx(&mut tx, recipe_id, items).await?;
    }
    tx.commit().await.context("commit tx")?;
    Ok(())
}

/// Insert the recipe, its tags and its ingredient rows atomically.
pub async fn create_recipe(st: &AppState, author_id: i64, draft: RecipeDraft) -> ApiResult<i64> {
    ensure_references(st, Some(&draft.tags), Some(&draft.ingredients)).await?;

    let image_key = upload_image(st, IMAGE_PREFIX, &draft.image).await?;
    let written = insert_tx(st, author_id, &draft, &image_key).await;

    match written {
        Ok(id) => {
            info!(recipe_id = id, author_id, "recipe created");
            Ok(id)
        }
        Err(e) => {
            warn!(error = %e, author_id, "recipe create rolled back");
            discard(st, &image_key).await;
            Err(map_write_error(e))
        }
    }
}

/// Apply a PATCH atomically. Supplied tag/ingredient sets replace the
/// stored ones wholesale; the short hash is never regenerated.
pub async fn update_recipe(
    st: &AppState,
    recipe_id: i64,
    old_image: &str,
    patch: RecipePatch,
) -> ApiResult<()> {
    ensure_references(st, patch.tags.as_deref(), patch.ingredients.as_deref()).await?;

    let new_image = match &patch.image {
        Some(image) => Some(upload_image(st, IMAGE_PREFIX, image).await?),
        None => None,
    };

    let written = update_tx(st, recipe_id, &patch, new_image.as_deref()).await;

    match written {
        Ok(()) => {
            if let Some(key) = &new_image {
                if key != old_image {
                    discard(st, old_image).await;
                }
            }
            info!(recipe_id, "recipe updated");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, recipe_id, "recipe update rolled back");
            if let Some(key) = &new_image {
                discard(st, key).await;
            }
            Err(map_write_error(e))
        }
    }
}

/// Build full representations, preserving the order of `rows`.
pub async fn assemble(
    st: &AppState,
    viewer: Option<i64>,
    rows: Vec<RecipeRow>,
) -> ApiResult<Vec<RecipeRead>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut author_ids: Vec<i64> = rows.iter().map(|r| r.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    for t in repo::tags_for(&st.db, &ids).await? {
        tags.entry(t.recipe_id).or_default().push(Tag {
            id: t.id,
            name: t.name,
            slug: t.slug,
        });
    }

    let mut ingredients: HashMap<i64, Vec<IngredientAmount>> = HashMap::new();
    for i in repo::ingredients_for(&st.db, &ids).await? {
        ingredients.entry(i.recipe_id).or_default().push(IngredientAmount {
            id: i.id,
            name: i.name,
            measurement_unit: i.measurement_unit,
            amount: i.amount,
        });
    }

    let mut authors = HashMap::new();
    for profile in user_repo::profiles_by_ids(&st.db, viewer, &author_ids).await? {
        authors.insert(profile.id, public_user(st, profile).await?);
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let author = authors
            .get(&row.author_id)
            .cloned()
            .with_context(|| format!("author {} of recipe {} missing", row.author_id, row.id))?;
        out.push(RecipeRead {
            id: row.id,
            tags: tags.remove(&row.id).unwrap_or_default(),
            author,
            ingredients: ingredients.remove(&row.id).unwrap_or_default(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            image: media_url(st, &row.image).await?,
            name: row.name,
            text: row.text,
            cooking_time: row.cooking_time,
        });
    }
    Ok(out)
}
