//! `foodgram load-data [DIR]`: import reference tags and ingredients
//! from `ingredients.json` and `tags.json`.

use std::path::Path;

use serde::{de::DeserializeOwned, Deserialize};
use sqlx::PgPool;
use tracing::{error, info};

use crate::catalog::repo;

pub const MAX_SLUG_LENGTH: usize = 32;

/// Lowercase, keep alphanumerics (any script), collapse the rest into `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for ch in name.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug.chars().take(MAX_SLUG_LENGTH).collect::<String>().trim_end_matches('-').to_string()
}

/// One entry of `ingredients.json`. Fields are optional so that an
/// incomplete entry is skipped instead of failing the whole file.
#[derive(Debug, Deserialize)]
pub struct IngredientSeed {
    pub name: Option<String>,
    pub measurement_unit: Option<String>,
}

/// One entry of `tags.json`; the slug is derived from the name when absent.
#[derive(Debug, Deserialize)]
pub struct TagSeed {
    pub name: Option<String>,
    pub slug: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Entries missing a required field are skipped.
pub fn parse_ingredients(seeds: Vec<IngredientSeed>) -> Vec<(String, String)> {
    seeds
        .into_iter()
        .filter_map(|seed| Some((non_blank(seed.name)?, non_blank(seed.measurement_unit)?)))
        .collect()
}

pub fn parse_tags(seeds: Vec<TagSeed>) -> Vec<(String, String)> {
    seeds
        .into_iter()
        .filter_map(|seed| {
            let name = non_blank(seed.name)?;
            let slug = non_blank(seed.slug).unwrap_or_else(|| slugify(&name));
            Some((name, slug))
        })
        .collect()
}

fn read_seed<T: DeserializeOwned>(path: &Path) -> Option<Vec<T>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            error!(path = %path.display(), error = %e, "data file not found");
            return None;
        }
    };
    match serde_json::from_str::<Vec<T>>(&raw) {
        Ok(v) => Some(v),
        Err(e) => {
            error!(path = %path.display(), error = %e, "invalid JSON");
            None
        }
    }
}

pub async fn load_data(db: &PgPool, dir: &Path) -> anyhow::Result<()> {
    if let Some(seeds) = read_seed::<IngredientSeed>(&dir.join("ingredients.json")) {
        let items = parse_ingredients(seeds);
        let created = repo::insert_ingredients(db, &items).await?;
        info!(created, total = items.len(), "ingredients loaded");
    }
    if let Some(seeds) = read_seed::<TagSeed>(&dir.join("tags.json")) {
        let items = parse_tags(seeds);
        let created = repo::insert_tags(db, &items).await?;
        info!(created, total = items.len(), "tags loaded");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Early Breakfast!"), "early-breakfast");
        assert_eq!(slugify("  Завтрак  "), "завтрак");
        assert_eq!(slugify("a -- b"), "a-b");
        assert!(slugify(&"x".repeat(100)).chars().count() <= MAX_SLUG_LENGTH);
    }

    #[test]
    fn slug_never_ends_with_dash_after_truncation() {
        let name = format!("{} tail", "a".repeat(31));
        let slug = slugify(&name);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn ingredients_skip_incomplete_entries() {
        let seeds: Vec<IngredientSeed> = serde_json::from_str(
            r#"[
                {"name": "соль", "measurement_unit": "г"},
                {"name": "вода"},
                {"measurement_unit": "шт"},
                {"name": "  ", "measurement_unit": "г"},
                {"name": "мука", "measurement_unit": "г"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            parse_ingredients(seeds),
            vec![("соль".into(), "г".into()), ("мука".into(), "г".into())]
        );
    }

    #[test]
    fn tags_get_slug_from_name_when_missing() {
        let seeds: Vec<TagSeed> = serde_json::from_str(
            r#"[
                {"name": "Lunch", "slug": "lunch"},
                {"name": "Late Dinner"},
                {"slug": "orphan"}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            parse_tags(seeds),
            vec![
                ("Lunch".into(), "lunch".into()),
                ("Late Dinner".into(), "late-dinner".into())
            ]
        );
    }

    #[test]
    fn non_array_file_is_rejected() {
        assert!(serde_json::from_str::<Vec<TagSeed>>(r#"{"name": "x"}"#).is_err());
    }

    #[test]
    fn bundled_seed_files_parse() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let tags = read_seed::<TagSeed>(&dir.join("tags.json")).unwrap();
        assert_eq!(parse_tags(tags).len(), 3);
        let ingredients = read_seed::<IngredientSeed>(&dir.join("ingredients.json")).unwrap();
        assert!(!parse_ingredients(ingredients).is_empty());
    }
}
