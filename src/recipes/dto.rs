use serde::{Deserialize, Serialize};

use crate::{
    catalog::repo::Tag,
    images::services::media_url,
    recipes::repo_types::MinifiedRow,
    state::AppState,
    users::dto::PublicUser,
};

#[derive(Debug, Serialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct RecipeRead {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: PublicUser,
    pub ingredients: Vec<IngredientAmount>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Short form used by favorites, cart and subscription listings.
#[derive(Debug, Serialize)]
pub struct RecipeMinified {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeMinified {
    pub async fn resolve(st: &AppState, row: MinifiedRow) -> anyhow::Result<Self> {
        Ok(Self {
            id: row.id,
            image: media_url(st, &row.image).await?,
            name: row.name,
            cooking_time: row.cooking_time,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmountInput {
    pub id: i64,
    pub amount: i64,
}

/// Body of POST (all fields required) and PATCH (any subset).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeWriteRequest {
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<IngredientAmountInput>>,
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ShortLinkResponse {
    #[serde(rename = "short-link")]
    pub short_link: String,
}
