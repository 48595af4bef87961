//! HTTP handlers for recipes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{check_permission, CurrentUser};
use crate::services::recipes::{
    CreateRecipeInput, RecipeCost, RecipeService, RecipeWithIngredients, UpdateRecipeInput,
};
use crate::AppState;

pub async fn list_recipes(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<RecipeWithIngredients>>> {
    let service = RecipeService::new(state.db);
    let recipes = service.list().await?;
    Ok(Json(recipes))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<RecipeWithIngredients>> {
    let service = RecipeService::new(state.db);
    let recipe = service.get(recipe_id).await?;
    Ok(Json(recipe))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRecipeInput>,
) -> AppResult<(StatusCode, Json<RecipeWithIngredients>)> {
    check_permission(&current_user.0, Resource::Recipe, Action::Create)?;
    let service = RecipeService::new(state.db);
    let recipe = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(recipe_id): Path<Uuid>,
    Json(input): Json<UpdateRecipeInput>,
) -> AppResult<Json<RecipeWithIngredients>> {
    check_permission(&current_user.0, Resource::Recipe, Action::Edit)?;
    let service = RecipeService::new(state.db);
    let recipe = service.update(recipe_id, input).await?;
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    check_permission(&current_user.0, Resource::Recipe, Action::Delete)?;
    let service = RecipeService::new(state.db);
    service.delete(recipe_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cost per kilogram with the per-ingredient breakdown
pub async fn get_recipe_cost(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<RecipeCost>> {
    let service = RecipeService::new(state.db);
    let cost = service.cost(recipe_id).await?;
    Ok(Json(cost))
}
