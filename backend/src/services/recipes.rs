//! Recipes (bills of materials) and their cost per kilogram

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::models::{recipe_cost_per_kg, Recipe, RecipeIngredient};

const RECIPE_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

/// Recipe service
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// Recipe with its ingredient list and current cost
#[derive(Debug, Clone, Serialize)]
pub struct RecipeWithIngredients {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub ingredients: Vec<RecipeIngredient>,
    pub cost_per_kg: Decimal,
}

/// Ingredient line of a recipe request
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientInput {
    pub raw_material_id: Uuid,
    pub quantity_per_kg: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecipeInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<IngredientInput>,
}

/// Update a recipe. A present ingredient list replaces the current one.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRecipeInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub ingredients: Option<Vec<IngredientInput>>,
}

/// Cost breakdown of one ingredient
#[derive(Debug, Clone, Serialize)]
pub struct IngredientCost {
    pub raw_material_id: Uuid,
    pub raw_material_name: String,
    pub quantity_per_kg: Decimal,
    pub unit_cost: Decimal,
    pub cost: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeCost {
    pub recipe_id: Uuid,
    pub name: String,
    pub cost_per_kg: Decimal,
    pub ingredients: Vec<IngredientCost>,
}

/// Load the ingredients of a recipe with current raw material costs
pub(crate) async fn load_ingredients(
    conn: &mut PgConnection,
    recipe_id: Uuid,
) -> AppResult<Vec<RecipeIngredient>> {
    let rows = sqlx::query_as::<_, RecipeIngredient>(
        r#"
        SELECT ri.id, ri.recipe_id, ri.raw_material_id, rm.name AS raw_material_name,
               ri.quantity_per_kg, rm.unit_cost
        FROM recipe_ingredients ri
        JOIN raw_materials rm ON rm.id = ri.raw_material_id
        WHERE ri.recipe_id = $1
        ORDER BY rm.name
        "#,
    )
    .bind(recipe_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

fn check_ingredients(ingredients: &[IngredientInput]) -> AppResult<()> {
    let pairs: Vec<(Uuid, Decimal)> = ingredients
        .iter()
        .map(|i| (i.raw_material_id, i.quantity_per_kg))
        .collect();
    shared::validate_recipe_ingredients(&pairs)?;
    Ok(())
}

async fn insert_ingredients(
    conn: &mut PgConnection,
    recipe_id: Uuid,
    ingredients: &[IngredientInput],
) -> AppResult<()> {
    for ingredient in ingredients {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM raw_materials WHERE id = $1)")
                .bind(ingredient.raw_material_id)
                .fetch_one(&mut *conn)
                .await?;
        if !exists {
            return Err(AppError::NotFound(format!(
                "Raw material {}",
                ingredient.raw_material_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, raw_material_id, quantity_per_kg)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(recipe_id)
        .bind(ingredient.raw_material_id)
        .bind(ingredient.quantity_per_kg)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl RecipeService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<RecipeWithIngredients>> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {} FROM recipes WHERE is_active ORDER BY name",
            RECIPE_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        let mut conn = self.db.acquire().await?;
        let mut result = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            let ingredients = load_ingredients(&mut conn, recipe.id).await?;
            result.push(RecipeWithIngredients {
                cost_per_kg: recipe_cost_per_kg(&ingredients),
                recipe,
                ingredients,
            });
        }
        Ok(result)
    }

    pub async fn get(&self, recipe_id: Uuid) -> AppResult<RecipeWithIngredients> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {} FROM recipes WHERE id = $1",
            RECIPE_COLUMNS
        ))
        .bind(recipe_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recipe {}", recipe_id)))?;

        let mut conn = self.db.acquire().await?;
        let ingredients = load_ingredients(&mut conn, recipe_id).await?;

        Ok(RecipeWithIngredients {
            cost_per_kg: recipe_cost_per_kg(&ingredients),
            recipe,
            ingredients,
        })
    }

    pub async fn create(&self, input: CreateRecipeInput) -> AppResult<RecipeWithIngredients> {
        input.validate()?;
        check_ingredients(&input.ingredients)?;

        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "INSERT INTO recipes (name, description) VALUES ($1, $2) RETURNING {}",
            RECIPE_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;

        insert_ingredients(&mut tx, recipe.id, &input.ingredients).await?;
        let ingredients = load_ingredients(&mut tx, recipe.id).await?;

        tx.commit().await?;

        tracing::info!(recipe_id = %recipe.id, ingredients = ingredients.len(), "Recipe created");

        Ok(RecipeWithIngredients {
            cost_per_kg: recipe_cost_per_kg(&ingredients),
            recipe,
            ingredients,
        })
    }

    pub async fn update(
        &self,
        recipe_id: Uuid,
        input: UpdateRecipeInput,
    ) -> AppResult<RecipeWithIngredients> {
        input.validate()?;
        if let Some(ingredients) = &input.ingredients {
            check_ingredients(ingredients)?;
        }

        let mut tx = self.db.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            r#"
            UPDATE recipes
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                is_active = COALESCE($3, is_active),
                updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            RECIPE_COLUMNS
        ))
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.is_active)
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recipe {}", recipe_id)))?;

        if let Some(ingredients) = &input.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(recipe_id)
                .execute(&mut *tx)
                .await?;
            insert_ingredients(&mut tx, recipe_id, ingredients).await?;
        }

        let ingredients = load_ingredients(&mut tx, recipe_id).await?;
        tx.commit().await?;

        Ok(RecipeWithIngredients {
            cost_per_kg: recipe_cost_per_kg(&ingredients),
            recipe,
            ingredients,
        })
    }

    /// Deactivate a recipe. Products still linked to it keep their link.
    pub async fn delete(&self, recipe_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE recipes SET is_active = FALSE, updated_at = NOW() WHERE id = $1 AND is_active",
        )
        .bind(recipe_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Recipe {}", recipe_id)));
        }
        Ok(())
    }

    /// Cost per kilogram with a per-ingredient breakdown
    pub async fn cost(&self, recipe_id: Uuid) -> AppResult<RecipeCost> {
        let recipe = self.get(recipe_id).await?;
        let ingredients = recipe
            .ingredients
            .iter()
            .map(|i| IngredientCost {
                raw_material_id: i.raw_material_id,
                raw_material_name: i.raw_material_name.clone(),
                quantity_per_kg: i.quantity_per_kg,
                unit_cost: i.unit_cost,
                cost: shared::round_cost(i.cost_per_kg()),
            })
            .collect();

        Ok(RecipeCost {
            recipe_id,
            name: recipe.recipe.name,
            cost_per_kg: recipe.cost_per_kg,
            ingredients,
        })
    }
}
