//! # Category Handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::models::{slugify, Category};
use crate::pagination::{PageRequest, Paginated};
use crate::web::errors::{ApiError, ApiResult};
use crate::web::extractors::{AdminUser, ValidatedJson, ValidatedQuery};
use crate::web::state::AppState;

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryListQuery {
    pub q: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryCreate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 120))]
    pub slug: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 120))]
    pub slug: Option<String>,
}

/// Slug to store for `name`: an explicit non-blank slug is normalised,
/// otherwise one is derived from the name.
fn resolve_slug(name: &str, requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(slug) if !slug.is_empty() => slugify(slug),
        _ => slugify(name),
    }
}

/// Name and slug after applying a partial update to `current`.
fn updated_name_and_slug(current: &Category, update: &CategoryUpdate) -> (String, String) {
    let name = update
        .name
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.name)
        .to_string();

    let slug = match (&update.slug, &update.name) {
        (Some(slug), _) => resolve_slug(&name, Some(slug)),
        (None, Some(_)) => slugify(&name),
        (None, None) => current.slug.clone(),
    };

    (name, slug)
}

/// GET /categories
pub async fn list_categories(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<CategoryListQuery>,
) -> ApiResult<Json<Paginated<Category>>> {
    let page = PageRequest::new(query.page, query.page_size);
    let (items, total) = Category::list(&state.db_pool, query.q.as_deref(), page).await?;
    Ok(Json(Paginated::new(items, total, page)))
}

/// GET /categories/:id
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Category>> {
    Category::find_by_id(&state.db_pool, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// GET /categories/slug/:slug
pub async fn get_category_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<Category>> {
    Category::find_by_slug(&state.db_pool, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category not found"))
}

/// POST /categories
pub async fn create_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ValidatedJson(request): ValidatedJson<CategoryCreate>,
) -> ApiResult<(StatusCode, Json<Category>)> {
    let name = request.name.trim();
    let slug = resolve_slug(name, request.slug.as_deref());

    if Category::slug_taken(&state.db_pool, &slug, None).await? {
        return Err(ApiError::conflict("Category slug already exists"));
    }

    let category = Category::create(&state.db_pool, name, &slug).await?;
    info!(category_id = %category.id, slug = %category.slug, admin_id = %admin.id, "Created category");

    Ok((StatusCode::CREATED, Json(category)))
}

/// PATCH /categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<CategoryUpdate>,
) -> ApiResult<Json<Category>> {
    let current = Category::find_by_id(&state.db_pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let (name, slug) = updated_name_and_slug(&current, &request);
    if Category::slug_taken(&state.db_pool, &slug, Some(&current.id)).await? {
        return Err(ApiError::conflict("Category slug already exists"));
    }

    let category = Category::update(&state.db_pool, &current.id, &name, &slug).await?;
    info!(category_id = %category.id, admin_id = %admin.id, "Updated category");

    Ok(Json(category))
}

/// DELETE /categories/:id
pub async fn delete_category(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if !Category::delete(&state.db_pool, &id).await? {
        return Err(ApiError::not_found("Category not found"));
    }

    info!(category_id = %id, admin_id = %admin.id, "Deleted category");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(name: &str, slug: &str) -> Category {
        Category {
            id: "c1".to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug("Science Fiction", None), "science-fiction");
        assert_eq!(resolve_slug("Science Fiction", Some("  ")), "science-fiction");
        assert_eq!(resolve_slug("Science Fiction", Some("Sci Fi")), "sci-fi");
    }

    #[test]
    fn test_rename_regenerates_slug() {
        let current = category("Mystery", "mystery");

        let update = CategoryUpdate {
            name: Some("Crime Fiction".to_string()),
            slug: None,
        };
        assert_eq!(
            updated_name_and_slug(&current, &update),
            ("Crime Fiction".to_string(), "crime-fiction".to_string())
        );

        let update = CategoryUpdate {
            name: Some("Crime Fiction".to_string()),
            slug: Some("crime".to_string()),
        };
        assert_eq!(updated_name_and_slug(&current, &update).1, "crime");
    }

    #[test]
    fn test_empty_slug_regenerates_from_current_name() {
        let current = category("Mystery", "whodunit");
        let update = CategoryUpdate {
            name: None,
            slug: Some(String::new()),
        };
        assert_eq!(
            updated_name_and_slug(&current, &update),
            ("Mystery".to_string(), "mystery".to_string())
        );

        assert_eq!(
            updated_name_and_slug(&current, &CategoryUpdate::default()),
            ("Mystery".to_string(), "whodunit".to_string())
        );
    }
}
