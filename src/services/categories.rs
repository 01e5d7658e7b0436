use std::{collections::HashMap, sync::Arc};

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        category::{Categorized, Category, CategoryInput, CategoryQuery, NewCategory, UpdateCategoryRequest},
        paging, Page, PageMeta,
    },
    services::{
        dedup,
        tenancy::{ensure_same_tenant, TenancyResolver},
    },
    store::{CategoryLinks, CategoryStore, ListFilter},
};

fn clean_color(color: Option<String>) -> Option<String> {
    color
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// A tenant's categories, and the glue that files items under them.
#[derive(Clone)]
pub struct CategoryService {
    categories: Arc<dyn CategoryStore>,
    tenancy: TenancyResolver,
}

impl CategoryService {
    pub fn new(categories: Arc<dyn CategoryStore>, tenancy: TenancyResolver) -> Self {
        Self {
            categories,
            tenancy,
        }
    }

    pub async fn create(
        &self,
        requester: Uuid,
        inputs: Vec<CategoryInput>,
    ) -> AppResult<Vec<Category>> {
        if inputs.is_empty() {
            return Err(AppError::validation("At least one category is required"));
        }
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;

        let new = inputs
            .into_iter()
            .map(|input| {
                let name = input.name.trim();
                if name.is_empty() {
                    return Err(AppError::validation("Category name is required"));
                }
                Ok(NewCategory {
                    name: name.to_string(),
                    color: clean_color(input.color),
                    tenant_id,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let created = self.categories.create_many(new).await?;
        tracing::info!(tenant_id = %tenant_id, count = created.len(), "categories created");
        Ok(created)
    }

    pub async fn list(&self, requester: Uuid, query: &CategoryQuery) -> AppResult<Page<Category>> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let (page, limit, offset) = paging(query.page, query.limit)?;
        let filter = ListFilter {
            search: query.search.clone(),
            limit,
            offset,
            ..Default::default()
        };
        let (data, total) = self.categories.list(tenant_id, &filter).await?;
        Ok(Page {
            data,
            meta: PageMeta::new(page, limit, total),
        })
    }

    pub async fn update(
        &self,
        requester: Uuid,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> AppResult<Category> {
        self.load_owned(requester, id).await?;
        let name = match req.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AppError::validation("Category name is required"));
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let changes = UpdateCategoryRequest {
            name,
            color: clean_color(req.color),
        };
        Ok(self.categories.update(id, changes).await?)
    }

    pub async fn delete(&self, requester: Uuid, id: Uuid) -> AppResult<()> {
        self.load_owned(requester, id).await?;
        self.categories.delete_many(&[id]).await?;
        tracing::info!(category_id = %id, "category deleted");
        Ok(())
    }

    /// Deletes every listed category or none of them.
    pub async fn delete_bulk(&self, requester: Uuid, ids: &[Uuid]) -> AppResult<u64> {
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        let ids = self.resolve_ids(tenant_id, ids).await?;
        if ids.is_empty() {
            return Err(AppError::validation("At least one id is required"));
        }
        let removed = self.categories.delete_many(&ids).await?;
        tracing::info!(tenant_id = %tenant_id, removed, "categories bulk deleted");
        Ok(removed)
    }

    /// Checks that every id names one of the tenant's categories and returns
    /// them without repeats, in the order given.
    pub async fn resolve_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Ok(ids);
        }
        let found = self.categories.find_many(&ids, tenant_id).await?;
        if found.len() < ids.len() {
            return Err(AppError::validation(format!(
                "{} of {} categories were not found",
                ids.len() - found.len(),
                ids.len()
            )));
        }
        Ok(ids)
    }

    /// Pairs each item with the tenant's categories it is filed under.
    /// Links to categories that are gone are dropped.
    pub async fn attach<T>(
        &self,
        tenant_id: Uuid,
        items: Vec<T>,
        links: &CategoryLinks,
        id_of: impl Fn(&T) -> Uuid,
    ) -> AppResult<Vec<Categorized<T>>> {
        let wanted = dedup(&links.values().flatten().copied().collect::<Vec<_>>());
        let known: HashMap<Uuid, Category> = if wanted.is_empty() {
            HashMap::new()
        } else {
            self.categories
                .find_many(&wanted, tenant_id)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(items
            .into_iter()
            .map(|item| {
                let categories = links
                    .get(&id_of(&item))
                    .map(|ids| ids.iter().filter_map(|id| known.get(id).cloned()).collect())
                    .unwrap_or_default();
                Categorized::new(item, categories)
            })
            .collect())
    }

    async fn load_owned(&self, requester: Uuid, id: Uuid) -> AppResult<Category> {
        let category = self
            .categories
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Category"))?;
        let tenant_id = self.tenancy.resolve_tenant(requester).await?;
        ensure_same_tenant(category.tenant_id, tenant_id)?;
        Ok(category)
    }
}
