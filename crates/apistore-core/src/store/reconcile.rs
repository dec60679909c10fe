// ── Record operations ──
//
// Save, delete and reload fold server results back onto the caller's
// instance; the link/action helpers drive a record's own URLs.

use apistore_api::Method;
use tracing::debug;

use crate::error::StoreError;
use crate::model::{
    Collection, Entity, FieldFilter, Paginatable, Schema, TypeKey, Value, entity_to_json, to_json,
};
use crate::options::{
    DeleteOptions, FindOptions, LinkOptions, RecordOptions, RequestOptions, SaveOptions,
};

use super::Store;
use super::fetch::{append_query, with_url_options};

/// Never sent back to the server on save.
const SAVE_EXCLUDED_FIELDS: &[&str] = &["links", "actions", "actionLinks"];

impl Store {
    // ── Save / delete / reload ───────────────────────────────────────

    /// Create (`POST <type>`) or update (`PUT links.self`) a record.
    ///
    /// When the server confirms a create with a new id, the caller's instance
    /// absorbs the response and becomes the cached representative under that
    /// id (and under its base type). Returns the caller's instance.
    pub async fn save(&self, entity: &Entity, options: SaveOptions) -> Result<Entity, StoreError> {
        let id = entity.id();
        let type_key = entity.type_key();

        let (method, url) = match &id {
            Some(_) => (
                options.method.unwrap_or(Method::PUT),
                match options.url {
                    Some(url) => url,
                    None => entity.link_for("self").ok_or(StoreError::MissingSelfLink)?,
                },
            ),
            None => {
                if type_key.is_empty() {
                    return Err(StoreError::MissingType { operation: "save" });
                }
                (
                    options.method.unwrap_or(Method::POST),
                    options.url.unwrap_or_else(|| type_key.to_string()),
                )
            }
        };
        let qp: Vec<(String, String)> = options.qp.into_iter().collect();
        let url = append_query(&url, &qp);

        let data = match options.data {
            Some(data) => data,
            None => self.serialize_for_save(entity)?,
        };

        let mut request = RequestOptions::new(method, url).data(data);
        request.headers = self.model_for(&type_key).headers().clone();
        let response = self.request(request).await?;

        let Some(created) = response.as_entity() else {
            return Ok(entity.clone());
        };
        let new_id = created.id();
        if id.is_none() && new_id.is_some() && created.type_key() == type_key {
            self.adopt_created(entity, created, &type_key);
        }
        Ok(entity.clone())
    }

    /// Make `entity` the representative for the id the server just assigned.
    fn adopt_created(&self, entity: &Entity, created: &Entity, type_key: &TypeKey) {
        entity.merge(created, false);
        let Some(new_id) = entity.id() else {
            return;
        };
        debug!(type_name = %type_key, id = %new_id, "adopting created record");

        if let Some(existing) = self.inner.cache.get_by_id(type_key, &new_id) {
            self.cache_remove(type_key, &existing);
        }
        self.cache_add(type_key, entity);

        let base = entity.base_type();
        if !base.is_empty() && &base != type_key {
            if let Some(existing) = self.inner.cache.get_by_id(&base, &new_id) {
                self.cache_remove(&base, &existing);
            }
            self.cache_add(&base, entity);
        }
    }

    fn serialize_for_save(&self, entity: &Entity) -> Result<serde_json::Value, StoreError> {
        let schema = self.schema_for(entity.type_key());
        entity_to_json(
            entity,
            FieldFilter {
                allow: schema.as_deref().map(Schema::serializable_fields),
                exclude: SAVE_EXCLUDED_FIELDS,
            },
        )
    }

    /// `DELETE links.self`. The record is evicted when the store is
    /// configured to, when forced, or when the server answers 204.
    pub async fn delete(&self, entity: &Entity, options: DeleteOptions) -> Result<Value, StoreError> {
        let url = match options.url {
            Some(url) => url,
            None => entity.link_for("self").ok_or(StoreError::MissingSelfLink)?,
        };
        let mut request = RequestOptions::new(Method::DELETE, url);
        request.headers = self.model_for(entity.type_key()).headers().clone();

        let (status, value) = self.request_with_status(request).await?;
        if self.inner.config.remove_after_delete || options.force_remove || status == 204 {
            self.cache_remove(&entity.type_key(), entity);
        }
        Ok(value)
    }

    /// Re-fetch a record through its self link. The cached instance is
    /// refreshed in place; returns the caller's instance.
    pub async fn reload(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let url = entity.link_for("self").ok_or(StoreError::MissingSelfLink)?;
        let mut request = RequestOptions::get(url);
        request.headers = self.model_for(entity.type_key()).headers().clone();
        self.request(request).await?;
        Ok(entity.clone())
    }

    // ── Links, actions, pagination ───────────────────────────────────

    /// GET the record's named link.
    pub async fn follow_link(
        &self,
        entity: &Entity,
        name: &str,
        options: &LinkOptions,
    ) -> Result<Value, StoreError> {
        let url = entity.link_for(name).ok_or_else(|| StoreError::UnknownLink {
            name: name.to_owned(),
        })?;
        let find = FindOptions {
            filter: options.filter.clone(),
            include: options.include.clone(),
            limit: options.limit,
            sort_by: options.sort_by.clone(),
            descending: options.descending,
            ..FindOptions::default()
        };
        let mut request = RequestOptions::get(with_url_options(&url, &find));
        request.headers = self.model_for(entity.type_key()).headers().clone();
        request.headers.extend(options.headers.clone());
        self.request(request).await
    }

    /// Follow a link and store the result on the record under
    /// `options.as_field` (default: the link name).
    pub async fn import_link(
        &self,
        entity: &Entity,
        name: &str,
        options: &LinkOptions,
    ) -> Result<Entity, StoreError> {
        let value = self.follow_link(entity, name, options).await?;
        let field = options.as_field.clone().unwrap_or_else(|| name.to_owned());
        entity.set(field, value);
        Ok(entity.clone())
    }

    /// POST to the record's named action. The response may or may not be
    /// the same record.
    pub async fn do_action(
        &self,
        entity: &Entity,
        name: &str,
        data: Option<serde_json::Value>,
    ) -> Result<Value, StoreError> {
        let url = entity.action_for(name).ok_or_else(|| StoreError::UnknownAction {
            name: name.to_owned(),
        })?;
        let mut request = RequestOptions::new(Method::POST, url);
        request.data = data;
        request.headers = self.model_for(entity.type_key()).headers().clone();
        self.request(request).await
    }

    /// Fetch one named page (`next`, `prev`, ...) without depaginating.
    pub async fn follow_pagination<P: Paginatable + Sync>(
        &self,
        source: &P,
        name: &str,
    ) -> Result<Value, StoreError> {
        let url = source.page_for(name).ok_or_else(|| StoreError::UnknownLink {
            name: name.to_owned(),
        })?;
        self.request(RequestOptions::get(url).no_depaginate()).await
    }

    // ── Record helpers ───────────────────────────────────────────────

    /// A detached copy: serialized, then re-created without touching the cache.
    pub fn clone_record(&self, entity: &Entity) -> Result<Entity, StoreError> {
        let serde_json::Value::Object(data) = to_json(&Value::Entity(entity.clone()))?
        else {
            return Err(StoreError::MissingType {
                operation: "clone_record",
            });
        };
        self.create_record(data, &RecordOptions::default().detached().without_defaults())
    }

    /// Has an id and type, and is the cached representative for them.
    pub fn is_in_store(&self, entity: &Entity) -> bool {
        entity.id().is_some() && !entity.type_key().is_empty() && self.has_record(entity)
    }

    pub fn options_for(&self, entity: &Entity, field: &str) -> Vec<serde_json::Value> {
        self.schema_for(entity.type_key())
            .map(|s| s.options_for(field).to_vec())
            .unwrap_or_default()
    }

    pub fn default_for(&self, entity: &Entity, field: &str) -> Option<serde_json::Value> {
        self.schema_for(entity.type_key())?.default_for(field).cloned()
    }

    pub fn is_required(&self, entity: &Entity, field: &str) -> bool {
        self.schema_for(entity.type_key())
            .is_some_and(|s| s.is_required(field))
    }
}

impl Paginatable for Entity {
    fn page_for(&self, name: &str) -> Option<String> {
        Entity::page_for(self, name)
    }

    /// Entities carry one page of nothing; a following page is ignored.
    fn append_page(&mut self, _page: Collection) {}
}
