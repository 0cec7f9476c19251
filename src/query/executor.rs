#![forbid(unsafe_code)]

//! Search execution: validate, compile, fetch a window, and optionally count.

use std::time::Instant;

use tracing::debug;

use crate::config::SearchOptions;

use super::compile::compile_query;
use super::errors::{SearchError, ValidationError};
use super::predicate::CompiledQuery;
use super::request::{SearchRequest, SearchResult};
use super::schema::SchemaProvider;
use super::store::{Store, Window};
use super::validate::validate_request;

/// Runs search requests against one schema and store.
pub struct SearchExecutor<'a, S: Store + ?Sized> {
    schema: &'a dyn SchemaProvider,
    store: &'a S,
    options: SearchOptions,
}

impl<'a, S: Store + ?Sized> SearchExecutor<'a, S> {
    /// Creates an executor with default [`SearchOptions`].
    pub fn new(schema: &'a dyn SchemaProvider, store: &'a S) -> Self {
        Self::with_options(schema, store, SearchOptions::default())
    }

    /// Creates an executor with explicit limits.
    pub fn with_options(schema: &'a dyn SchemaProvider, store: &'a S, options: SearchOptions) -> Self {
        Self {
            schema,
            store,
            options,
        }
    }

    /// Limits in effect.
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Searches `entity`; the total count is computed unless the options
    /// disable it by default.
    pub fn search(
        &self,
        entity: &str,
        request: &SearchRequest,
    ) -> Result<SearchResult<S::Entity>, SearchError> {
        self.search_with(entity, request, self.options.include_total_by_default)
    }

    /// Searches `entity`, running the count query only when `want_total` is set.
    pub fn search_with(
        &self,
        entity: &str,
        request: &SearchRequest,
        want_total: bool,
    ) -> Result<SearchResult<S::Entity>, SearchError> {
        let compiled = self.plan(entity, request)?;
        self.execute(&compiled, request, want_total)
    }

    /// Searches `entity` and maps every item with `mapper`.
    pub fn search_map<D, F>(
        &self,
        entity: &str,
        request: &SearchRequest,
        mapper: F,
    ) -> Result<SearchResult<D>, SearchError>
    where
        F: FnMut(S::Entity) -> D,
    {
        Ok(self.search(entity, request)?.map(mapper))
    }

    /// Validates the request and compiles its filter and sorts.
    pub fn plan(&self, entity: &str, request: &SearchRequest) -> Result<CompiledQuery, SearchError> {
        validate_request(request, &self.options)?;
        compile_query(request.filter.as_ref(), &request.sorts, self.schema, entity)
    }

    /// Runs an already compiled query with the request's window and distinct flag.
    pub fn execute(
        &self,
        compiled: &CompiledQuery,
        request: &SearchRequest,
        want_total: bool,
    ) -> Result<SearchResult<S::Entity>, SearchError> {
        let window = window_of(request)?;
        let started = Instant::now();
        let items = self.store.fetch(compiled, window, request.distinct)?;
        debug!(
            root = %compiled.root,
            offset = window.offset,
            limit = window.limit,
            distinct = request.distinct,
            items = items.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "fetched page"
        );
        let total_count = if want_total {
            let started = Instant::now();
            let total = self.store.count(compiled, request.distinct)?;
            debug!(
                root = %compiled.root,
                total,
                elapsed_us = started.elapsed().as_micros() as u64,
                "counted matches"
            );
            Some(total)
        } else {
            None
        };
        Ok(SearchResult { items, total_count })
    }
}

fn window_of(request: &SearchRequest) -> Result<Window, ValidationError> {
    let offset = u64::try_from(request.start_index).map_err(|_| {
        ValidationError::NegativeStartIndex {
            start_index: request.start_index,
        }
    })?;
    let limit = u64::try_from(request.count).map_err(|_| ValidationError::CountRequired {
        count: request.count,
    })?;
    Ok(Window { offset, limit })
}

/// One-shot search with default options and the total count included.
pub fn search<S: Store + ?Sized>(
    schema: &dyn SchemaProvider,
    store: &S,
    entity: &str,
    request: &SearchRequest,
) -> Result<SearchResult<S::Entity>, SearchError> {
    SearchExecutor::new(schema, store).search(entity, request)
}
