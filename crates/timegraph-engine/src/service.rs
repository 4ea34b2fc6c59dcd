//! `TimegraphService` is the one handle an embedding layer holds. Owns the
//! storage engine and the configuration and exposes the whole operation
//! surface: commits, temporal queries, skeleton sync, traversal, ksp,
//! purge, and scope-level restore.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use timegraph_core::config::TimegraphConfig;
use timegraph_core::models::{
    CommitOptions, CommitResult, DiffQuery, EventKind, KspOptions, LogQuery, LogResult, NodeDiff,
    ShowQuery, ShowResult, TraversalResult, TraverseOptions, WeightedPath,
};
use timegraph_core::{TgResult, TimegraphError};
use timegraph_storage::queries::{document_ops, event_ops};
use timegraph_storage::StorageEngine;

use crate::commit::{self, CommitItem, CommitOp};
use crate::purge::{self, PurgeOptions, PurgeStats};
use crate::query::{diff, log, show};
use crate::reconstruct;
use crate::scope::Scope;
use crate::skeleton::ksp::{self, KspRequest};
use crate::skeleton::sync::{self, SyncStats};
use crate::skeleton::traverse::{self, TraverseRequest};

pub struct TimegraphService {
    storage: Arc<StorageEngine>,
    config: TimegraphConfig,
}

impl TimegraphService {
    /// Open the store described by the configuration.
    pub fn open(config: TimegraphConfig) -> TgResult<Self> {
        let storage = Arc::new(StorageEngine::open(&config.storage)?);
        Ok(Self { storage, config })
    }

    /// In-memory service with the given configuration; mainly for tests.
    pub fn in_memory(mut config: TimegraphConfig) -> TgResult<Self> {
        config.storage.path = None;
        Self::open(config)
    }

    pub fn config(&self) -> &TimegraphConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageEngine {
        &self.storage
    }

    /// The store clock.
    pub fn now(&self) -> TgResult<DateTime<Utc>> {
        self.storage.now()
    }

    // -----------------------------------------------------------------------
    // write path

    pub fn commit(
        &self,
        collection: &str,
        key: &str,
        payload: Option<Value>,
        op: CommitOp,
        opts: &CommitOptions,
    ) -> TgResult<CommitResult> {
        commit::commit(&self.storage, &self.config, collection, key, payload, op, opts)
    }

    pub fn insert(
        &self,
        collection: &str,
        key: &str,
        value: Value,
        opts: &CommitOptions,
    ) -> TgResult<CommitResult> {
        self.commit(collection, key, Some(value), CommitOp::Insert, opts)
    }

    pub fn replace(
        &self,
        collection: &str,
        key: &str,
        value: Value,
        opts: &CommitOptions,
    ) -> TgResult<CommitResult> {
        self.commit(collection, key, Some(value), CommitOp::Replace, opts)
    }

    pub fn update(
        &self,
        collection: &str,
        key: &str,
        value: Value,
        opts: &CommitOptions,
    ) -> TgResult<CommitResult> {
        self.commit(collection, key, Some(value), CommitOp::Update, opts)
    }

    pub fn remove(&self, collection: &str, key: &str, opts: &CommitOptions) -> TgResult<CommitResult> {
        self.commit(collection, key, None, CommitOp::Remove, opts)
    }

    pub fn restore(&self, collection: &str, key: &str, opts: &CommitOptions) -> TgResult<CommitResult> {
        self.commit(collection, key, None, CommitOp::Restore, opts)
    }

    /// Batch commit with per-item results; one failure never aborts the rest.
    pub fn commit_many(
        &self,
        collection: &str,
        items: Vec<CommitItem>,
        opts: &CommitOptions,
    ) -> Vec<Result<CommitResult, TimegraphError>> {
        commit::commit_many(&self.storage, &self.config, collection, items, opts)
    }

    // -----------------------------------------------------------------------
    // read path

    pub fn log(&self, path: &str, query: &LogQuery) -> TgResult<LogResult> {
        let scope = self.scope(path)?;
        log::log(&self.storage, &scope, query)
    }

    pub fn diff(&self, path: &str, query: &DiffQuery) -> TgResult<Vec<NodeDiff>> {
        let scope = self.scope(path)?;
        diff::diff(&self.storage, &scope, query)
    }

    pub fn show(&self, path: &str, at: DateTime<Utc>, query: &ShowQuery) -> TgResult<ShowResult> {
        let scope = self.scope(path)?;
        show::show(&self.storage, &scope, at, query)
    }

    // -----------------------------------------------------------------------
    // skeleton graph

    pub fn sync(&self, path: &str) -> TgResult<SyncStats> {
        let scope = self.scope(path)?;
        sync::sync(&self.storage, &scope)
    }

    pub fn traverse(
        &self,
        request: &TraverseRequest,
        opts: &TraverseOptions,
    ) -> TgResult<TraversalResult> {
        traverse::traverse(&self.storage, request, opts)
    }

    pub fn ksp(&self, request: &KspRequest, opts: &KspOptions) -> TgResult<Vec<WeightedPath>> {
        ksp::ksp(&self.storage, request, opts)
    }

    // -----------------------------------------------------------------------
    // maintenance

    pub fn purge(&self, path: &str, opts: &PurgeOptions) -> TgResult<PurgeStats> {
        let scope = self.scope(path)?;
        purge::purge(&self.storage, &scope, opts)
    }

    /// Restore every entity in scope whose terminal event is a delete.
    /// Batch semantics: per-entity results, failures stay in place.
    pub fn restore_scope(
        &self,
        path: &str,
        opts: &CommitOptions,
    ) -> TgResult<Vec<Result<CommitResult, TimegraphError>>> {
        let scope = self.scope(path)?;

        let candidates: Vec<String> = self.storage.readers().with_conn(|conn| {
            let mut out = Vec::new();
            for entity_id in event_ops::list_entity_ids(conn, scope.collections())? {
                if !scope.matches_entity(&entity_id) {
                    continue;
                }
                let terminal = reconstruct::latest_event(conn, &entity_id)?;
                if terminal.is_some_and(|e| e.event == EventKind::Deleted) {
                    out.push(entity_id);
                }
            }
            Ok(out)
        })?;

        Ok(candidates
            .into_iter()
            .filter_map(|entity_id| {
                let (collection, key) = entity_id.split_once('/')?;
                Some(self.commit(collection, key, None, CommitOp::Restore, opts))
            })
            .collect())
    }

    /// Resolve a scope path against the configuration and the collections
    /// currently known to the store.
    fn scope(&self, path: &str) -> TgResult<Scope> {
        let collections = self
            .storage
            .readers()
            .with_conn(document_ops::list_collections)?;
        Scope::resolve(path, &self.config, &collections)
    }
}
