//! Blocking facade over an async adapter

use std::sync::{Mutex, PoisonError};

use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::MetadataAdapter;
use crate::error::{DataverseError, Result};
use crate::model::{
    AttributeMetadata, FormMetadata, Solution, TableInfo, TableMetadata, ViewMetadata,
};

/// Runs adapter operations to completion on a private current-thread runtime.
///
/// For hosts that call from a plain background thread. Must not be called
/// from inside an async context. Another thread can abort in-flight calls
/// through [`BlockingAdapter::cancellation_token`]; once cancelled, calls keep
/// failing until [`BlockingAdapter::reset_cancellation`] installs a new token.
pub struct BlockingAdapter<A> {
    inner: A,
    runtime: Runtime,
    cancel: Mutex<CancellationToken>,
}

impl<A: MetadataAdapter> BlockingAdapter<A> {
    pub fn new(inner: A) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| DataverseError::RuntimeInit { source })?;
        Ok(Self {
            inner,
            runtime,
            cancel: Mutex::new(CancellationToken::new()),
        })
    }

    /// Token observed by every call made through this facade
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the token so calls run again after a cancel.
    ///
    /// Clones of the previous token no longer affect this facade. Returns
    /// the new token.
    pub fn reset_cancellation(&self) -> CancellationToken {
        let fresh = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        fresh
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    pub fn into_inner(self) -> A {
        self.inner
    }

    pub fn list_solutions(&self) -> Result<Vec<Solution>> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.list_solutions(&cancel))
    }

    pub fn find_solution(&self, unique_name: &str) -> Result<Solution> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.find_solution(unique_name, &cancel))
    }

    pub fn list_solution_tables(&self, solution_id: Uuid) -> Result<Vec<TableInfo>> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.list_solution_tables(solution_id, &cancel))
    }

    pub fn get_table_metadata(&self, logical_name: &str) -> Result<TableMetadata> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.get_table_metadata(logical_name, &cancel))
    }

    pub fn list_attributes(&self, table_logical_name: &str) -> Result<Vec<AttributeMetadata>> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.list_attributes(table_logical_name, &cancel))
    }

    pub fn list_forms(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
    ) -> Result<Vec<FormMetadata>> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.list_forms(
            entity_logical_name,
            include_definition,
            &cancel,
        ))
    }

    pub fn get_form_definition(&self, form_id: Uuid) -> Result<String> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.get_form_definition(form_id, &cancel))
    }

    pub fn list_views(
        &self,
        entity_logical_name: &str,
        include_definition: bool,
    ) -> Result<Vec<ViewMetadata>> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.list_views(
            entity_logical_name,
            include_definition,
            &cancel,
        ))
    }

    pub fn get_view_definition(&self, view_id: Uuid) -> Result<String> {
        let cancel = self.cancellation_token();
        self.runtime.block_on(self.inner.get_view_definition(view_id, &cancel))
    }
}
