//! Contracts for the remote authorities the autotest center talks to.
//!
//! Every method maps one request to one response. Messages returned on
//! success are meant to be shown to the user verbatim.

use crate::types::{TaskId, TestAddress, TestDefinition, ToleranceFilters, Visibility};
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store refused the request (duplicate name, invalid definition)
    Rejected(String),
    /// The addressed test or task does not exist
    NotFound(String),
    /// Transport or serialization failure
    Backend(String),
}

impl StoreError {
    pub fn message(&self) -> &str {
        match self {
            StoreError::Rejected(msg) | StoreError::NotFound(msg) | StoreError::Backend(msg) => msg,
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Error for StoreError {}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(format!("serialization error: {}", e))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Authority for individual test definitions, keyed by (task, visibility, name)
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    async fn create(&self, task: &TaskId, definition: &TestDefinition) -> StoreResult<String>;

    async fn read(&self, task: &TaskId, address: &TestAddress) -> StoreResult<TestDefinition>;

    /// Replace the test stored at `address` with `definition`, which may carry
    /// a different name and visibility
    async fn update(
        &self,
        task: &TaskId,
        address: &TestAddress,
        definition: &TestDefinition,
    ) -> StoreResult<String>;

    async fn delete(&self, task: &TaskId, address: &TestAddress) -> StoreResult<String>;

    /// Names in one visibility class, newest first
    async fn list_names(&self, task: &TaskId, visibility: Visibility) -> StoreResult<Vec<String>>;
}

/// Storage for the per-task grading script
#[async_trait]
pub trait ScriptStore: Send + Sync {
    async fn upload_script(
        &self,
        task: &TaskId,
        target: Visibility,
        script: &[u8],
    ) -> StoreResult<String>;

    /// `Ok(None)` when no script has been uploaded yet
    async fn fetch_script(&self, task: &TaskId) -> StoreResult<Option<Vec<u8>>>;
}

#[async_trait]
pub trait ToleranceStore: Send + Sync {
    async fn tolerance_filters(&self, task: &TaskId) -> StoreResult<ToleranceFilters>;

    async fn set_tolerance_filters(
        &self,
        task: &TaskId,
        filters: ToleranceFilters,
    ) -> StoreResult<String>;
}

/// Everything a host needs from one backend
pub trait AutotestBackend: DefinitionStore + ScriptStore + ToleranceStore {}

impl<T: DefinitionStore + ScriptStore + ToleranceStore> AutotestBackend for T {}

pub(crate) fn created_message(definition: &TestDefinition) -> String {
    format!(
        "{} added as {}",
        definition.name,
        definition.visibility.target_name()
    )
}

pub(crate) fn updated_message(old: &TestAddress, definition: &TestDefinition) -> String {
    format!("Test '{}' updated to '{}'", old.name, definition.name)
}

pub(crate) fn deleted_message(address: &TestAddress) -> String {
    format!("{} deleted", address.name)
}

pub(crate) fn duplicate_name(name: &str) -> StoreError {
    StoreError::Rejected(format!("Test with name '{}' already exists", name))
}
