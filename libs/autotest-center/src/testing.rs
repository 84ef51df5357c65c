// Test double: the in-memory store plus a call journal and injectable failures

use async_trait::async_trait;
use autotest_common::memory::{InMemoryStore, Snapshot};
use autotest_common::store::{
    DefinitionStore, ScriptStore, StoreError, StoreResult, ToleranceStore,
};
use autotest_common::types::{TaskId, TestAddress, TestDefinition, ToleranceFilters, Visibility};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Create(TestDefinition),
    Read(TestAddress),
    Update(TestAddress, TestDefinition),
    Delete(TestAddress),
    ListNames(Visibility),
    UploadScript(Visibility),
    FetchScript,
}

#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: InMemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    failures: Mutex<HashMap<&'static str, String>>,
    stalls: Mutex<HashMap<&'static str, Duration>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.snapshot()
    }

    pub fn script_copy(&self, task: &TaskId, target: Visibility) -> Option<Vec<u8>> {
        self.inner
            .snapshot()
            .get(task)
            .and_then(|state| state.scripts.get(&target).cloned())
    }

    /// Every following call of `operation` fails with `message`
    pub fn fail(&self, operation: &'static str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(operation, message.to_string());
    }

    pub fn recover(&self, operation: &'static str) {
        self.failures.lock().unwrap().remove(operation);
        self.stalls.lock().unwrap().remove(operation);
    }

    /// Every following call of `operation` sleeps before it reaches the store
    pub fn stall(&self, operation: &'static str, delay: Duration) {
        self.stalls.lock().unwrap().insert(operation, delay);
    }

    pub fn fail_script_upload(&self, target: Visibility, message: &str) {
        let operation = match target {
            Visibility::Hidden => "upload_hidden",
            Visibility::Sample => "upload_sample",
        };
        self.fail(operation, message);
    }

    pub fn fail_script_fetch(&self, message: &str) {
        self.fail("fetch_script", message);
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self, operation: &str) {
        let delay = self.stalls.lock().unwrap().get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn injected(&self, operation: &str) -> StoreResult<()> {
        match self.failures.lock().unwrap().get(operation) {
            Some(message) => Err(StoreError::Backend(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DefinitionStore for RecordingStore {
    async fn create(&self, task: &TaskId, definition: &TestDefinition) -> StoreResult<String> {
        self.record(StoreCall::Create(definition.clone()));
        self.pause("create").await;
        self.injected("create")?;
        self.inner.create(task, definition).await
    }

    async fn read(&self, task: &TaskId, address: &TestAddress) -> StoreResult<TestDefinition> {
        self.record(StoreCall::Read(address.clone()));
        self.pause("read").await;
        self.injected("read")?;
        self.inner.read(task, address).await
    }

    async fn update(
        &self,
        task: &TaskId,
        address: &TestAddress,
        definition: &TestDefinition,
    ) -> StoreResult<String> {
        self.record(StoreCall::Update(address.clone(), definition.clone()));
        self.pause("update").await;
        self.injected("update")?;
        self.inner.update(task, address, definition).await
    }

    async fn delete(&self, task: &TaskId, address: &TestAddress) -> StoreResult<String> {
        self.record(StoreCall::Delete(address.clone()));
        self.pause("delete").await;
        self.injected("delete")?;
        self.inner.delete(task, address).await
    }

    async fn list_names(&self, task: &TaskId, visibility: Visibility) -> StoreResult<Vec<String>> {
        self.record(StoreCall::ListNames(visibility));
        self.injected("list_names")?;
        self.inner.list_names(task, visibility).await
    }
}

#[async_trait]
impl ScriptStore for RecordingStore {
    async fn upload_script(
        &self,
        task: &TaskId,
        target: Visibility,
        script: &[u8],
    ) -> StoreResult<String> {
        self.record(StoreCall::UploadScript(target));
        match target {
            Visibility::Hidden => self.injected("upload_hidden")?,
            Visibility::Sample => self.injected("upload_sample")?,
        }
        self.inner.upload_script(task, target, script).await
    }

    async fn fetch_script(&self, task: &TaskId) -> StoreResult<Option<Vec<u8>>> {
        self.record(StoreCall::FetchScript);
        self.injected("fetch_script")?;
        self.inner.fetch_script(task).await
    }
}

#[async_trait]
impl ToleranceStore for RecordingStore {
    async fn tolerance_filters(&self, task: &TaskId) -> StoreResult<ToleranceFilters> {
        self.inner.tolerance_filters(task).await
    }

    async fn set_tolerance_filters(
        &self,
        task: &TaskId,
        filters: ToleranceFilters,
    ) -> StoreResult<String> {
        self.inner.set_tolerance_filters(task, filters).await
    }
}
