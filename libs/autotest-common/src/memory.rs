// In-process backend with the same semantics as the Redis store.
// Used for local development (`autotest-api --memory`) and by test suites.

use crate::store::{
    created_message, deleted_message, duplicate_name, updated_message, DefinitionStore,
    ScriptStore, StoreError, StoreResult, ToleranceStore,
};
use crate::types::{TaskId, TestAddress, TestDefinition, ToleranceFilters, Visibility};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskState {
    /// Newest first
    pub hidden: Vec<TestDefinition>,
    pub sample: Vec<TestDefinition>,
    pub scripts: HashMap<Visibility, Vec<u8>>,
    pub tolerance: Option<ToleranceFilters>,
}

impl TaskState {
    fn tests(&self, visibility: Visibility) -> &Vec<TestDefinition> {
        match visibility {
            Visibility::Hidden => &self.hidden,
            Visibility::Sample => &self.sample,
        }
    }

    fn tests_mut(&mut self, visibility: Visibility) -> &mut Vec<TestDefinition> {
        match visibility {
            Visibility::Hidden => &mut self.hidden,
            Visibility::Sample => &mut self.sample,
        }
    }

    fn position(&self, address: &TestAddress) -> Option<usize> {
        self.tests(address.visibility)
            .iter()
            .position(|t| t.name == address.name)
    }
}

pub type Snapshot = HashMap<TaskId, TaskState>;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: Mutex<Snapshot>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the full contents, for comparing before/after an operation
    pub fn snapshot(&self) -> Snapshot {
        match self.tasks.lock() {
            Ok(tasks) => tasks.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Snapshot>> {
        self.tasks
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DefinitionStore for InMemoryStore {
    async fn create(&self, task: &TaskId, definition: &TestDefinition) -> StoreResult<String> {
        definition.validate().map_err(StoreError::Rejected)?;
        let mut tasks = self.lock()?;
        let state = tasks.entry(task.clone()).or_default();

        if state.position(&definition.address()).is_some() {
            return Err(StoreError::Rejected("Test name already exists".to_string()));
        }
        state
            .tests_mut(definition.visibility)
            .insert(0, definition.clone());
        Ok(created_message(definition))
    }

    async fn read(&self, task: &TaskId, address: &TestAddress) -> StoreResult<TestDefinition> {
        let tasks = self.lock()?;
        tasks
            .get(task)
            .and_then(|state| {
                state
                    .tests(address.visibility)
                    .iter()
                    .find(|t| t.name == address.name)
                    .cloned()
            })
            .ok_or_else(|| {
                StoreError::NotFound(format!(
                    "Test with name '{}' not found. Aborting data fetch...",
                    address.name
                ))
            })
    }

    async fn update(
        &self,
        task: &TaskId,
        address: &TestAddress,
        definition: &TestDefinition,
    ) -> StoreResult<String> {
        definition.validate().map_err(StoreError::Rejected)?;
        let mut tasks = self.lock()?;
        let not_found = || {
            StoreError::NotFound(format!(
                "Test with name '{}' not found. Aborting edit...",
                address.name
            ))
        };
        let state = tasks.get_mut(task).ok_or_else(not_found)?;
        let index = state.position(address).ok_or_else(not_found)?;

        let target = definition.address();
        if target != *address && state.position(&target).is_some() {
            return Err(duplicate_name(&target.name));
        }

        if target.visibility == address.visibility {
            state.tests_mut(address.visibility)[index] = definition.clone();
        } else {
            state.tests_mut(address.visibility).remove(index);
            state
                .tests_mut(target.visibility)
                .insert(0, definition.clone());
        }
        Ok(updated_message(address, definition))
    }

    async fn delete(&self, task: &TaskId, address: &TestAddress) -> StoreResult<String> {
        let mut tasks = self.lock()?;
        let removed = tasks.get_mut(task).and_then(|state| {
            let index = state.position(address)?;
            Some(state.tests_mut(address.visibility).remove(index))
        });
        match removed {
            Some(_) => Ok(deleted_message(address)),
            None => Err(StoreError::NotFound(format!(
                "Test with name '{}' not found. Aborting delete...",
                address.name
            ))),
        }
    }

    async fn list_names(&self, task: &TaskId, visibility: Visibility) -> StoreResult<Vec<String>> {
        let tasks = self.lock()?;
        Ok(tasks
            .get(task)
            .map(|state| {
                state
                    .tests(visibility)
                    .iter()
                    .map(|t| t.name.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl ScriptStore for InMemoryStore {
    async fn upload_script(
        &self,
        task: &TaskId,
        target: Visibility,
        script: &[u8],
    ) -> StoreResult<String> {
        let mut tasks = self.lock()?;
        tasks
            .entry(task.clone())
            .or_default()
            .scripts
            .insert(target, script.to_vec());
        Ok("Script uploaded".to_string())
    }

    async fn fetch_script(&self, task: &TaskId) -> StoreResult<Option<Vec<u8>>> {
        let tasks = self.lock()?;
        Ok(tasks
            .get(task)
            .and_then(|state| state.scripts.get(&Visibility::Hidden).cloned()))
    }
}

#[async_trait]
impl ToleranceStore for InMemoryStore {
    async fn tolerance_filters(&self, task: &TaskId) -> StoreResult<ToleranceFilters> {
        let tasks = self.lock()?;
        Ok(tasks
            .get(task)
            .and_then(|state| state.tolerance)
            .unwrap_or_default())
    }

    async fn set_tolerance_filters(
        &self,
        task: &TaskId,
        filters: ToleranceFilters,
    ) -> StoreResult<String> {
        let mut tasks = self.lock()?;
        tasks.entry(task.clone()).or_default().tolerance = Some(filters);
        Ok("Tolerance filter settings saved.".to_string())
    }
}
