//! Autotest definition management for one task: the editing state machine,
//! its form and summary lists, and the task's grading script.

pub mod coordinator;
pub mod form;
pub mod notify;
pub mod registry;
pub mod summary;

#[cfg(test)]
mod coordinator_tests;
#[cfg(test)]
mod testing;

pub use coordinator::{EditState, EditingCoordinator};
pub use form::{AuthoringMode, DefinitionForm, FormContent, ValidationError};
pub use notify::{Notification, Notifier};
pub use registry::{ScriptFile, ScriptRegistry, ScriptUploadOutcome};
pub use summary::TestSummaryCache;

use autotest_common::store::AutotestBackend;
use autotest_common::types::TaskId;
use std::sync::Arc;

/// Everything a host shell drives for one task
pub struct AutotestCenter<B: ?Sized> {
    pub coordinator: EditingCoordinator<B>,
    pub scripts: ScriptRegistry<B>,
}

impl<B> AutotestCenter<B>
where
    B: AutotestBackend + ?Sized,
{
    /// Build the center and load the script and both summary lists
    pub async fn open(backend: Arc<B>, task: TaskId) -> Self {
        let mut center = Self {
            coordinator: EditingCoordinator::new(backend.clone(), task.clone()),
            scripts: ScriptRegistry::new(backend, task),
        };
        center.scripts.load().await;
        center.coordinator.reload().await;
        center
    }

    pub fn close(&mut self) {
        self.coordinator.close();
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut notifications = self.scripts.notifier_mut().drain();
        notifications.extend(self.coordinator.drain_notifications());
        notifications
    }
}
