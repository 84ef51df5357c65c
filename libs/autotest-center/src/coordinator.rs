/// Editing Coordinator - decides what the form currently means
///
/// **States:**
/// - `Idle`: pristine form, nothing staged
/// - `Creating`: form holds an unsaved new test
/// - `EditLoading`: a summary entry was selected, its definition is being fetched
/// - `EditReady`: form holds a stored definition, edits go to its original address
/// - `Submitting`: a create or update is in flight
///
/// **Ordering guarantee:**
/// The summary cache is only touched after the store acknowledged the
/// operation. A rejected request leaves cache, token and form as they were.
///
/// The staged test is held as a structured `TestAddress`, so a rename or a
/// visibility change never loses track of where the original lives.

use crate::form::{AuthoringMode, DefinitionForm};
use crate::notify::{Notification, Notifier};
use crate::summary::TestSummaryCache;
use autotest_common::store::DefinitionStore;
use autotest_common::types::{TaskId, TestAddress, TestDefinition};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum EditState {
    Idle,
    Creating,
    EditLoading {
        address: TestAddress,
    },
    EditReady {
        address: TestAddress,
        original: TestDefinition,
    },
    Submitting {
        address: Option<TestAddress>,
    },
}

impl EditState {
    /// Address of the test staged for editing, if any
    pub fn staged(&self) -> Option<&TestAddress> {
        match self {
            EditState::EditLoading { address } | EditState::EditReady { address, .. } => {
                Some(address)
            }
            EditState::Submitting { address } => address.as_ref(),
            EditState::Idle | EditState::Creating => None,
        }
    }
}

pub struct EditingCoordinator<S: ?Sized> {
    store: Arc<S>,
    task: TaskId,
    state: EditState,
    form: DefinitionForm,
    summaries: TestSummaryCache,
    notifier: Notifier,
}

impl<S> EditingCoordinator<S>
where
    S: DefinitionStore + ?Sized,
{
    pub fn new(store: Arc<S>, task: TaskId) -> Self {
        Self {
            store,
            task,
            state: EditState::Idle,
            form: DefinitionForm::default(),
            summaries: TestSummaryCache::new(),
            notifier: Notifier::default(),
        }
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    pub fn state(&self) -> &EditState {
        &self.state
    }

    pub fn form(&self) -> &DefinitionForm {
        &self.form
    }

    pub fn summaries(&self) -> &TestSummaryCache {
        &self.summaries
    }

    /// The definition as it was fetched, while an edit is ready
    pub fn staged_original(&self) -> Option<&TestDefinition> {
        match &self.state {
            EditState::EditReady { original, .. } => Some(original),
            _ => None,
        }
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifier.drain()
    }

    /// Mutable access to the form. Touching an idle form starts a new draft.
    pub fn form_mut(&mut self) -> &mut DefinitionForm {
        if self.state == EditState::Idle {
            self.state = EditState::Creating;
        }
        &mut self.form
    }

    /// Replace the summary lists with the store's view
    pub async fn reload(&mut self) -> bool {
        match TestSummaryCache::load(&*self.store, &self.task).await {
            Ok(summaries) => {
                self.summaries = summaries;
                true
            }
            Err(e) => {
                self.summaries = TestSummaryCache::new();
                self.notifier.alert(format!("Error loading tests: {}", e));
                false
            }
        }
    }

    /// Flip between manual and file authoring. Refused while a test is staged.
    pub fn toggle_mode(&mut self) -> bool {
        if self.refuse_if_busy() {
            return false;
        }
        if self.state.staged().is_some() {
            self.notifier
                .alert("Authoring mode cannot change while a test is staged for editing.");
            return false;
        }
        let mode = self.form.mode().toggled();
        self.form.switch_mode(mode);
        self.state = EditState::Idle;
        true
    }

    /// Store the form as a new test
    pub async fn submit_create(&mut self) -> bool {
        if self.refuse_if_busy() {
            return false;
        }
        if let Some(address) = self.state.staged() {
            self.notifier.alert(format!(
                "Error adding test: '{}' is staged for editing.",
                address.name
            ));
            return false;
        }
        let definition = match self.form.validate() {
            Ok(definition) => definition,
            Err(e) => {
                self.notifier.alert(e.to_string());
                return false;
            }
        };

        self.state = EditState::Submitting { address: None };
        match self.store.create(&self.task, &definition).await {
            Ok(message) => {
                self.summaries
                    .add_local(&definition.name, definition.visibility);
                self.notifier.success(message);
                self.form.reset();
                self.state = EditState::Idle;
                info!(task = %self.task, test = %definition.address(), "Test created");
                true
            }
            Err(e) => {
                self.notifier.alert(format!("Error adding test: {}", e));
                self.state = EditState::Creating;
                false
            }
        }
    }

    /// Stage a stored test for editing and load it into the form
    pub async fn select_for_edit(&mut self, address: TestAddress) -> bool {
        if self.refuse_if_busy() {
            return false;
        }
        self.form.switch_mode(AuthoringMode::Manual);
        self.state = EditState::EditLoading {
            address: address.clone(),
        };
        debug!(task = %self.task, test = %address, "Loading test for editing");

        match self.store.read(&self.task, &address).await {
            Ok(original) => {
                self.form.populate(&original);
                self.state = EditState::EditReady { address, original };
                true
            }
            Err(e) => {
                self.notifier.alert(format!("Error loading test: {}", e));
                self.form.reset();
                self.state = EditState::Idle;
                false
            }
        }
    }

    /// Write the form over the staged test, addressed by where it was loaded from
    pub async fn confirm_edit(&mut self) -> bool {
        if self.refuse_if_busy() {
            return false;
        }
        let (address, original) = match std::mem::replace(&mut self.state, EditState::Idle) {
            EditState::EditReady { address, original } => (address, original),
            other => {
                self.state = other;
                self.notifier
                    .alert("Error editing test: no test staged for editing.");
                return false;
            }
        };
        let definition = match self.form.validate() {
            Ok(definition) => definition,
            Err(e) => {
                self.notifier.alert(format!("Error editing test: {}", e));
                self.state = EditState::EditReady { address, original };
                return false;
            }
        };

        self.state = EditState::Submitting {
            address: Some(address.clone()),
        };
        match self.store.update(&self.task, &address, &definition).await {
            Ok(message) => {
                self.summaries
                    .rename_local(&address, &definition.address());
                self.notifier.success(format!("Success: {}", message));
                self.form.reset();
                self.state = EditState::Idle;
                info!(task = %self.task, from = %address, to = %definition.address(), "Test edited");
                true
            }
            Err(e) => {
                self.notifier.alert(format!("Error editing test: {}", e));
                self.state = EditState::EditReady { address, original };
                false
            }
        }
    }

    /// Drop the staged test and the draft. Never talks to the store.
    pub fn cancel_edit(&mut self) {
        self.state = EditState::Idle;
        self.form.reset();
    }

    /// Delete the test behind a summary entry
    pub async fn delete(&mut self, address: TestAddress) -> bool {
        if self.refuse_if_busy() {
            return false;
        }
        match self.store.delete(&self.task, &address).await {
            Ok(message) => {
                self.summaries.remove_local(&address.name, address.visibility);
                self.notifier.success(format!("Success: {}", message));
                if self.state.staged() == Some(&address) {
                    self.state = EditState::Idle;
                    self.form.reset();
                }
                info!(task = %self.task, test = %address, "Test deleted");
                true
            }
            Err(e) => {
                self.notifier.alert(format!("Error deleting test: {}", e));
                false
            }
        }
    }

    /// The host closed the center
    pub fn close(&mut self) {
        self.cancel_edit();
    }

    // Submitting is only observable here if an earlier request future was
    // dropped before it resolved; cancel_edit/close recover from it.
    fn refuse_if_busy(&mut self) -> bool {
        if matches!(self.state, EditState::Submitting { .. }) {
            self.notifier
                .alert("Another request is still in flight. Cancel to start over.");
            return true;
        }
        false
    }
}
