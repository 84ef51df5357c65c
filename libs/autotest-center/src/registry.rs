/// Script Registry - the single grading script of a task
///
/// One logical file, two storage targets: the automark (hidden) copy and the
/// autotest (sample) copy. Replacing the script uploads both copies
/// concurrently. The two requests are independent: a failure on one side is
/// reported on its own and the other side is not rolled back.

use crate::notify::Notifier;
use autotest_common::store::{ScriptStore, StoreError};
use autotest_common::types::{TaskId, Visibility};
use futures_util::future::join;
use std::sync::Arc;
use tracing::{info, warn};

pub const SCRIPT_FILE_NAME: &str = "run.sh";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ScriptFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Outcome of both upload requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUploadOutcome {
    pub hidden: Result<String, StoreError>,
    pub sample: Result<String, StoreError>,
}

impl ScriptUploadOutcome {
    pub fn succeeded(&self) -> bool {
        self.hidden.is_ok() && self.sample.is_ok()
    }
}

pub struct ScriptRegistry<S: ?Sized> {
    store: Arc<S>,
    task: TaskId,
    script: Option<ScriptFile>,
    uploaded: bool,
    notifier: Notifier,
}

impl<S> ScriptRegistry<S>
where
    S: ScriptStore + ?Sized,
{
    pub fn new(store: Arc<S>, task: TaskId) -> Self {
        Self {
            store,
            task,
            script: None,
            uploaded: false,
            notifier: Notifier::default(),
        }
    }

    pub fn script(&self) -> Option<&ScriptFile> {
        self.script.as_ref()
    }

    /// True only when the cached script is known to be on both targets
    pub fn is_uploaded(&self) -> bool {
        self.uploaded
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    /// Pull the current script, if any. A task without a script is normal.
    pub async fn load(&mut self) {
        match self.store.fetch_script(&self.task).await {
            Ok(Some(bytes)) => {
                self.script = Some(ScriptFile::new(SCRIPT_FILE_NAME, bytes));
                self.uploaded = true;
            }
            Ok(None) => {
                info!(task = %self.task, "Script file does not exist, skipping");
            }
            Err(e) => {
                self.notifier.alert(format!("Error loading script: {}", e));
            }
        }
    }

    /// Replace the script on both targets
    pub async fn upload(&mut self, script: ScriptFile) -> ScriptUploadOutcome {
        let bytes = script.bytes.clone();
        self.script = Some(script);
        self.uploaded = false;

        let (hidden, sample) = join(
            self.store.upload_script(&self.task, Visibility::Hidden, &bytes),
            self.store.upload_script(&self.task, Visibility::Sample, &bytes),
        )
        .await;
        let outcome = ScriptUploadOutcome { hidden, sample };

        for (target, result) in [
            (Visibility::Hidden, &outcome.hidden),
            (Visibility::Sample, &outcome.sample),
        ] {
            match result {
                Ok(message) => self
                    .notifier
                    .success(format!("Success: {} ({})", message, target.target_name())),
                Err(e) => {
                    warn!(task = %self.task, target = target.target_name(), error = %e, "Script upload failed");
                    self.notifier
                        .alert(format!("Error: {} ({})", e, target.target_name()))
                }
            }
        }

        self.uploaded = outcome.succeeded();
        outcome
    }

    /// File name offered when the script is downloaded
    pub fn download_name(&self) -> String {
        format!(
            "{}_{}_{}",
            self.task.course_code,
            self.task.task_segment(),
            SCRIPT_FILE_NAME
        )
    }

    /// The cached script with its download name
    pub fn download(&mut self) -> Option<(String, &ScriptFile)> {
        if self.script.is_none() {
            self.notifier.alert("No script file to be downloaded.");
        }
        let name = self.download_name();
        self.script.as_ref().map(|script| (name, script))
    }
}
