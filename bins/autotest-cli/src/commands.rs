// CLI commands driving the autotest center against Redis
use anyhow::{bail, Context, Result};
use autotest_center::{AuthoringMode, AutotestCenter, DefinitionForm, Notification, ScriptFile};
use autotest_common::redis::RedisStore;
use autotest_common::store::ToleranceStore;
use autotest_common::types::{FileBlob, TaskId, TestAddress, Visibility};
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::DefinitionArgs;

/// Connection and task every command works on
pub struct Session {
    backend: Arc<RedisStore>,
    task: TaskId,
}

impl Session {
    pub async fn connect(redis_url: &str, course: &str, task: &str) -> Result<Self> {
        let store = RedisStore::connect(redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", redis_url))?;
        debug!(redis_url, "Connected to Redis");
        Ok(Self {
            backend: Arc::new(store),
            task: TaskId::new(course, task),
        })
    }

    async fn open(&self) -> AutotestCenter<RedisStore> {
        AutotestCenter::open(self.backend.clone(), self.task.clone()).await
    }
}

#[derive(Debug, Default)]
pub struct ToleranceChanges {
    pub trailing_newline: Option<bool>,
    pub trailing_whitespaces: Option<bool>,
    pub whitespaces_amount: Option<bool>,
    pub case_differences: Option<bool>,
}

impl ToleranceChanges {
    fn is_empty(&self) -> bool {
        self.trailing_newline.is_none()
            && self.trailing_whitespaces.is_none()
            && self.whitespaces_amount.is_none()
            && self.case_differences.is_none()
    }
}

#[derive(Serialize)]
struct Listing<'a> {
    hidden: &'a [String],
    sample: &'a [String],
}

fn visibility(hidden: bool) -> Visibility {
    Visibility::from_hidden_flag(hidden)
}

/// Print notifications; successes to stdout, alerts to stderr
fn report(notifications: Vec<Notification>) -> Result<()> {
    let mut alerts = 0;
    for notification in notifications {
        match notification {
            Notification::Success(msg) => println!("{}", msg),
            Notification::Alert(msg) => {
                eprintln!("{}", msg);
                alerts += 1;
            }
        }
    }
    if alerts > 0 {
        bail!("{} operation(s) failed", alerts);
    }
    Ok(())
}

fn read_blob(path: &Path) -> Result<FileBlob> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(FileBlob::new(file_name, bytes))
}

/// Copy command line fields into the form. Files are attached in file mode and
/// read as text in manual mode.
fn apply_definition(form: &mut DefinitionForm, args: DefinitionArgs) -> Result<()> {
    if let Some(runner_args) = args.runner_args {
        form.runner_args = runner_args;
    }
    if let Some(cpu) = args.cpu {
        form.cpu_time_limit = cpu;
    }
    if let Some(memory) = args.memory {
        form.memory_limit = memory;
    }

    if let Some(input) = args.input {
        form.set_manual_input(input)?;
    }
    if let Some(output) = args.output {
        form.set_manual_output(output)?;
    }

    if let Some(path) = args.input_file {
        let blob = read_blob(&path)?;
        match form.mode() {
            AuthoringMode::File => form.attach_input_file(blob)?,
            AuthoringMode::Manual => {
                form.set_manual_input(String::from_utf8_lossy(&blob.bytes).into_owned())?
            }
        }
    }
    if let Some(path) = args.output_file {
        let blob = read_blob(&path)?;
        match form.mode() {
            AuthoringMode::File => form.attach_output_file(blob)?,
            AuthoringMode::Manual => {
                form.set_manual_output(String::from_utf8_lossy(&blob.bytes).into_owned())?
            }
        }
    }
    Ok(())
}

pub async fn list(session: Session, json: bool) -> Result<()> {
    let mut center = session.open().await;
    report(center.drain_notifications())?;

    let summaries = center.coordinator.summaries();
    if json {
        let listing = Listing {
            hidden: summaries.names(Visibility::Hidden),
            sample: summaries.names(Visibility::Sample),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    for visibility in Visibility::ALL {
        println!("{} tests ({}):", visibility, visibility.target_name());
        let names = summaries.names(visibility);
        if names.is_empty() {
            println!("  (none)");
        }
        for name in names {
            println!("  {}", name);
        }
    }
    Ok(())
}

pub async fn show(session: Session, name: &str, hidden: bool) -> Result<()> {
    let mut center = session.open().await;
    center
        .coordinator
        .select_for_edit(TestAddress::new(name, visibility(hidden)))
        .await;
    report(center.drain_notifications())?;

    if let Some(definition) = center.coordinator.staged_original() {
        println!("{}", serde_json::to_string_pretty(definition)?);
    }
    center.close();
    Ok(())
}

pub async fn add(session: Session, name: &str, hidden: bool, args: DefinitionArgs) -> Result<()> {
    let mut center = session.open().await;
    report(center.drain_notifications())?;

    let coordinator = &mut center.coordinator;
    if args.input_file.is_some() || args.output_file.is_some() {
        coordinator.toggle_mode();
    }
    let form = coordinator.form_mut();
    form.name = name.to_string();
    form.hidden = hidden;
    apply_definition(form, args)?;

    coordinator.submit_create().await;
    report(center.drain_notifications())
}

pub async fn edit(
    session: Session,
    name: &str,
    hidden: bool,
    rename: Option<&str>,
    make_hidden: Option<bool>,
    args: DefinitionArgs,
) -> Result<()> {
    let mut center = session.open().await;
    report(center.drain_notifications())?;

    let coordinator = &mut center.coordinator;
    coordinator
        .select_for_edit(TestAddress::new(name, visibility(hidden)))
        .await;
    report(coordinator.drain_notifications())?;

    let form = coordinator.form_mut();
    if let Some(new_name) = rename {
        form.name = new_name.to_string();
    }
    if let Some(make_hidden) = make_hidden {
        form.hidden = make_hidden;
    }
    apply_definition(form, args)?;

    coordinator.confirm_edit().await;
    let notifications = center.drain_notifications();
    center.close();
    report(notifications)
}

pub async fn delete(session: Session, name: &str, hidden: bool) -> Result<()> {
    let mut center = session.open().await;
    report(center.drain_notifications())?;

    center
        .coordinator
        .delete(TestAddress::new(name, visibility(hidden)))
        .await;
    report(center.drain_notifications())
}

pub async fn upload_script(session: Session, path: &Path) -> Result<()> {
    let blob = read_blob(path)?;
    let mut center = session.open().await;
    report(center.drain_notifications())?;

    center
        .scripts
        .upload(ScriptFile::new(blob.file_name, blob.bytes))
        .await;
    report(center.drain_notifications())
}

pub async fn download_script(session: Session, out_dir: &Path) -> Result<()> {
    let mut center = session.open().await;
    report(center.drain_notifications())?;

    let download = center
        .scripts
        .download()
        .map(|(file_name, script)| (file_name, script.bytes.clone()));
    report(center.drain_notifications())?;

    if let Some((file_name, bytes)) = download {
        let target = out_dir.join(file_name);
        fs::write(&target, bytes)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        println!("Script saved to {}", target.display());
    }
    Ok(())
}

pub async fn tolerance(session: Session, changes: ToleranceChanges) -> Result<()> {
    let mut filters = session.backend.tolerance_filters(&session.task).await?;
    if changes.is_empty() {
        println!("{}", serde_json::to_string_pretty(&filters)?);
        return Ok(());
    }

    if let Some(value) = changes.trailing_newline {
        filters.trailing_newline = value;
    }
    if let Some(value) = changes.trailing_whitespaces {
        filters.trailing_whitespaces = value;
    }
    if let Some(value) = changes.whitespaces_amount {
        filters.whitespaces_amount = value;
    }
    if let Some(value) = changes.case_differences {
        filters.case_differences = value;
    }

    let message = session
        .backend
        .set_tolerance_filters(&session.task, filters)
        .await?;
    println!("{}", message);
    Ok(())
}
