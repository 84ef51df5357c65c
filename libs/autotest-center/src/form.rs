/// Definition Form - one mutable draft of a test definition
///
/// The form keeps every field as the user typed it. Limits stay strings until
/// `validate` parses them, so a half-typed value never corrupts a definition.
///
/// **Authoring modes:**
/// - Manual: input/output are inline text
/// - File: input/output are uploaded files, one each
///
/// The mode lives in the content variant itself, so the two sources can never
/// come from different modes.

use autotest_common::types::{FileBlob, TestContent, TestDefinition, Visibility};
use std::fmt::{self, Display, Formatter};

pub const DEFAULT_CPU_TIME_LIMIT: &str = "1";
pub const DEFAULT_MEMORY_LIMIT: &str = "50";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthoringMode {
    Manual,
    File,
}

impl AuthoringMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthoringMode::Manual => AuthoringMode::File,
            AuthoringMode::File => AuthoringMode::Manual,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormContent {
    Manual {
        input: String,
        output: String,
    },
    File {
        input: Option<FileBlob>,
        output: Option<FileBlob>,
    },
}

impl FormContent {
    fn empty(mode: AuthoringMode) -> Self {
        match mode {
            AuthoringMode::Manual => FormContent::Manual {
                input: String::new(),
                output: String::new(),
            },
            AuthoringMode::File => FormContent::File {
                input: None,
                output: None,
            },
        }
    }

    pub fn mode(&self) -> AuthoringMode {
        match self {
            FormContent::Manual { .. } => AuthoringMode::Manual,
            FormContent::File { .. } => AuthoringMode::File,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    MissingName,
    CpuTimeNotNumber,
    CpuTimeNotPositive,
    MemoryNotNumber,
    MemoryNotPositive,
    MissingFiles,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let msg = match self {
            ValidationError::MissingName => "Test needs a name.",
            ValidationError::CpuTimeNotNumber => "Time limit should be a number.",
            ValidationError::CpuTimeNotPositive => "Time limit should be greater than 0 seconds.",
            ValidationError::MemoryNotNumber => "Memory limit should be a number.",
            ValidationError::MemoryNotPositive => {
                "Memory limit should be greater than 0 megabytes."
            }
            ValidationError::MissingFiles => "Input and output files are required.",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ValidationError {}

/// Returned when a setter does not match the current authoring mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrongMode {
    pub current: AuthoringMode,
}

impl Display for WrongMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Form is in {:?} mode", self.current)
    }
}

impl std::error::Error for WrongMode {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionForm {
    pub name: String,
    pub runner_args: String,
    pub cpu_time_limit: String,
    pub memory_limit: String,
    pub hidden: bool,
    content: FormContent,
}

impl Default for DefinitionForm {
    fn default() -> Self {
        Self::new(AuthoringMode::Manual)
    }
}

impl DefinitionForm {
    pub fn new(mode: AuthoringMode) -> Self {
        Self {
            name: String::new(),
            runner_args: String::new(),
            cpu_time_limit: DEFAULT_CPU_TIME_LIMIT.to_string(),
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
            hidden: false,
            content: FormContent::empty(mode),
        }
    }

    pub fn mode(&self) -> AuthoringMode {
        self.content.mode()
    }

    pub fn content(&self) -> &FormContent {
        &self.content
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from_hidden_flag(self.hidden)
    }

    /// Back to defaults, keeping the authoring mode
    pub fn reset(&mut self) {
        *self = Self::new(self.mode());
    }

    /// Change authoring mode. Every field is cleared, as with a reset.
    pub fn switch_mode(&mut self, mode: AuthoringMode) {
        *self = Self::new(mode);
    }

    pub fn is_pristine(&self) -> bool {
        *self == Self::new(self.mode())
    }

    pub fn set_manual_input(&mut self, text: impl Into<String>) -> Result<(), WrongMode> {
        match &mut self.content {
            FormContent::Manual { input, .. } => {
                *input = text.into();
                Ok(())
            }
            FormContent::File { .. } => Err(WrongMode {
                current: AuthoringMode::File,
            }),
        }
    }

    pub fn set_manual_output(&mut self, text: impl Into<String>) -> Result<(), WrongMode> {
        match &mut self.content {
            FormContent::Manual { output, .. } => {
                *output = text.into();
                Ok(())
            }
            FormContent::File { .. } => Err(WrongMode {
                current: AuthoringMode::File,
            }),
        }
    }

    pub fn attach_input_file(&mut self, file: FileBlob) -> Result<(), WrongMode> {
        match &mut self.content {
            FormContent::File { input, .. } => {
                *input = Some(file);
                Ok(())
            }
            FormContent::Manual { .. } => Err(WrongMode {
                current: AuthoringMode::Manual,
            }),
        }
    }

    pub fn attach_output_file(&mut self, file: FileBlob) -> Result<(), WrongMode> {
        match &mut self.content {
            FormContent::File { output, .. } => {
                *output = Some(file);
                Ok(())
            }
            FormContent::Manual { .. } => Err(WrongMode {
                current: AuthoringMode::Manual,
            }),
        }
    }

    /// Load a stored definition for editing. Always lands in manual mode:
    /// file-authored content is shown as text.
    pub fn populate(&mut self, definition: &TestDefinition) {
        let (input, output) = definition.content.to_inline();
        self.name = definition.name.clone();
        self.runner_args = definition.runner_args.clone();
        self.cpu_time_limit = definition.cpu_time_limit_seconds.to_string();
        self.memory_limit = definition.memory_limit_megabytes.to_string();
        self.hidden = definition.visibility.is_hidden();
        self.content = FormContent::Manual { input, output };
    }

    /// Check the draft and build the definition it describes
    pub fn validate(&self) -> Result<TestDefinition, ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingName);
        }
        let cpu_time = parse_limit(&self.cpu_time_limit).ok_or(ValidationError::CpuTimeNotNumber)?;
        if cpu_time <= 0.0 {
            return Err(ValidationError::CpuTimeNotPositive);
        }
        let memory = parse_limit(&self.memory_limit).ok_or(ValidationError::MemoryNotNumber)?;
        if memory <= 0.0 {
            return Err(ValidationError::MemoryNotPositive);
        }

        let content = match &self.content {
            FormContent::Manual { input, output } => TestContent::Inline {
                input: input.clone(),
                output: output.clone(),
            },
            FormContent::File {
                input: Some(input),
                output: Some(output),
            } => TestContent::Files {
                input: input.clone(),
                output: output.clone(),
            },
            FormContent::File { .. } => return Err(ValidationError::MissingFiles),
        };

        Ok(TestDefinition {
            name: self.name.clone(),
            visibility: self.visibility(),
            content,
            runner_args: self.runner_args.clone(),
            cpu_time_limit_seconds: cpu_time,
            memory_limit_megabytes: memory,
        })
    }
}

fn parse_limit(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
