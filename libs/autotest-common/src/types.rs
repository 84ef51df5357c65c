use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which execution target a test (or script copy) belongs to.
///
/// Hidden tests feed the automark score and are never shown to students.
/// Sample tests back the student-facing autotest preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Hidden,
    Sample,
}

impl Visibility {
    pub const ALL: [Visibility; 2] = [Visibility::Hidden, Visibility::Sample];

    pub fn from_hidden_flag(hidden: bool) -> Self {
        if hidden {
            Visibility::Hidden
        } else {
            Visibility::Sample
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, Visibility::Hidden)
    }

    /// Storage segment used in keys and user-facing messages
    pub fn target_name(&self) -> &'static str {
        match self {
            Visibility::Hidden => "automark",
            Visibility::Sample => "autotest",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Visibility::Hidden => write!(f, "hidden"),
            Visibility::Sample => write!(f, "sample"),
        }
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hidden" | "true" | "automark" => Ok(Visibility::Hidden),
            "sample" | "false" | "autotest" => Ok(Visibility::Sample),
            other => Err(format!("Unknown visibility '{}'", other)),
        }
    }
}

/// A task inside a course. Task names arriving from URLs encode spaces as `~`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId {
    pub course_code: String,
    pub task: String,
}

impl TaskId {
    pub fn new(course_code: impl Into<String>, task: impl AsRef<str>) -> Self {
        Self {
            course_code: course_code.into(),
            task: task.as_ref().replace('~', " "),
        }
    }

    /// Task name as it appears in URLs and file names, spaces written as `~`
    pub fn task_segment(&self) -> String {
        self.task.replace(' ', "~")
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.course_code, self.task)
    }
}

/// The only way a stored definition can be addressed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestAddress {
    pub name: String,
    pub visibility: Visibility,
}

impl TestAddress {
    pub fn new(name: impl Into<String>, visibility: Visibility) -> Self {
        Self {
            name: name.into(),
            visibility,
        }
    }
}

impl fmt::Display for TestAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.visibility)
    }
}

/// An uploaded file, kept as raw bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlob {
    pub file_name: String,
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Input and expected output of a test. Both sides always come from the same
/// authoring mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TestContent {
    Inline { input: String, output: String },
    Files { input: FileBlob, output: FileBlob },
}

impl TestContent {
    pub fn input_bytes(&self) -> &[u8] {
        match self {
            TestContent::Inline { input, .. } => input.as_bytes(),
            TestContent::Files { input, .. } => &input.bytes,
        }
    }

    pub fn output_bytes(&self) -> &[u8] {
        match self {
            TestContent::Inline { output, .. } => output.as_bytes(),
            TestContent::Files { output, .. } => &output.bytes,
        }
    }

    /// Text view of the content. File content is decoded lossily; the file
    /// names are not carried over.
    pub fn to_inline(&self) -> (String, String) {
        match self {
            TestContent::Inline { input, output } => (input.clone(), output.clone()),
            TestContent::Files { input, output } => (
                String::from_utf8_lossy(&input.bytes).into_owned(),
                String::from_utf8_lossy(&output.bytes).into_owned(),
            ),
        }
    }
}

/// Full content of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    pub visibility: Visibility,
    pub content: TestContent,
    #[serde(default)]
    pub runner_args: String,
    pub cpu_time_limit_seconds: f64,
    pub memory_limit_megabytes: f64,
}

impl TestDefinition {
    pub fn address(&self) -> TestAddress {
        TestAddress::new(self.name.clone(), self.visibility)
    }

    /// Structural checks shared by every writer of a definition
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Test needs a name.".to_string());
        }
        if !self.cpu_time_limit_seconds.is_finite() || self.cpu_time_limit_seconds <= 0.0 {
            return Err("Time limit should be greater than 0 seconds.".to_string());
        }
        if !self.memory_limit_megabytes.is_finite() || self.memory_limit_megabytes <= 0.0 {
            return Err("Memory limit should be greater than 0 megabytes.".to_string());
        }
        Ok(())
    }
}

/// Output-comparison switches stored per task. Opaque to this workspace:
/// they are persisted and handed back, never interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToleranceFilters {
    pub trailing_newline: bool,
    pub trailing_whitespaces: bool,
    pub whitespaces_amount: bool,
    pub case_differences: bool,
}

impl Default for ToleranceFilters {
    fn default() -> Self {
        Self {
            trailing_newline: true,
            trailing_whitespaces: true,
            whitespaces_amount: false,
            case_differences: false,
        }
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
