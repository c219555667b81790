//! Workflow document loading
//!
//! Two entry points:
//! - [`Workflow::from_yaml_str`] / [`Workflow::from_yaml_file`] parse a
//!   document exactly as written.
//! - [`WorkflowLoader`] layers `RLWF__`-prefixed environment variables on top
//!   of the file (e.g. `RLWF__MAIN__NUM_EPISODES=50`).
//!
//! Both reject documents missing `job`, `scenario_path` or `log_path`, and
//! both validate the result before returning it.

use std::fs;
use std::path::{Path, PathBuf};

use config::{ConfigBuilder, Environment, File, FileFormat};

use crate::error::{Result, WorkflowError};
use crate::workflow::Workflow;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "RLWF";
/// Separator between prefix and nested keys in environment overrides
pub const ENV_SEPARATOR: &str = "__";
/// Environment variable naming the workflow file when no path is given
pub const CONFIG_ENV_VAR: &str = "RLWF_CONFIG";
/// File name searched for in the working and user config directories
pub const DEFAULT_FILE_NAME: &str = "workflow.yml";

/// Top-level fields every document must carry
pub const REQUIRED_FIELDS: [&str; 3] = ["job", "scenario_path", "log_path"];

/// Annotated template written by `rlwf init`
pub const TEMPLATE: &str = include_str!("../../../workflow.yml.example");

impl Workflow {
    /// Parse and validate a workflow document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        check_required(&value)?;
        // Deserialize from the text again so errors carry the field path
        let workflow: Self = serde_yaml::from_str(yaml)?;
        workflow.validate()?;
        Ok(workflow)
    }

    /// Read, parse and validate a workflow file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml_str(&read_document(path.as_ref())?)
    }

    /// Convert an already-parsed YAML tree, checking required fields first so
    /// the error names the field rather than the deserializer position
    ///
    /// The tree is rendered back to text and read like a file: a number in a
    /// string field (`job: 2024`) is accepted as written, and type errors
    /// carry the dotted path of the field.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self> {
        check_required(&value)?;
        let text = serde_yaml::to_string(&value)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Serialize back to YAML
    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn read_document(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| WorkflowError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn check_required(value: &serde_yaml::Value) -> Result<()> {
    match value {
        // An empty document is missing everything
        serde_yaml::Value::Null => Err(WorkflowError::MissingField(REQUIRED_FIELDS[0])),
        serde_yaml::Value::Mapping(_) => {
            for field in REQUIRED_FIELDS {
                match value.get(field) {
                    None | Some(serde_yaml::Value::Null) => {
                        return Err(WorkflowError::MissingField(field));
                    }
                    Some(_) => {}
                }
            }
            Ok(())
        }
        other => Err(WorkflowError::Parse(format!(
            "document root must be a mapping, got {}",
            describe(other)
        ))),
    }
}

fn describe(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a sequence",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

/// Loads a workflow file with environment overrides layered on top
#[derive(Debug, Clone)]
pub struct WorkflowLoader {
    path: PathBuf,
    env: Option<config::Map<String, String>>,
}

impl WorkflowLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            env: None,
        }
    }

    /// Use the given variables instead of the process environment
    pub fn with_env_source<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, apply overrides, then validate
    pub fn load(&self) -> Result<Workflow> {
        let workflow = self.read()?;
        workflow.validate()?;

        tracing::info!(
            "Loaded workflow '{}' ({} mode)",
            workflow.job,
            workflow.training.mode
        );
        Ok(workflow)
    }

    /// Load the file and apply overrides without semantic validation, so
    /// callers can report every [`crate::Problem`] at once
    pub fn read(&self) -> Result<Workflow> {
        tracing::debug!("Loading workflow from: {:?}", self.path);
        let contents = read_document(&self.path)?;

        let mut env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true);
        if let Some(vars) = &self.env {
            env = env.source(Some(vars.clone()));
        }

        let settings = ConfigBuilder::<config::builder::DefaultState>::default()
            .add_source(File::from_str(&contents, FileFormat::Yaml))
            .add_source(env)
            .build()?;

        let value: serde_yaml::Value = settings.try_deserialize()?;
        Workflow::from_value(value)
    }
}

/// Find the workflow file when none was given explicitly
///
/// Checks in order: `RLWF_CONFIG`, `./workflow.yml`,
/// `~/.config/rlwf/workflow.yml`.
pub fn find_workflow_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(DEFAULT_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(home) = dirs::home_dir() {
        let user_config = home.join(".config").join("rlwf").join(DEFAULT_FILE_NAME);
        if user_config.exists() {
            return Some(user_config);
        }
    }

    None
}
