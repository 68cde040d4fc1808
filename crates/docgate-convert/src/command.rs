//! External program adapter

use crate::{ConvertError, DocumentConverter, Result, normalize_extension};
use async_trait::async_trait;
use docgate_core::CommandConfig;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

const PATH_PLACEHOLDER: &str = "{path}";

/// Longest stderr excerpt kept in error messages
const STDERR_EXCERPT: usize = 512;

/// Runs an external program and takes its standard output as Markdown.
///
/// Typical use is a document converter CLI such as `markitdown {path}`.
/// The child is killed if the conversion future is dropped, which is how the
/// gateway timeout stops runaway conversions.
pub struct CommandConverter {
    name: String,
    program: String,
    args: Vec<String>,
    media_types: Vec<String>,
    extensions: Vec<String>,
}

impl CommandConverter {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            media_types: Vec::new(),
            extensions: Vec::new(),
        }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(config.name.clone(), config.program.clone())
            .with_args(config.args.clone())
            .with_media_types(config.media_types.clone())
            .with_extensions(config.extensions.clone())
    }

    /// Arguments; `{path}` is replaced by the source path, which is appended
    /// when no argument mentions it.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_media_types(mut self, media_types: Vec<String>) -> Self {
        self.media_types = media_types;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.iter().map(|e| normalize_extension(e)).collect();
        self
    }

    fn build_args(&self, path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .args
            .iter()
            .map(|arg| {
                if arg == PATH_PLACEHOLDER {
                    path.as_os_str().to_os_string()
                } else {
                    arg.replace(PATH_PLACEHOLDER, &path.to_string_lossy()).into()
                }
            })
            .collect();

        if !self.args.iter().any(|arg| arg.contains(PATH_PLACEHOLDER)) {
            args.push(path.as_os_str().to_os_string());
        }
        args
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn media_types(&self) -> Vec<String> {
        self.media_types.clone()
    }

    fn extensions(&self) -> Vec<String> {
        self.extensions.clone()
    }

    async fn convert(&self, path: &Path, _media_type: Option<&str>) -> Result<String> {
        let output = Command::new(&self.program)
            .args(self.build_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ConvertError::Failed(format!("failed to run '{}': {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT).collect();
            return Err(ConvertError::Failed(format!(
                "'{}' exited with {}: {}",
                self.program, output.status, excerpt
            )));
        }

        String::from_utf8(output.stdout).map_err(|_| {
            ConvertError::Failed(format!("'{}' produced non UTF-8 output", self.program))
        })
    }
}
