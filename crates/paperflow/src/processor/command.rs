//! External converters: `pdftotext`, `tesseract` and `pandoc`.
//!
//! Each runs as a child process writing text to stdout.

use std::path::Path;
use std::process::Command;

use crate::error::ProcessError;

fn run(program: &str, mut cmd: Command) -> Result<String, ProcessError> {
    let _span = tracing::info_span!("processor.command", program).entered();

    let output = cmd.output().map_err(|e| ProcessError::Converter {
        program: program.to_string(),
        reason: format!("failed to start: {}", e),
    })?;

    if !output.status.success() {
        return Err(ProcessError::Converter {
            program: program.to_string(),
            reason: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn pdftotext(path: &Path) -> Result<String, ProcessError> {
    let mut cmd = Command::new("pdftotext");
    cmd.args(["-layout", "-enc", "UTF-8"]).arg(path).arg("-");
    run("pdftotext", cmd)
}

pub fn pandoc_to_text(path: &Path) -> Result<String, ProcessError> {
    let mut cmd = Command::new("pandoc");
    cmd.args(["--to", "plain", "--wrap", "none"]).arg(path);
    run("pandoc", cmd)
}

/// OCR through the `tesseract` binary.
#[derive(Debug, Clone)]
pub struct Tesseract {
    languages: String,
}

impl Tesseract {
    pub fn new(languages: &[String]) -> Self {
        let languages = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };
        Self { languages }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    pub fn image_to_text(&self, path: &Path) -> Result<String, ProcessError> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(path).arg("stdout").args(["-l", &self.languages]);
        run("tesseract", cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tesseract_language_list() {
        assert_eq!(Tesseract::new(&[]).languages(), "eng");
        let langs = vec!["eng".to_string(), "fin".to_string()];
        assert_eq!(Tesseract::new(&langs).languages(), "eng+fin");
    }

    #[test]
    fn test_missing_program_is_converter_error() {
        let cmd = Command::new("paperflow-no-such-converter");
        let err = run("paperflow-no-such-converter", cmd).unwrap_err();
        match err {
            ProcessError::Converter { program, reason } => {
                assert_eq!(program, "paperflow-no-such-converter");
                assert!(reason.starts_with("failed to start"));
            }
            other => panic!("expected Converter error, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_converter_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = run("sh", cmd).unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_is_returned() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf 'page one'"]);
        assert_eq!(run("sh", cmd).unwrap(), "page one");
    }
}
