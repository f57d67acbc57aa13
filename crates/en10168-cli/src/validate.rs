//! # Validate Subcommand
//!
//! Validates certificate files and prints every violation. A file that
//! cannot be read counts as a failure but does not stop the others from
//! being checked.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, ValueEnum};
use en10168_core::Violation;
use en10168_schema::{load_document, CertificateValidator, RefSchemaUrlCheck};
use serde::Serialize;

/// Arguments for the validate subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Certificate files (JSON, or YAML by `.yaml`/`.yml` extension).
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Rule-set file to validate against instead of the bundled EN 10168 schema.
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Outcome for one file, as printed with `--format json`.
#[derive(Debug, Serialize)]
pub struct FileOutcome {
    pub file: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub errors: Vec<Violation>,
}

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs, config: Option<&Path>) -> Result<u8> {
    let validator = crate::load_validator(config, args.schema.as_deref())?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    validate_files(&validator, &args.files, args.format, &mut out)
}

/// Validate `files` and write the results to `out`. Returns the exit code.
pub fn validate_files(
    validator: &CertificateValidator,
    files: &[PathBuf],
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<u8> {
    let outcomes: Vec<FileOutcome> = files.iter().map(|file| check_file(validator, file)).collect();

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &outcomes)?;
            writeln!(out)?;
        }
        OutputFormat::Text => {
            for outcome in &outcomes {
                write_text(outcome, out)?;
            }
            let failed = outcomes.iter().filter(|o| !o.valid).count();
            writeln!(out)?;
            writeln!(out, "{} file(s) checked, {failed} invalid", outcomes.len())?;
        }
    }

    Ok(if outcomes.iter().all(|o| o.valid) { 0 } else { 1 })
}

fn check_file(validator: &CertificateValidator, file: &Path) -> FileOutcome {
    let name = file.display().to_string();
    let certificate = match load_document(file) {
        Ok(certificate) => certificate,
        Err(e) => {
            tracing::error!(file = %name, "{e}");
            return FileOutcome {
                file: name,
                valid: false,
                error: Some(e.reason),
                errors: Vec::new(),
            };
        }
    };

    if let RefSchemaUrlCheck::Differs { found, expected } = validator.check_ref_schema_url(&certificate) {
        tracing::warn!(
            file = %name,
            %found,
            %expected,
            "RefSchemaUrl does not match the rule set in use"
        );
    }

    let report = validator.validate(&certificate);
    tracing::info!(file = %name, valid = report.is_valid(), violations = report.errors().len(), "validated");
    FileOutcome {
        file: name,
        valid: report.is_valid(),
        error: None,
        errors: report.into_errors(),
    }
}

fn write_text(outcome: &FileOutcome, out: &mut dyn Write) -> std::io::Result<()> {
    if let Some(error) = &outcome.error {
        return writeln!(out, "ERROR {}: {error}", outcome.file);
    }
    if outcome.valid {
        return writeln!(out, "OK    {}", outcome.file);
    }
    writeln!(out, "FAIL  {} ({} violation(s))", outcome.file, outcome.errors.len())?;
    for violation in &outcome.errors {
        writeln!(out, "{violation}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn lot_validator(dir: &Path) -> CertificateValidator {
        let schema = write(
            dir,
            "lot.schema.json",
            r#"{ "type": "object", "required": ["Lot"], "properties": { "Lot": { "type": "string" } } }"#,
        );
        crate::load_validator(None, Some(&schema)).unwrap()
    }

    #[test]
    fn all_valid_files_exit_zero() {
        let dir = tempfile::tempdir().unwrap();
        let validator = lot_validator(dir.path());
        let a = write(dir.path(), "a.json", r#"{ "Lot": "L-1" }"#);
        let b = write(dir.path(), "b.yaml", "Lot: L-2\n");

        let mut out = Vec::new();
        let code = validate_files(&validator, &[a, b], OutputFormat::Text, &mut out).unwrap();
        assert_eq!(code, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("OK    "));
        assert!(text.contains("2 file(s) checked, 0 invalid"));
    }

    #[test]
    fn invalid_file_exits_one_and_lists_violations() {
        let dir = tempfile::tempdir().unwrap();
        let validator = lot_validator(dir.path());
        let bad = write(dir.path(), "bad.json", r#"{ "Lot": 7 }"#);

        let mut out = Vec::new();
        let code = validate_files(&validator, &[bad], OutputFormat::Text, &mut out).unwrap();
        assert_eq!(code, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("(1 violation(s))"));
        assert!(text.contains("/Lot: must be string [#/properties/Lot/type]"));
    }

    #[test]
    fn json_output_lists_each_file() {
        let dir = tempfile::tempdir().unwrap();
        let validator = lot_validator(dir.path());
        let good = write(dir.path(), "good.json", r#"{ "Lot": "L-1" }"#);
        let broken = write(dir.path(), "broken.json", "{");
        let missing = write(dir.path(), "missing.json", "{}");

        let mut out = Vec::new();
        let code = validate_files(
            &validator,
            &[good, broken, missing],
            OutputFormat::Json,
            &mut out,
        )
        .unwrap();
        assert_eq!(code, 1);

        let printed: Value = serde_json::from_slice(&out).unwrap();
        let printed = printed.as_array().unwrap();
        assert_eq!(printed.len(), 3);
        assert_eq!(printed[0]["valid"], true);
        assert!(printed[0].get("error").is_none());
        assert!(printed[1]["error"].as_str().unwrap().starts_with("invalid JSON"));
        assert_eq!(printed[2]["errors"][0]["params"]["missingProperty"], "Lot");
    }
}
