//! # Check-Schema Subcommand
//!
//! Compiles the rule set (bundled or `--schema`) and prints a short
//! summary. Compile faults propagate as errors and exit non-zero.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use en10168_schema::RuleSet;

/// Arguments for the check-schema subcommand.
#[derive(Args, Debug)]
pub struct CheckSchemaArgs {
    /// Rule-set file to check instead of the bundled EN 10168 schema.
    #[arg(long)]
    pub schema: Option<PathBuf>,
}

/// Execute the check-schema subcommand.
pub fn run_check_schema(args: &CheckSchemaArgs, config: Option<&Path>) -> Result<u8> {
    let validator = crate::load_validator(config, args.schema.as_deref())?;
    let stdout = std::io::stdout();
    write_summary(validator.rule_set(), &mut stdout.lock())?;
    Ok(0)
}

/// Write the summary of a compiled rule set.
pub fn write_summary(rule_set: &RuleSet, out: &mut dyn Write) -> std::io::Result<()> {
    writeln!(out, "rule set:  {}", rule_set.id())?;
    writeln!(out, "nodes:     {}", rule_set.node_count())?;
    writeln!(out, "external:  {}", rule_set.external_documents().len())?;
    for uri in rule_set.external_documents() {
        writeln!(out, "  {uri}")?;
    }
    Ok(())
}
