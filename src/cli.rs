//! Minimal CLI: check schema documents → (pass/fail | initial value)
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::document::load_document;

const DEFAULT_LOG_FILTER: &str = "fieldcheck=warn";
const VERBOSE_LOG_FILTER: &str = "fieldcheck=debug";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// check field schema documents for unbounded recursion and unknown lists
#[derive(Parser, Debug)]
#[command(name = "fieldcheck", version)]
pub struct CommandLineInterface {
    /// log each validation step to stderr (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate one or more schema documents
    Check(CheckOut),
    /// validate a schema document and print its initial value
    Initial(InitialOut),
}

#[derive(Args, Debug, Clone)]
struct ListSettings {
    /// list name relationship fields may refer to, in addition to the document's own `lists`
    #[arg(long = "list", value_name = "NAME")]
    lists: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    #[command(flatten)]
    list_settings: ListSettings,
}

#[derive(clap::Parser, Debug)]
struct InitialOut {
    /// schema document
    #[arg(long, short)]
    input: PathBuf,

    #[command(flatten)]
    list_settings: ListSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

/// Outcome for one input file; built on whichever worker checked it.
struct FileReport {
    path: PathBuf,
    outcome: Result<()>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Install the stderr subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_logging(&self) {
        let fallback = if self.verbose { VERBOSE_LOG_FILTER } else { DEFAULT_LOG_FILTER };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Check(target) => target.run(),
            Command::Initial(target) => target.run(),
        }
    }
}

impl CheckOut {
    fn run(&self) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        info!(files = source_paths.len(), "checking schema documents");

        // Arenas are not Send; each document lives and dies on one worker.
        let reports = source_paths
            .par_iter()
            .map(|path| FileReport {
                path: path.clone(),
                outcome: check_file(path, &self.list_settings.lists),
            })
            .collect::<Vec<_>>();

        let mut failed = 0usize;
        for report in &reports {
            match &report.outcome {
                Ok(()) => println!("{} {}", "ok".green().bold(), report.path.display()),
                Err(error) => {
                    failed += 1;
                    println!("{} {}: {error:#}", "error".red().bold(), report.path.display());
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {} schema documents failed validation", reports.len());
        }
        Ok(())
    }
}

impl InitialOut {
    fn run(&self) -> Result<()> {
        let document = load_document(&self.input)?;
        document
            .validate(&self.list_settings.lists)
            .with_context(|| format!("{} is not a valid schema", self.input.display()))?;
        let value = document.initial_value()?;
        let value_src = serde_json::to_string_pretty(&value)?;
        if let Some(out) = self.out.as_ref() {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            std::fs::write(out, &value_src)
                .with_context(|| format!("failed to write {}", out.display()))?;
        } else {
            println!("{value_src}");
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn check_file(path: &Path, lists: &[String]) -> Result<()> {
    let document = load_document(path)?;
    document.validate(lists)?;
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        let err = resolve_file_path_patterns(["/definitely/not/here/*.json"]).unwrap_err();
        assert!(err.to_string().contains("matched no files"));
    }

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
    }

    #[test]
    fn check_file_merges_extra_lists_with_document_lists() {
        let path = fixture("related_posts.json");
        let err = check_file(&path, &[]).unwrap_err();
        assert!(err.to_string().contains("no list named \"Post\""));
        check_file(&path, &["Post".to_string()]).unwrap();
    }

    #[test]
    fn check_fails_when_any_document_fails() {
        let accepted = fixture("navigation_tree.json");
        let related = fixture("related_posts.json");
        let args = |extra: &[&str]| {
            let mut args = vec!["fieldcheck", "check", "-i"];
            args.push(accepted.to_str().unwrap());
            args.push(related.to_str().unwrap());
            args.extend_from_slice(extra);
            CommandLineInterface::try_parse_from(args).unwrap()
        };

        let err = args(&[]).run().unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 schema documents failed validation");
        args(&["--list", "Post"]).run().unwrap();
    }

    #[test]
    fn initial_writes_the_initial_value() {
        let out = std::env::temp_dir().join(format!("fieldcheck-initial-{}.json", std::process::id()));
        let input = fixture("navigation_tree.json");
        let cli = CommandLineInterface::try_parse_from([
            "fieldcheck", "initial", "-i", input.to_str().unwrap(), "-o", out.to_str().unwrap(),
        ])
        .unwrap();
        cli.run().unwrap();

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        std::fs::remove_file(&out).unwrap();
        assert_eq!(written, serde_json::json!({ "label": "Home", "href": "", "children": [] }));
    }

    #[test]
    fn initial_refuses_an_invalid_document() {
        let input = fixture("default_branch_loop.json");
        let cli = CommandLineInterface::try_parse_from(["fieldcheck", "initial", "-i", input.to_str().unwrap()])
            .unwrap();
        let err = cli.run().unwrap_err();
        assert!(format!("{err:#}").contains("is not a valid schema"));
    }

    #[test]
    fn parses_check_with_lists() {
        let cli = CommandLineInterface::try_parse_from([
            "fieldcheck", "check", "-i", "a.json", "b.json", "--list", "Post", "--list", "User",
        ])
        .unwrap();
        let Command::Check(check) = cli.cmd else { panic!("expected check") };
        assert_eq!(check.input, vec!["a.json", "b.json"]);
        assert_eq!(check.list_settings.lists, vec!["Post", "User"]);
    }
}
