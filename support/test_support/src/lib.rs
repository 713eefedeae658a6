use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseClass {
    RuntimeSuccess,
    FrontendError,
    RuntimeError,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchConfig {
    pub enabled: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One scripted user action, applied on the given proxy round.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ScriptedEvent {
    pub round: u64,
    pub event: String,
    pub widget: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExpectedOutcome {
    pub stdout_file: Option<String>,
    /// Error category name, e.g. `DuplicateNameError`.
    pub error_kind: Option<String>,
    pub error_contains: Option<String>,
    #[serde(default)]
    pub variables: Vec<(String, String)>,
    pub ticks: Option<u64>,
    #[serde(default)]
    pub tick_errors: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CaseSpec {
    pub class: CaseClass,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
    pub max_ticks: Option<u64>,
    pub bench: BenchConfig,
    pub expected: ExpectedOutcome,
}

#[derive(Debug, Clone)]
pub struct Case {
    pub name: String,
    pub dir: PathBuf,
    pub program_path: PathBuf,
    pub spec: CaseSpec,
}

impl Case {
    pub fn read_text(&self, relative_path: &str) -> Result<String> {
        fs::read_to_string(self.dir.join(relative_path))
            .with_context(|| format!("Reading {} fixture file {}", self.name, relative_path))
    }

    pub fn source(&self) -> Result<String> {
        fs::read_to_string(&self.program_path)
            .with_context(|| format!("Reading program for {}", self.name))
    }
}

pub fn load_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    let mut cases = Vec::new();

    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }

        let case_path = path.join("case.yaml");
        if !case_path.exists() {
            continue;
        }

        let program_path = path.join("program.tml");
        ensure!(
            program_path.exists(),
            "Missing program.tml for case {}",
            path.display()
        );

        let case_name = path
            .file_name()
            .and_then(|value| value.to_str())
            .map(str::to_string)
            .with_context(|| format!("Invalid case directory name {}", path.display()))?;
        let case_raw = fs::read_to_string(&case_path)
            .with_context(|| format!("Reading {}", case_path.display()))?;
        let spec: CaseSpec = serde_yaml::from_str(&case_raw)
            .with_context(|| format!("Parsing {}", case_path.display()))?;
        validate(&case_name, &spec)?;

        cases.push(Case {
            name: case_name,
            dir: path,
            program_path,
            spec,
        });
    }

    ensure!(
        !cases.is_empty(),
        "No test cases found in {}",
        programs_dir.display()
    );
    cases.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(cases)
}

fn validate(name: &str, spec: &CaseSpec) -> Result<()> {
    match spec.class {
        CaseClass::RuntimeSuccess => ensure!(
            spec.expected.error_kind.is_none(),
            "Case {name} expects success but names an error kind"
        ),
        CaseClass::FrontendError | CaseClass::RuntimeError => ensure!(
            spec.expected.error_kind.is_some(),
            "Case {name} expects an error but names no error kind"
        ),
    }
    if spec.bench.enabled {
        ensure!(
            !spec.bench.tags.is_empty(),
            "Case {name} has bench enabled but no tags"
        );
    }
    for event in &spec.events {
        ensure!(
            matches!(event.event.as_str(), "click" | "type" | "close"),
            "Case {name} has unknown scripted event '{}'",
            event.event
        );
        ensure!(
            event.event != "type" || event.text.is_some(),
            "Case {name} types into '{}' without text",
            event.widget
        );
    }
    Ok(())
}

/// Cases whose programs are used as benchmark workloads.
pub fn bench_cases(programs_dir: &Path) -> Result<Vec<Case>> {
    Ok(load_cases(programs_dir)?
        .into_iter()
        .filter(|case| case.spec.bench.enabled)
        .collect())
}

pub fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_line_endings_and_trailing_space() {
        assert_eq!(normalize_output("a\r\nb\n\n"), "a\nb");
    }

    #[test]
    fn rejects_typing_without_text() {
        let spec: CaseSpec = serde_yaml::from_str(
            "class: runtime_success\n\
             events:\n  - { round: 1, event: type, widget: ent }\n\
             bench: { enabled: false }\n\
             expected: { stdout_file: expected.out }\n",
        )
        .expect("valid case yaml");
        assert!(validate("typing", &spec).is_err());
    }
}
