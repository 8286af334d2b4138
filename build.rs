use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories holding the crate's own Rust sources.
const SOURCE_ROOTS: [&str; 4] = ["regression", "cli", "tests", "benches"];

const FORBIDDEN_WORDS: &str = "FIXED, CORRECTED, FIX, FIXES, NEW, CHANGED, CHANGES, CHANGE, \
                               MODIFIED, MODIFIES, MODIFY, UPDATED, UPDATES, UPDATE";

/// Which policy a scan enforces; decides how matched lines are filtered and reported.
#[derive(Clone, Copy)]
enum Rule {
    UnderscorePrefix,
    ForbiddenWord,
    StarsInComment,
    UppercaseComment,
    AllowDeadCode,
}

impl Rule {
    fn pattern(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => r"\b(_[a-zA-Z0-9_]+)\b",
            Rule::ForbiddenWord => {
                r"(//|/\*).*\b(?:FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)\b"
            }
            Rule::StarsInComment => r"(//|/\*).*\*\*",
            Rule::UppercaseComment => r"(//|/\*).*",
            Rule::AllowDeadCode => r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
        }
    }

    fn describe(self) -> String {
        match self {
            Rule::UnderscorePrefix => "underscore-prefixed variables".to_string(),
            Rule::ForbiddenWord => format!("comments containing one of {FORBIDDEN_WORDS}"),
            Rule::StarsInComment => "'**' in a regular comment".to_string(),
            Rule::UppercaseComment => "comments written entirely in uppercase".to_string(),
            Rule::AllowDeadCode => "#[allow(dead_code)] attributes".to_string(),
        }
    }

    fn advice(self) -> &'static str {
        match self {
            Rule::UnderscorePrefix => {
                "Either use the variable (removing the underscore) or remove it completely."
            }
            Rule::AllowDeadCode => "Either use the code or remove it completely.",
            Rule::StarsInComment => "'**' is only allowed in doc comments.",
            Rule::ForbiddenWord | Rule::UppercaseComment => {
                "Remove the comment rather than commenting it out."
            }
        }
    }

    /// Whether a line the regex matched really breaks the rule.
    fn is_violation(self, line: &str) -> bool {
        let trimmed = line.trim_start();
        match self {
            Rule::UnderscorePrefix => !(trimmed.starts_with("//") || underscore_only_in_strings(line)),
            Rule::StarsInComment => !trimmed.starts_with("///") && !trimmed.starts_with("//!"),
            Rule::UppercaseComment => comment_text(line).is_some_and(|text| {
                let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
                !letters.is_empty() && letters.iter().all(|c| c.is_uppercase())
            }),
            Rule::ForbiddenWord | Rule::AllowDeadCode => true,
        }
    }
}

fn underscore_only_in_strings(line: &str) -> bool {
    line.contains('"')
        && line
            .split('"')
            .enumerate()
            .any(|(i, part)| i % 2 == 1 && part.contains('_'))
}

fn comment_text(line: &str) -> Option<&str> {
    let start = line.find("//").or_else(|| line.find("/*"))?;
    let body = line[start..].trim_start_matches(['/', '*', '!']);
    Some(body.split("*/").next().unwrap_or(body).trim())
}

/// Collects every offending line of a single file.
struct ViolationCollector {
    rule: Rule,
    file_path: PathBuf,
    violations: Vec<String>,
}

impl ViolationCollector {
    fn new(rule: Rule, file_path: &Path) -> Self {
        Self {
            rule,
            file_path: file_path.to_path_buf(),
            violations: Vec::new(),
        }
    }

    fn check_and_get_error_message(&self) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let mut error_msg = format!(
            "\n❌ ERROR: Found {} {} in {}:\n",
            self.violations.len(),
            self.rule.describe(),
            self.file_path.display()
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str("\n⚠️ These are not allowed in this project.\n");
        error_msg.push_str(&format!("   {}\n", self.rule.advice()));
        Some(error_msg)
    }
}

impl Sink for ViolationCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();
        if self.rule.is_violation(line_text) {
            self.violations.push(format!("{line_number}:{line_text}"));
        }
        Ok(true)
    }
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_ROOTS
        .iter()
        .filter(|root| Path::new(root).is_dir())
        .flat_map(|root| WalkDir::new(root).into_iter().filter_map(|e| e.ok()))
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|e| e.into_path())
}

fn scan(rule: Rule) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(rule.pattern())?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = ViolationCollector::new(rule, &path);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message() {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for root in SOURCE_ROOTS {
        println!("cargo:rerun-if-changed={root}");
    }

    for rule in [
        Rule::UnderscorePrefix,
        Rule::ForbiddenWord,
        Rule::StarsInComment,
        Rule::UppercaseComment,
        Rule::AllowDeadCode,
    ] {
        if let Err(e) = scan(rule) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
