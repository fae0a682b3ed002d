use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use engine::{Direction, Grid, RobotFault, Session, Tile};

const TEST_SUFFIX: &str = ".test.kar";

#[derive(Debug, Deserialize)]
pub struct ExpectedRobot {
    pub x: i32,
    pub y: i32,
    /// Facing name: `east`, `north`, `west` or `south`.
    pub dir: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpectedTile {
    pub x: i32,
    pub y: i32,
    /// Tile name: `empty`, `wall`, `white`, `grey` or `black`.
    pub tile: String,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Procedure started on every robot. Without it the session is only
    /// parsed.
    #[serde(default)]
    pub proc: Option<String>,

    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    #[serde(default)]
    pub expect_parse_error: bool,

    /// Substring of an expected engine error (e.g. an unsupported statement).
    #[serde(default)]
    pub expect_error: Option<String>,

    /// Fault name some robot must end with. Without it, no robot may fault.
    #[serde(default)]
    pub expect_fault: Option<String>,

    /// The run must stop on the round limit rather than go idle.
    #[serde(default)]
    pub expect_step_limit: bool,

    /// Final robot positions, in session order.
    #[serde(default)]
    pub expect_robots: Option<Vec<ExpectedRobot>>,

    #[serde(default)]
    pub expect_tiles: Vec<ExpectedTile>,
}

fn default_max_steps() -> usize {
    crate::DEFAULT_MAX_STEPS
}

/// Split a `.test.kar` file into its TOML frontmatter and session text.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let body = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let body = body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body);

    let close = body
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;
    let frontmatter = body[..close].trim_end_matches('\r');
    let rest = &body[close + 4..];
    let source = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or("?", |n| n.trim_end_matches(TEST_SUFFIX))
        })
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, outcome) = match std::fs::read_to_string(path) {
        Ok(content) => match parse_test_file(&content) {
            Ok((config, source)) => {
                let outcome = match check_scenario(&config, source) {
                    Ok(()) => TestOutcome::Pass,
                    Err(reason) => TestOutcome::Fail(reason),
                };
                (config.description, outcome)
            }
            Err(e) => (None, TestOutcome::Fail(format!("frontmatter error: {}", e))),
        },
        Err(e) => (None, TestOutcome::Fail(format!("cannot read file: {}", e))),
    };
    TestResult {
        path: path.to_path_buf(),
        description,
        outcome,
    }
}

/// Load and run one scenario. `Err` carries the failure reason.
fn check_scenario(config: &TestConfig, source: &str) -> Result<(), String> {
    let parsed = Session::parse(source, 0);
    if config.expect_parse_error {
        return match parsed {
            Err(_) => Ok(()),
            Ok(_) => Err("expected parse error, but parsing succeeded".into()),
        };
    }
    let mut session = parsed.map_err(|e| format!("unexpected parse error: {}", e))?;

    let Some(name) = &config.proc else {
        return check_final_state(config, &session);
    };
    let result = crate::find_procedure(&session, name).and_then(|proc| {
        session
            .start(proc)
            .and_then(|_| session.run_until_idle(config.max_steps))
            .map_err(|e| e.to_string())
    });
    let run = match (result, &config.expect_error) {
        (Ok(_), Some(expected)) => {
            return Err(format!(
                "expected error containing \"{}\", but the run succeeded",
                expected
            ));
        }
        (Err(message), Some(expected)) => {
            return if message.contains(expected.as_str()) {
                Ok(())
            } else {
                Err(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, message
                ))
            };
        }
        (Err(message), None) => return Err(format!("unexpected error: {}", message)),
        (Ok(run), None) => run,
    };

    if run.limit_hit != config.expect_step_limit {
        return Err(if run.limit_hit {
            format!("robots still busy after {} round(s)", run.rounds)
        } else {
            format!(
                "expected the round limit to be hit, but robots stopped after {} round(s)",
                run.rounds
            )
        });
    }
    check_final_state(config, &session)
}

fn check_final_state(config: &TestConfig, session: &Session) -> Result<(), String> {
    let faults: Vec<RobotFault> = session.robots.iter().filter_map(|r| r.error()).collect();
    match &config.expect_fault {
        Some(name) => {
            let expected = RobotFault::from_name(name)
                .ok_or_else(|| format!("unknown fault name \"{}\"", name))?;
            if !faults.contains(&expected) {
                return Err(format!("expected a robot to fault with {}", name));
            }
        }
        None => {
            if let Some(fault) = faults.first() {
                return Err(format!("unexpected robot fault: {}", fault.name()));
            }
        }
    }

    if let Some(expected) = &config.expect_robots {
        if expected.len() != session.robots.len() {
            return Err(format!(
                "expected {} robot(s), found {}",
                expected.len(),
                session.robots.len()
            ));
        }
        for (i, (want, robot)) in expected.iter().zip(session.robots.iter()).enumerate() {
            let dir = Direction::from_name(&want.dir)
                .ok_or_else(|| format!("robot[{}]: unknown direction \"{}\"", i, want.dir))?;
            let (x, y) = robot.position();
            if (x, y) != (want.x, want.y) || robot.direction() != dir {
                return Err(format!(
                    "robot[{}]: expected ({}, {}) facing {}, found ({}, {}) facing {}",
                    i,
                    want.x,
                    want.y,
                    dir,
                    x,
                    y,
                    robot.direction()
                ));
            }
        }
    }

    for want in &config.expect_tiles {
        let tile = Tile::from_name(&want.tile)
            .ok_or_else(|| format!("unknown tile name \"{}\"", want.tile))?;
        let found = session.map.tile(want.x, want.y);
        if found != tile {
            return Err(format!(
                "tile ({}, {}): expected {}, found {}",
                want.x,
                want.y,
                tile.name(),
                found.name()
            ));
        }
    }
    Ok(())
}

/// Scenario files grouped by the subfolder they live in, relative to
/// `root`. Files directly in `root` have the empty category.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_test = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEST_SUFFIX));
        if is_test {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }

    fn bold(&self, text: &str) -> String {
        self.paint("1", text)
    }
}

/// Keep the categories the user asked for. A request also selects its
/// nested subfolders.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }
    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run every scenario under `path` (or the single file `path`), optionally
/// restricted to `categories`. Returns the process exit code.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", TEST_SUFFIX, path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_vec()))
            .collect()
    };
    let show_headers = !path.is_file();

    let mut passed = 0usize;
    let mut failures = Vec::new();
    for (category, files) in &groups {
        if show_headers {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
