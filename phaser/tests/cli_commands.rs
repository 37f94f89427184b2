//! CLI tests for phaser commands.
//!
//! Spawns the phaser binary and verifies exit codes and status lines for
//! selection, status, marking, summarizing, and a full run against a stub
//! agent.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use phaser::exit_codes;

const DOCUMENT: &str = "\
## Phase 1: Setup
- [x] Create crate [id:: a]

## Phase 2: Core
- [ ] Parser [id:: b]
- [/] Selector [id:: c]
";

fn phaser(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_phaser"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("spawn phaser")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn write_doc(dir: &Path, contents: &str) {
    // A marker keeps repo root discovery inside the temp dir.
    fs::create_dir_all(dir.join(".git")).expect("marker");
    fs::write(dir.join("TASKS.md"), contents).expect("write doc");
}

#[test]
fn next_prints_lowest_outstanding_phase() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);

    let output = phaser(temp.path(), &["next"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).trim(), "2");
}

#[test]
fn next_on_finished_document_exits_nothing_to_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), "## Phase 1: Done\n- [x] a [id:: a]\n");

    let output = phaser(temp.path(), &["next", "TASKS.md"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOTHING_TO_RUN));
    assert!(stdout(&output).contains("all phases complete"));
}

#[test]
fn next_counts_blocked_tasks_as_outstanding() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(
        temp.path(),
        "## Phase 1: A\n- [x] Task A [id:: a]\n- [!] Task C [id:: c] [deps:: a]\n\n## Phase 2: B\n- [ ] Task D [id:: d]\n",
    );

    let output = phaser(temp.path(), &["next"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output).trim(), "1");
}

#[test]
fn duplicate_ids_exit_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), "## Phase 1: A\n- [ ] a [id:: x]\n- [ ] b [id:: x]\n");

    let output = phaser(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("duplicate task id"));
}

#[test]
fn status_lists_phase_counts() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);

    let output = phaser(temp.path(), &["status"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let text = stdout(&output);
    assert!(text.contains("phase 1: Setup (1 done, 0 in progress, 0 pending)"));
    assert!(text.contains("phase 2: Core (0 done, 1 in progress, 1 pending)"));
    assert!(text.contains("next: phase 2"));
}

#[test]
fn run_missing_phase_exits_nothing_to_run() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);

    let output = phaser(temp.path(), &["run", "--phase", "7"]);
    assert_eq!(output.status.code(), Some(exit_codes::NOTHING_TO_RUN));
    assert!(stdout(&output).contains("phase 7 not found"));
}

#[test]
fn dry_run_prints_prompt_and_records_without_mutation() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);

    let output = phaser(temp.path(), &["run", "--dry-run", "--export", "exported"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let text = stdout(&output);
    assert!(text.contains("PHASE 2 COMPLETE"));
    assert!(text.contains("dry run: phase 2 prompt compiled"));
    assert_eq!(
        fs::read_to_string(temp.path().join("TASKS.md")).expect("doc"),
        DOCUMENT
    );
    let runs: Vec<_> = fs::read_dir(temp.path().join("exported"))
        .expect("export dir")
        .collect();
    assert_eq!(runs.len(), 1);
}

#[test]
fn mark_updates_document() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);

    let output = phaser(temp.path(), &["mark", "TASKS.md", "b", "done"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let raw = fs::read_to_string(temp.path().join("TASKS.md")).expect("doc");
    assert!(raw.contains("- [x] Parser [id:: b]"));

    let output = phaser(temp.path(), &["mark", "TASKS.md", "missing", "done"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn mark_blocked_writes_marker_and_refuses_done_tasks() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);

    let output = phaser(
        temp.path(),
        &["mark", "TASKS.md", "b", "blocked", "--reason", "needs schema"],
    );
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let raw = fs::read_to_string(temp.path().join("TASKS.md")).expect("doc");
    assert!(raw.contains("- [!] Parser [id:: b] [blocked:: needs schema]"));

    let output = phaser(temp.path(), &["mark", "TASKS.md", "a", "blocked"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already done"));
    let raw = fs::read_to_string(temp.path().join("TASKS.md")).expect("doc");
    assert!(raw.contains("- [x] Create crate [id:: a]"));
}

#[test]
fn summarize_empty_dir_reports_no_runs() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = phaser(temp.path(), &["summarize", "."]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert_eq!(stdout(&output), "no runs found\n");
}

/// Point the executor at `sh -c <script>`, feeding the prompt on stdin.
#[cfg(unix)]
fn stub_agent(dir: &Path, script: &str) {
    let config = format!(
        "[executor]\nprogram = \"sh\"\nargs = [\"-c\", {script:?}, \"agent\"]\nwrite_flag = \"--allow\"\nprompt_input = \"stdin\"\n"
    );
    fs::create_dir_all(dir.join(".phaser")).expect("config dir");
    fs::write(dir.join(".phaser/config.toml"), config).expect("write config");
}

#[cfg(unix)]
#[test]
fn run_with_stub_agent_completes_phase() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);
    stub_agent(
        temp.path(),
        "cat > prompt.seen; echo \"flag: $1\" 1>&2; echo 'PHASE 2 COMPLETE'",
    );

    let output = phaser(temp.path(), &["run", "--allow-writes"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("phase 2: complete"));

    let raw = fs::read_to_string(temp.path().join("TASKS.md")).expect("doc");
    assert!(raw.contains("- [x] Parser [id:: b]"));
    assert!(raw.contains("- [x] Selector [id:: c]"));
    let seen = fs::read_to_string(temp.path().join("prompt.seen")).expect("prompt");
    assert!(seen.contains("- [ ] Parser (b)"));

    let runs_dir = temp.path().join(".phaser/runs");
    let run_dir = fs::read_dir(&runs_dir)
        .expect("runs dir")
        .next()
        .expect("one run")
        .expect("entry")
        .path();
    let captured = fs::read_to_string(run_dir.join("output.txt")).expect("output");
    assert_eq!(captured, "flag: --allow\nPHASE 2 COMPLETE\n");

    let output = phaser(temp.path(), &["summarize", ".phaser/runs"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).contains("complete 1"));
}

#[cfg(unix)]
#[test]
fn run_with_failing_stub_agent_exits_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_doc(temp.path(), DOCUMENT);
    stub_agent(temp.path(), "cat > /dev/null; echo broken; exit 5");

    let output = phaser(temp.path(), &["run"]);
    assert_eq!(output.status.code(), Some(exit_codes::ERROR));
    assert!(stdout(&output).contains("executor exited with code 5"));
    assert_eq!(
        fs::read_to_string(temp.path().join("TASKS.md"))
            .expect("doc")
            .matches("[x]")
            .count(),
        1
    );
}
