use pretty_assertions::assert_eq;
use std::fs;
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn scratch_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "smallsh_it_{name}_{}_{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).unwrap();
    fs::canonicalize(dir).unwrap()
}

// Each shell gets its own process group: `exit` signals the whole group.
fn spawn(dir: &Path, prompt: bool) -> Child {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_smallsh"));
    if !prompt {
        cmd.arg("--no-prompt");
    }
    cmd.env("PATH", "/bin:/usr/bin")
        .env("HOME", dir)
        .current_dir(dir)
        .process_group(0)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start smallsh")
}

fn run_script(dir: &Path, script: &str) -> Output {
    let mut child = spawn(dir, false);
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn redirected_output_and_status() {
    let dir = scratch_dir("redirect");

    let output = run_script(
        &dir,
        "echo hello world > out.txt\nstatus\ncat < out.txt\nexit\n",
    );

    assert!(output.status.success());
    assert_eq!(stdout(&output), "exit value 0\nhello world\n");
    assert_eq!(fs::read_to_string(dir.join("out.txt")).unwrap(), "hello world\n");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_input_file_sets_status_one() {
    let dir = scratch_dir("missing_input");

    let output = run_script(&dir, "cat < nothing_here.txt\nstatus\nexit\n");

    assert_eq!(
        stdout(&output),
        "cannot open nothing_here.txt for input\nexit value 1\n"
    );
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn unknown_program_sets_status_one() {
    let dir = scratch_dir("badprog");

    let output = run_script(&dir, "badprogcmd\nstatus\nexit\n");

    assert_eq!(stdout(&output), "exit value 1\n");
    assert!(
        String::from_utf8_lossy(&output.stderr)
            .contains("badprogcmd: no such file or directory\n")
    );
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn comments_and_blank_lines_are_skipped() {
    let dir = scratch_dir("comments");

    let output = run_script(&dir, "# echo nope\n\n    \nfalse\n# status\nstatus\nexit\n");

    assert_eq!(stdout(&output), "exit value 1\n");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn pid_is_substituted() {
    let dir = scratch_dir("pid");
    let mut child = spawn(&dir, false);
    let pid = child.id();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"echo pid$$ $$$\nexit\n")
        .unwrap();

    let output = child.wait_with_output().unwrap();

    assert_eq!(stdout(&output), format!("pid{pid} {pid}$\n"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn cd_defaults_to_home_and_reports_failures() {
    let dir = scratch_dir("cd");
    fs::create_dir(dir.join("sub")).unwrap();

    let output = run_script(
        &dir,
        "cd sub\npwd\ncd\npwd\ncd /nonexistent_smallsh_dir\npwd\nexit\n",
    );

    let expected = format!(
        "{sub}\n{home}\ncd: no such file or directory: /nonexistent_smallsh_dir\n{home}\n",
        sub = dir.join("sub").display(),
        home = dir.display(),
    );
    assert_eq!(stdout(&output), expected);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn background_jobs_are_announced_and_reaped() {
    let dir = scratch_dir("background");

    let output = run_script(&dir, "true &\nsleep 1\nexit\n");
    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 2, "unexpected output: {out:?}");
    let pid = lines[0]
        .strip_prefix("background pid is ")
        .expect("background launch not announced");
    assert_eq!(lines[1], format!("background pid {pid} is done: exit value 0"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn background_jobs_leave_status_alone() {
    let dir = scratch_dir("background_status");

    let output = run_script(&dir, "false\nsleep 5 &\nstatus\nexit\n");
    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 2, "unexpected output: {out:?}");
    assert!(lines[0].starts_with("background pid is "));
    assert_eq!(lines[1], "exit value 1");
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn background_output_goes_to_null_device() {
    let dir = scratch_dir("background_null");

    let output = run_script(&dir, "echo lost &\nsleep 1\nexit\n");
    let out = stdout(&output);

    assert!(out.starts_with("background pid is "));
    assert!(!out.contains("lost"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn end_of_input_behaves_like_exit() {
    let dir = scratch_dir("eof");

    let output = run_script(&dir, "sleep 30 &\n");

    assert!(output.status.success());
    assert!(stdout(&output).starts_with("background pid is "));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn parse_errors_are_reported_without_running() {
    let dir = scratch_dir("parse");

    let output = run_script(&dir, "echo hi >\nstatus\nexit\n");

    assert_eq!(
        stdout(&output),
        "smallsh: syntax error: expected a file name after '>'\nexit value 0\n"
    );
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn sigtstp_toggles_foreground_only_mode() {
    let dir = scratch_dir("sigtstp");
    let mut child = spawn(&dir, true);
    let mut out = child.stdout.take().unwrap();

    let mut prompt = [0u8; 2];
    out.read_exact(&mut prompt).unwrap();
    assert_eq!(&prompt, b": ");

    // SAFETY: plain kill(2) on a child we own.
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTSTP) };
    assert_eq!(rc, 0);

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"echo hi &\nexit\n")
        .unwrap();
    let mut rest = String::new();
    out.read_to_string(&mut rest).unwrap();
    child.wait().unwrap();

    assert!(rest.contains("\nEntering foreground-only mode (& is now ignored)\n: "));
    assert!(rest.contains("hi\n"));
    assert!(!rest.contains("background pid is"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn interrupt_kills_foreground_child_only() {
    let dir = scratch_dir("sigint");
    let mut child = spawn(&dir, false);
    let mut out = child.stdout.take().unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"sleep 5\nstatus\necho alive\nexit\n")
        .unwrap();
    // Let the shell reach its wait on `sleep`.
    std::thread::sleep(Duration::from_millis(500));

    // SAFETY: plain kill(2) on the process group the shell leads.
    let rc = unsafe { libc::kill(-(child.id() as libc::pid_t), libc::SIGINT) };
    assert_eq!(rc, 0);

    let mut rest = String::new();
    out.read_to_string(&mut rest).unwrap();
    let status = child.wait().unwrap();

    assert!(status.success());
    assert_eq!(rest, "terminated by signal 2\nterminated by signal 2\nalive\n");
    let _ = fs::remove_dir_all(dir);
}
