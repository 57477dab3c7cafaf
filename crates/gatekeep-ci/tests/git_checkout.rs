//! GitCheckout against real local repositories, including a nested submodule.

use gatekeep_ci::{ExecError, GitCheckout, SourceFetcher, SourceRef, TokioProcessRunner};
use gatekeep_core::CheckoutOptions;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=gatekeep",
            "-c",
            "user.email=gatekeep@example.com",
            "-c",
            "protocol.file.allow=always",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git is installed");
    assert!(
        status.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&status.stderr)
    );
}

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Superproject with one file and a submodule at `vendor/nested`.
fn fixture() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("nested");
    let upstream = root.path().join("upstream");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::create_dir_all(&upstream).unwrap();

    git(&nested, &["init", "--quiet"]);
    std::fs::write(nested.join("lib.txt"), "nested content\n").unwrap();
    git(&nested, &["add", "."]);
    git(&nested, &["commit", "--quiet", "-m", "nested"]);

    git(&upstream, &["init", "--quiet"]);
    std::fs::write(upstream.join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
    git(
        &upstream,
        &[
            "submodule",
            "add",
            "--quiet",
            nested.to_str().unwrap(),
            "vendor/nested",
        ],
    );
    git(&upstream, &["add", "."]);
    git(&upstream, &["commit", "--quiet", "-m", "superproject"]);

    root
}

fn checkout() -> GitCheckout {
    GitCheckout::new(Arc::new(TokioProcessRunner::new()))
}

/// Test: recursive checkout populates the submodule
#[tokio::test]
async fn test_recursive_checkout_populates_submodule() {
    if !git_available() {
        return;
    }
    let fixture = fixture();
    let dest = tempfile::tempdir().unwrap();
    let source = SourceRef::new(fixture.path().join("upstream").to_string_lossy());

    checkout()
        .checkout(&source, dest.path(), CheckoutOptions { recursive: true })
        .await
        .expect("recursive checkout");

    assert!(dest.path().join("Cargo.toml").exists());
    let nested = std::fs::read_to_string(dest.path().join("vendor/nested/lib.txt")).unwrap();
    assert_eq!(nested, "nested content\n");
}

/// Test: shallow checkout leaves the submodule directory empty
#[tokio::test]
async fn test_plain_checkout_skips_submodule() {
    if !git_available() {
        return;
    }
    let fixture = fixture();
    let dest = tempfile::tempdir().unwrap();
    let source = SourceRef::new(fixture.path().join("upstream").to_string_lossy());

    checkout()
        .checkout(&source, dest.path(), CheckoutOptions::default())
        .await
        .expect("plain checkout");

    assert!(dest.path().join("Cargo.toml").exists());
    assert!(!dest.path().join("vendor/nested/lib.txt").exists());
}

/// Test: checkout at an explicit revision detaches there
#[tokio::test]
async fn test_checkout_at_revision() {
    if !git_available() {
        return;
    }
    let fixture = fixture();
    let upstream = fixture.path().join("upstream");
    let first = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(&upstream)
        .output()
        .unwrap();
    let first = String::from_utf8(first.stdout).unwrap().trim().to_string();

    std::fs::write(upstream.join("later.txt"), "later\n").unwrap();
    git(&upstream, &["add", "."]);
    git(&upstream, &["commit", "--quiet", "-m", "later"]);

    let dest = tempfile::tempdir().unwrap();
    let mut source = SourceRef::new(upstream.to_string_lossy());
    source.revision = Some(first);

    checkout()
        .checkout(&source, dest.path(), CheckoutOptions::default())
        .await
        .expect("checkout at revision");

    assert!(dest.path().join("Cargo.toml").exists());
    assert!(!dest.path().join("later.txt").exists());
}

/// Test: a merge commit reachable only from a pull-request ref is fetched
#[tokio::test]
async fn test_checkout_pull_request_merge_commit() {
    if !git_available() {
        return;
    }
    let fixture = fixture();
    let upstream = fixture.path().join("upstream");

    // Commit on a throwaway branch, keep it only under refs/pull/1/merge.
    git(&upstream, &["checkout", "--quiet", "-b", "pr-head"]);
    std::fs::write(upstream.join("merged.txt"), "from the pull request\n").unwrap();
    git(&upstream, &["add", "."]);
    git(&upstream, &["commit", "--quiet", "-m", "merge pr"]);
    git(&upstream, &["update-ref", "refs/pull/1/merge", "HEAD"]);
    let merge = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(&upstream)
        .output()
        .unwrap();
    let merge = String::from_utf8(merge.stdout).unwrap().trim().to_string();
    git(&upstream, &["checkout", "--quiet", "main"]);
    git(&upstream, &["branch", "--quiet", "-D", "pr-head"]);
    // Hosts serve any reachable commit by id.
    git(&upstream, &["config", "uploadpack.allowAnySHA1InWant", "true"]);

    // A file:// URL goes through the transport, so only advertised branches come along.
    let url = format!("file://{}", upstream.display());
    let event = gatekeep_core::Event::pull_request("main").at_revision(merge);
    let dest = tempfile::tempdir().unwrap();

    checkout()
        .checkout(
            &SourceRef::for_event(url, &event),
            dest.path(),
            CheckoutOptions::default(),
        )
        .await
        .expect("pull request merge commit checkout");

    let merged = std::fs::read_to_string(dest.path().join("merged.txt")).unwrap();
    assert_eq!(merged, "from the pull request\n");
}

/// Test: unreachable repository is a checkout error
#[tokio::test]
async fn test_missing_repository_is_checkout_error() {
    if !git_available() {
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let dest = tempfile::tempdir().unwrap();
    let source = SourceRef::new(root.path().join("does-not-exist").to_string_lossy());

    let err = checkout()
        .checkout(&source, dest.path(), CheckoutOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Checkout(_)));
    assert!(err.to_string().contains("git clone"));
}
