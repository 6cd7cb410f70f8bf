//! Repository synchronizer.
//!
//! Makes the working tree a continuation of whatever history the remote
//! already has on the deploy branch (or starts fresh history when it has
//! none), then records one new commit and pushes it.
//!
//! ```text
//! probe (clone --branch main → scratch)
//!   ├─ HistoryFound → replace <workdir>/.git with scratch/.git
//!   └─ NoHistory    → git init · checkout -b main · remote add origin
//! add -A · commit --allow-empty · push origin main
//! ```

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::git::{redact_credentials, Git};
use std::path::Path;
use tempfile::TempDir;
use tracing::{info, warn};

const METADATA_DIR: &str = ".git";

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Outcome of the adoption probe.
///
/// A failed clone is a normal branch, not an error. The probe cannot tell
/// "no history yet" apart from "remote unreachable right now"; both land in
/// `NoHistory`, with the clone's stderr kept for the log.
#[derive(Debug)]
pub enum Probe {
    /// The remote has commits on the deploy branch. The scratch clone lives
    /// until this value is dropped.
    HistoryFound(TempDir),
    NoHistory { diagnostic: String },
}

/// What `sync` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// `true` when remote history was adopted, `false` for fresh history.
    pub adopted: bool,
    /// Short id of the pushed commit.
    pub head: String,
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

pub struct Synchronizer<'a> {
    git: Git,
    config: &'a DeployConfig,
}

impl<'a> Synchronizer<'a> {
    pub fn new(config: &'a DeployConfig) -> Result<Self> {
        let git = Git::locate(config.workdir(), config.identity.clone())?;
        Ok(Self { git, config })
    }

    /// Link the working tree to `push_url`, commit everything, and push.
    pub fn sync(&self, push_url: &str) -> Result<SyncReport> {
        let adopted = match self.probe(push_url)? {
            Probe::HistoryFound(scratch) => {
                self.adopt(&scratch.path().join("remote"))?;
                info!("adopted history from existing repository");
                true
            }
            Probe::NoHistory { diagnostic } => {
                warn!(
                    url = %redact_credentials(push_url),
                    diagnostic = %diagnostic,
                    "no existing history found, initializing a new repository"
                );
                self.init_fresh(push_url)?;
                false
            }
        };

        let branch = self.config.branch.as_str();
        self.git.run_checked(&["add", "-A"])?;
        self.git.run_checked(&[
            "commit",
            "-m",
            &self.config.commit_message,
            "--allow-empty",
        ])?;
        self.git.run_checked(&["push", &self.config.remote, branch])?;

        let head = self
            .git
            .run_checked(&["rev-parse", "--short", "HEAD"])?
            .trim()
            .to_string();
        info!(head = %head, adopted, "push successful");

        Ok(SyncReport { adopted, head })
    }

    /// Try to clone the deploy branch of `push_url` into a scratch directory.
    pub fn probe(&self, push_url: &str) -> Result<Probe> {
        info!("checking whether the repository already has history");
        let scratch = TempDir::new()?;
        let target = scratch.path().join("remote");
        let target = target.to_string_lossy();

        let output = self.git.run(&[
            "clone",
            "--branch",
            &self.config.branch,
            push_url,
            &target,
        ])?;

        if output.status.success() {
            Ok(Probe::HistoryFound(scratch))
        } else {
            Ok(Probe::NoHistory {
                diagnostic: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Replace the working tree's metadata directory with the scratch clone's.
    fn adopt(&self, clone_root: &Path) -> Result<()> {
        let source = clone_root.join(METADATA_DIR);
        if !source.is_dir() {
            return Err(DeployError::Config(format!(
                "scratch clone has no {METADATA_DIR} directory at {}",
                clone_root.display()
            )));
        }
        let target = self.git.workdir().join(METADATA_DIR);
        remove_metadata(&target)?;
        copy_dir_all(&source, &target)
    }

    /// Start new history on the deploy branch with `push_url` as the remote.
    fn init_fresh(&self, push_url: &str) -> Result<()> {
        remove_metadata(&self.git.workdir().join(METADATA_DIR))?;
        self.git.run_checked(&["init"])?;
        self.git.run_checked(&["checkout", "-b", &self.config.branch])?;
        self.git.run_checked(&["remote", "add", &self.config.remote, push_url])?;
        Ok(())
    }
}

/// Remove a metadata directory (or a `.git` gitlink file) if present.
fn remove_metadata(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Recursively copy `src` into `dst`, creating `dst`.
fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let to = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_all(&entry.path(), &to)?;
        } else {
            std::fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitIdentity;
    use std::path::PathBuf;

    struct Fixture {
        root: TempDir,
        remote: PathBuf,
        workdir: PathBuf,
    }

    fn git_in(dir: &Path) -> Git {
        Git::locate(dir, GitIdentity::default()).unwrap()
    }

    /// Empty bare repository whose HEAD points at `main`.
    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let remote = root.path().join("remote.git");
        let workdir = root.path().join("app");
        std::fs::create_dir_all(&workdir).unwrap();
        git_in(root.path())
            .run_checked(&["init", "--bare", remote.to_str().unwrap()])
            .unwrap();
        git_in(&remote)
            .run_checked(&["symbolic-ref", "HEAD", "refs/heads/main"])
            .unwrap();
        Fixture {
            root,
            remote,
            workdir,
        }
    }

    /// Push `n` commits to `main` on the remote, each adding `seed-<i>.txt`.
    fn seed_remote(fx: &Fixture, n: usize) {
        let seed = fx.root.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        let git = git_in(&seed);
        git.run_checked(&["init"]).unwrap();
        git.run_checked(&["checkout", "-b", "main"]).unwrap();
        for i in 0..n {
            std::fs::write(seed.join(format!("seed-{i}.txt")), format!("{i}")).unwrap();
            git.run_checked(&["add", "-A"]).unwrap();
            git.run_checked(&["commit", "-m", &format!("seed {i}")]).unwrap();
        }
        git.run_checked(&["remote", "add", "origin", fx.remote.to_str().unwrap()]).unwrap();
        git.run_checked(&["push", "origin", "main"]).unwrap();
    }

    fn remote_commits(fx: &Fixture) -> Vec<String> {
        git_in(&fx.remote)
            .run_checked(&["rev-list", "main"])
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn remote_files(fx: &Fixture) -> Vec<String> {
        git_in(&fx.remote)
            .run_checked(&["ls-tree", "--name-only", "main"])
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn sync(fx: &Fixture) -> Result<SyncReport> {
        let cfg = DeployConfig::new(&fx.workdir);
        Synchronizer::new(&cfg)?.sync(fx.remote.to_str().unwrap())
    }

    #[test]
    fn fresh_remote_gets_exactly_one_commit_on_main() {
        let fx = fixture();
        std::fs::write(fx.workdir.join("index.html"), "<h1>hi</h1>").unwrap();

        let report = sync(&fx).unwrap();
        assert!(!report.adopted);
        assert!(!report.head.is_empty());

        assert_eq!(remote_commits(&fx).len(), 1);
        assert_eq!(remote_files(&fx), vec!["index.html".to_string()]);

        let git = git_in(&fx.workdir);
        let origin = git.run_checked(&["remote", "get-url", "origin"]).unwrap();
        assert_eq!(origin.trim(), fx.remote.to_str().unwrap());
        let branch = git
            .run_checked(&["rev-parse", "--abbrev-ref", "HEAD"])
            .unwrap();
        assert_eq!(branch.trim(), "main");
    }

    #[test]
    fn existing_history_is_adopted_and_extended() {
        let fx = fixture();
        seed_remote(&fx, 3);
        let before = remote_commits(&fx);
        std::fs::write(fx.workdir.join("index.html"), "new").unwrap();

        let report = sync(&fx).unwrap();
        assert!(report.adopted);

        let after = remote_commits(&fx);
        assert_eq!(after.len(), 4);
        // rev-list is newest first: the old history is the tail, untouched.
        assert_eq!(&after[1..], &before[..]);
    }

    #[test]
    fn running_twice_adds_two_commits() {
        let fx = fixture();
        seed_remote(&fx, 2);
        std::fs::write(fx.workdir.join("index.html"), "v1").unwrap();

        sync(&fx).unwrap();
        // No file changes on the second run: the empty commit is still pushed.
        sync(&fx).unwrap();

        assert_eq!(remote_commits(&fx).len(), 4);
    }

    #[test]
    fn fresh_then_rerun_adopts_own_history() {
        let fx = fixture();
        std::fs::write(fx.workdir.join("index.html"), "v1").unwrap();

        assert!(!sync(&fx).unwrap().adopted);
        std::fs::write(fx.workdir.join("index.html"), "v2").unwrap();
        assert!(sync(&fx).unwrap().adopted);

        assert_eq!(remote_commits(&fx).len(), 2);
    }

    #[test]
    fn snapshot_includes_deletions() {
        let fx = fixture();
        seed_remote(&fx, 2);
        // Working tree only has seed-0.txt; seed-1.txt must disappear remotely.
        std::fs::write(fx.workdir.join("seed-0.txt"), "0").unwrap();

        sync(&fx).unwrap();

        assert_eq!(remote_files(&fx), vec!["seed-0.txt".to_string()]);
    }

    #[test]
    fn stale_local_metadata_is_replaced_by_remote_history() {
        let fx = fixture();
        seed_remote(&fx, 1);
        let local = git_in(&fx.workdir);
        local.run_checked(&["init"]).unwrap();
        local.run_checked(&["checkout", "-b", "main"]).unwrap();
        local
            .run_checked(&["commit", "-m", "unrelated", "--allow-empty"])
            .unwrap();

        let report = sync(&fx).unwrap();
        assert!(report.adopted);
        assert_eq!(remote_commits(&fx).len(), 2);
    }

    #[test]
    fn probe_reports_no_history_for_empty_remote() {
        let fx = fixture();
        let cfg = DeployConfig::new(&fx.workdir);
        let sync = Synchronizer::new(&cfg).unwrap();
        match sync.probe(fx.remote.to_str().unwrap()).unwrap() {
            Probe::NoHistory { diagnostic } => assert!(!diagnostic.is_empty()),
            Probe::HistoryFound(_) => panic!("empty remote has no history"),
        }
    }

    #[test]
    fn probe_keeps_scratch_clone_alive_until_dropped() {
        let fx = fixture();
        seed_remote(&fx, 1);
        let cfg = DeployConfig::new(&fx.workdir);
        let sync = Synchronizer::new(&cfg).unwrap();
        let Probe::HistoryFound(scratch) = sync.probe(fx.remote.to_str().unwrap()).unwrap()
        else {
            panic!("expected history");
        };
        let path = scratch.path().to_path_buf();
        assert!(path.join("remote/.git").is_dir());
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn push_failure_surfaces_git_error() {
        let fx = fixture();
        std::fs::write(fx.workdir.join("index.html"), "x").unwrap();
        let missing = fx.root.path().join("does-not-exist.git");
        let cfg = DeployConfig::new(&fx.workdir);

        let err = Synchronizer::new(&cfg)
            .unwrap()
            .sync(missing.to_str().unwrap())
            .unwrap_err();
        match err {
            DeployError::Git { command, .. } => assert!(command.starts_with("git push")),
            other => panic!("expected Git error, got {other:?}"),
        }
    }
}
