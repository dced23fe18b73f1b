//! Virtual-disk compaction
//!
//! Locates the Docker/WSL backing files under a user profile and compacts
//! them one at a time with `Optimize-VHD`.

use drydock_core::domain::command::{CommandResult, CommandSpec};
use drydock_core::error::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::event_log::EventLog;
use crate::host::CommandRunner;

/// Known backing-file locations, relative to the user profile
const BACKING_FILES: [&[&str]; 3] = [
    &["AppData", "Local", "Docker", "wsl", "disk", "docker_data.vhdx"],
    &["AppData", "Local", "Docker", "wsl", "data", "ext4.vhdx"],
    &["AppData", "Local", "Docker", "wsl", "disk", "docker_data.vhd"],
];

pub struct VhdOptimizer {
    runner: Arc<dyn CommandRunner>,
    events: Arc<dyn EventLog>,
    extra_paths: Vec<PathBuf>,
    compaction_timeout: Duration,
}

impl VhdOptimizer {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        events: Arc<dyn EventLog>,
        compaction_timeout: Duration,
    ) -> Self {
        Self {
            runner,
            events,
            extra_paths: Vec::new(),
            compaction_timeout,
        }
    }

    /// Adds files, or directories scanned for `.vhd`/`.vhdx`, to the search
    pub fn with_extra_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.extra_paths = paths;
        self
    }

    /// Returns the backing files that exist, known locations first
    ///
    /// Missing files are skipped; an empty result is not an error.
    pub fn locate_backing_files(&self, user_profile: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = Vec::new();

        for segments in BACKING_FILES {
            let path = segments
                .iter()
                .fold(user_profile.to_path_buf(), |path, segment| path.join(segment));
            self.events
                .debug(&format!("Checking VHD file: {}", path.display()));

            if path.is_file() {
                self.events
                    .info(&format!("Found VHD file: {}", path.display()));
                push_unique(&mut found, path);
            } else {
                self.events
                    .debug(&format!("VHD file not found: {}", path.display()));
            }
        }

        for extra in &self.extra_paths {
            if extra.is_file() {
                push_unique(&mut found, extra.clone());
            } else if extra.is_dir() {
                for path in scan_directory(extra) {
                    self.events
                        .info(&format!("Found VHD file: {}", path.display()));
                    push_unique(&mut found, path);
                }
            } else {
                self.events
                    .debug(&format!("VHD search path not found: {}", extra.display()));
            }
        }

        found
    }

    /// Compacts one backing file
    ///
    /// The owning service must already be stopped.
    pub async fn optimize(&self, path: &Path) -> Result<CommandResult> {
        self.events
            .info(&format!("Optimizing VHD: {}", path.display()));
        let command = optimize_command(path);
        let result = self.runner.run(&command, self.compaction_timeout).await?;
        self.events.info(&format!(
            "Optimized {} in {} ms",
            path.display(),
            result.duration_ms
        ));
        Ok(result)
    }
}

/// `Optimize-VHD` invocation with the path single-quoted for PowerShell
pub fn optimize_command(path: &Path) -> CommandSpec {
    let quoted = path.display().to_string().replace('\'', "''");
    CommandSpec::powershell(format!("Optimize-VHD -Path '{}' -Mode Full", quoted))
}

fn push_unique(found: &mut Vec<PathBuf>, path: PathBuf) {
    if !found.contains(&path) {
        found.push(path);
    }
}

fn scan_directory(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_virtual_disk(path))
        .collect();
    paths.sort();
    paths
}

fn is_virtual_disk(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("vhd") || ext.eq_ignore_ascii_case("vhdx"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::MemoryEventLog;
    use crate::host::testing::ScriptedRunner;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"vhd").unwrap();
    }

    fn optimizer(runner: &Arc<ScriptedRunner>) -> VhdOptimizer {
        VhdOptimizer::new(
            runner.clone(),
            Arc::new(MemoryEventLog::new()),
            Duration::from_secs(7200),
        )
    }

    #[test]
    fn test_locate_known_locations_in_order() {
        let profile = tempfile::tempdir().unwrap();
        let wsl = profile.path().join("AppData/Local/Docker/wsl");
        touch(&wsl.join("disk/docker_data.vhd"));
        touch(&wsl.join("disk/docker_data.vhdx"));

        let found = optimizer(&ScriptedRunner::new()).locate_backing_files(profile.path());
        assert_eq!(
            found,
            vec![
                wsl.join("disk").join("docker_data.vhdx"),
                wsl.join("disk").join("docker_data.vhd"),
            ]
        );
    }

    #[test]
    fn test_locate_nothing_is_empty() {
        let profile = tempfile::tempdir().unwrap();
        assert!(
            optimizer(&ScriptedRunner::new())
                .locate_backing_files(profile.path())
                .is_empty()
        );
    }

    #[test]
    fn test_extra_paths_are_scanned_and_deduplicated() {
        let profile = tempfile::tempdir().unwrap();
        let known = profile
            .path()
            .join("AppData/Local/Docker/wsl/data/ext4.vhdx");
        touch(&known);

        let extra = tempfile::tempdir().unwrap();
        touch(&extra.path().join("b.VHDX"));
        touch(&extra.path().join("a.vhd"));
        touch(&extra.path().join("notes.txt"));

        let found = optimizer(&ScriptedRunner::new())
            .with_extra_paths(vec![
                known.clone(),
                extra.path().to_path_buf(),
                PathBuf::from("/no/such/dir"),
            ])
            .locate_backing_files(profile.path());

        assert_eq!(
            found,
            vec![
                profile
                    .path()
                    .join("AppData")
                    .join("Local")
                    .join("Docker")
                    .join("wsl")
                    .join("data")
                    .join("ext4.vhdx"),
                extra.path().join("a.vhd"),
                extra.path().join("b.VHDX"),
            ]
        );
    }

    #[test]
    fn test_optimize_command_quotes_path() {
        let command = optimize_command(Path::new(r"C:\Users\o'brien\ext4.vhdx"));
        assert_eq!(
            command.to_string(),
            r"powershell Optimize-VHD -Path 'C:\Users\o''brien\ext4.vhdx' -Mode Full"
        );
    }

    #[tokio::test]
    async fn test_optimize_propagates_failure() {
        let runner = ScriptedRunner::new();
        runner.fail("powershell Optimize-VHD", 1, "The file is in use.");

        let err = optimizer(&runner)
            .optimize(Path::new("disk.vhdx"))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
    }
}
