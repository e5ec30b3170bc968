// Copyright (C) 2024 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use smol_str::SmolStr;

/// One watched shader file and the pipeline that owns it.
#[derive(Debug, Clone)]
pub(crate) struct ShaderMonitor {
    pub path: PathBuf,
    pub mtime: Option<SystemTime>,
    pub pipeline: SmolStr,
}

impl ShaderMonitor {
    pub fn new(path: &Path, pipeline: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            mtime: probe(path),
            pipeline: pipeline.into(),
        }
    }
}

fn probe(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[derive(Debug, Default)]
pub(crate) struct ScanOutcome {
    /// Every file whose mtime advanced; their cached modules are stale.
    pub changed: Vec<PathBuf>,
    /// The first pipeline that needs rebuilding. One reload per scan,
    /// the next frame picks up further edits.
    pub reload: Option<SmolStr>,
}

pub(crate) fn scan(monitors: &mut [ShaderMonitor]) -> ScanOutcome {
    scan_with(monitors, probe)
}

fn scan_with(
    monitors: &mut [ShaderMonitor],
    probe: impl Fn(&Path) -> Option<SystemTime>,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    for monitor in monitors.iter_mut() {
        let current = probe(&monitor.path);
        let advanced = match (monitor.mtime, current) {
            (Some(prev), Some(now)) => now > prev,
            (None, Some(_)) => true,
            _ => false,
        };
        if advanced {
            outcome.changed.push(monitor.path.clone());
            if outcome.reload.is_none() {
                outcome.reload = Some(monitor.pipeline.clone());
            }
        }
        // Mtimes advance even when this scan defers the actual reload.
        monitor.mtime = current;
    }

    outcome
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashMap,
        path::{Path, PathBuf},
        time::{Duration, SystemTime},
    };

    use super::{scan_with, ShaderMonitor};

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn monitor(path: &str, pipeline: &str, mtime: u64) -> ShaderMonitor {
        ShaderMonitor {
            path: PathBuf::from(path),
            mtime: Some(at(mtime)),
            pipeline: pipeline.into(),
        }
    }

    fn fs(entries: &[(&str, u64)]) -> HashMap<PathBuf, SystemTime> {
        entries
            .iter()
            .map(|(path, secs)| (PathBuf::from(path), at(*secs)))
            .collect()
    }

    fn probe_in(map: &HashMap<PathBuf, SystemTime>) -> impl Fn(&Path) -> Option<SystemTime> + '_ {
        move |path| map.get(path).copied()
    }

    #[test]
    fn unchanged_is_noop() {
        let mut monitors = vec![monitor("a.glsl", "x", 10)];
        let files = fs(&[("a.glsl", 10)]);
        let outcome = scan_with(&mut monitors, probe_in(&files));
        assert!(outcome.changed.is_empty());
        assert!(outcome.reload.is_none());
    }

    #[test]
    fn touch_triggers_reload() {
        let mut monitors = vec![monitor("a.glsl", "x", 10)];
        let files = fs(&[("a.glsl", 11)]);
        let outcome = scan_with(&mut monitors, probe_in(&files));
        assert_eq!(vec![PathBuf::from("a.glsl")], outcome.changed);
        assert_eq!(Some("x".into()), outcome.reload);
        // A second scan over the same state sees nothing new.
        let outcome = scan_with(&mut monitors, probe_in(&files));
        assert!(outcome.changed.is_empty());
    }

    #[test]
    fn one_reload_per_scan_first_wins() {
        let mut monitors = vec![
            monitor("a.glsl", "x", 10),
            monitor("b.glsl", "y", 10),
        ];
        let files = fs(&[("a.glsl", 12), ("b.glsl", 12)]);
        let outcome = scan_with(&mut monitors, probe_in(&files));
        assert_eq!(2, outcome.changed.len());
        assert_eq!(Some("x".into()), outcome.reload);
        // Both mtimes were taken, the deferred file does not re-trigger.
        let outcome = scan_with(&mut monitors, probe_in(&files));
        assert!(outcome.reload.is_none());
    }

    #[test]
    fn missing_file_is_ignored() {
        let mut monitors = vec![monitor("a.glsl", "x", 10)];
        let files = fs(&[]);
        let outcome = scan_with(&mut monitors, probe_in(&files));
        assert!(outcome.changed.is_empty());
    }
}
