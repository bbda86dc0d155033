//! Link hotplug monitor
//!
//! Polls the sysfs network class directory and forwards appearing and
//! vanishing links to the control loop.

use crate::daemon::{CoreCommand, CoreHandle};
use crate::detect::LinkEvent;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct LinkMonitor {
    root: PathBuf,
    interval: Duration,
    /// name -> ifindex
    known: HashMap<String, u32>,
}

impl LinkMonitor {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            interval: POLL_INTERVAL,
            known: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Compare the directory against the last pass
    ///
    /// Removals come first so a renamed or recreated link reuses its slot
    /// cleanly. New links are returned in name order.
    pub async fn poll(&mut self) -> Vec<CoreCommand> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut current: HashMap<String, LinkEvent> = HashMap::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            match LinkEvent::from_sysfs(&self.root, &name).await {
                Ok(link) => {
                    current.insert(name, link);
                }
                Err(e) => debug!("skipping {}: {}", name, e),
            }
        }

        let mut commands = Vec::new();

        let mut removed: Vec<(String, u32)> = self
            .known
            .iter()
            .filter(|(name, index)| current.get(*name).map(|l| l.index) != Some(**index))
            .map(|(name, index)| (name.clone(), *index))
            .collect();
        removed.sort();

        for (name, index) in removed {
            info!("Interface removed: {}", name);
            self.known.remove(&name);
            commands.push(CoreCommand::DelLink(index));
        }

        let mut added: Vec<LinkEvent> = current
            .into_values()
            .filter(|link| !self.known.contains_key(&link.name))
            .collect();
        added.sort_by(|a, b| a.name.cmp(&b.name));

        for link in added {
            debug!("New interface detected: {} (index {})", link.name, link.index);
            self.known.insert(link.name.clone(), link.index);
            commands.push(CoreCommand::NewLink(link));
        }

        commands
    }

    /// Poll until the control loop goes away
    pub async fn run(mut self, handle: CoreHandle) {
        info!("Watching {} every {:?}", self.root.display(), self.interval);

        loop {
            for command in self.poll().await {
                if handle.send(command).is_err() {
                    debug!("Control loop gone, link monitor stopping");
                    return;
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
