//! Interface name filtering
//!
//! Devices whose interface name is rejected here are never created.

use tracing::debug;

/// Pattern always rejected regardless of configuration
const DUMMY_PATTERN: &str = "dummy*";

/// Allow/deny glob filter over interface names
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    allow: Vec<String>,
    deny: Vec<String>,
}

impl DeviceFilter {
    pub fn new(allow: Vec<String>, deny: Vec<String>) -> Self {
        Self { allow, deny }
    }

    /// Build a filter from comma separated pattern lists
    pub fn from_lists(allow: Option<&str>, deny: Option<&str>) -> Self {
        let split = |s: Option<&str>| -> Vec<String> {
            s.map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
        };

        Self::new(split(allow), split(deny))
    }

    /// Whether the interface should be ignored
    pub fn is_filtered(&self, devname: &str) -> bool {
        if !self.allow.is_empty() && !self.allow.iter().any(|p| pattern_match(p, devname)) {
            debug!("ignoring device {} (no allow match)", devname);
            return true;
        }

        if pattern_match(DUMMY_PATTERN, devname) {
            debug!("ignoring dummy networking device {}", devname);
            return true;
        }

        if let Some(pattern) = self.deny.iter().find(|p| pattern_match(p, devname)) {
            debug!("ignoring device {} (deny match {})", devname, pattern);
            return true;
        }

        false
    }
}

/// Shell style wildcard match supporting `*` and `?`
pub fn pattern_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}
