//! User agent rotation for portal requests.

use std::path::Path;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

/// Fallback agent used when every other source comes up empty.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Browser user agents shipped with the binary (updated Nov 2024).
pub const BUILTIN_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    // Firefox on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0",
];

/// Pool of user agents, one picked at random per request attempt.
///
/// The portal throttles clients that present a constant identity, so each
/// attempt (retries included) draws a fresh agent.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    agents: Arc<Vec<String>>,
}

impl UserAgentPool {
    /// Pool backed by the built-in browser list.
    pub fn builtin() -> Self {
        Self {
            agents: Arc::new(BUILTIN_USER_AGENTS.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Pool from explicit agents. Blank lines are dropped and an empty
    /// input falls back to the built-in list.
    pub fn from_agents(agents: Vec<String>) -> Self {
        let agents: Vec<String> = agents
            .into_iter()
            .map(|agent| agent.trim().to_string())
            .filter(|agent| !agent.is_empty())
            .collect();
        if agents.is_empty() {
            warn!("user agent list was empty, using built-in agents");
            return Self::builtin();
        }
        Self {
            agents: Arc::new(agents),
        }
    }

    /// Reads one agent per line from a file.
    ///
    /// A missing or unreadable file is logged and the built-in list is used
    /// instead, so a bad path never stops a scrape.
    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let pool = Self::from_agents(contents.lines().map(str::to_string).collect());
                debug!("loaded {} user agents from {}", pool.len(), path.display());
                pool
            }
            Err(err) => {
                warn!(
                    "could not read user agents from {}: {}, using built-in agents",
                    path.display(),
                    err
                );
                Self::builtin()
            }
        }
    }

    /// Picks a random agent from the pool.
    pub fn pick(&self) -> &str {
        if self.agents.is_empty() {
            return DEFAULT_USER_AGENT;
        }
        let index = rand::rng().random_range(0..self.agents.len());
        &self.agents[index]
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::builtin()
    }
}
