//! The worker list and engine settings.
//!
//! Worker lists come either as JSON or as plain text with one `host [port]`
//! per line, `#` starting a comment. Workers are reached over IPv4 only.

use std::{
    env, fs,
    net::{SocketAddr, ToSocketAddrs},
    str::FromStr,
    path::{Path, PathBuf},
    time::Duration,
};

use comms::{MuxKind, msg::DEFAULT_PORT, mux::DEFAULT_TICK};
use log::{info, warn};
use serde::{Deserialize, Deserializer, de};

use crate::{Result, WorkforceErr};

/// Environment variable naming the worker list.
pub const WORKERS_VAR: &str = "FRACTAL_WORKERS";

/// Worker list looked up in the home directory.
pub const PERSONAL_LIST: &str = ".fractal-workers";

/// Worker list shared by every user of the machine.
pub const SYSTEM_LIST: &str = "/usr/local/etc/fractal-workers";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// A worker reachable over UDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEntry {
    pub name: String,
    pub addr: SocketAddr,
    /// Overrides the list-wide timeout.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct WorkforceConfig {
    /// Time a worker gets to answer before its chunk is handed out again.
    pub timeout: Duration,
    pub tick_interval: Duration,
    /// Strategy used when talking to a local worker over a pipe.
    pub pipe_mux: MuxKind,
    /// Strategy used when talking to workers over UDP.
    pub socket_mux: MuxKind,
    /// Local address of the UDP socket.
    pub bind: SocketAddr,
    /// An empty list means one local worker over a pipe.
    pub workers: Vec<WorkerEntry>,
    /// The executable started as the local worker.
    pub local_worker_program: Option<PathBuf>,
}

impl Default for WorkforceConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            tick_interval: DEFAULT_TICK,
            pipe_mux: MuxKind::Simple,
            socket_mux: MuxKind::Poll,
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            workers: Vec::new(),
            local_worker_program: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListFile {
    timeout_ms: Option<u64>,
    tick_ms: Option<u64>,
    #[serde(default, deserialize_with = "strategy")]
    pipe_mux: Option<MuxKind>,
    #[serde(default, deserialize_with = "strategy")]
    socket_mux: Option<MuxKind>,
    workers: Vec<ListEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ListEntry {
    host: String,
    port: Option<u16>,
    timeout_ms: Option<u64>,
}

/// Reads a strategy name through [`MuxKind`]'s `FromStr`.
fn strategy<'de, D>(deserializer: D) -> std::result::Result<Option<MuxKind>, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    MuxKind::from_str(&name).map(Some).map_err(de::Error::custom)
}

impl WorkforceConfig {
    /// Loads the worker list from `path`, or from the usual places if `None`.
    ///
    /// Without a path, `$FRACTAL_WORKERS`, `~/.fractal-workers` and then
    /// [`SYSTEM_LIST`] are tried; when none exists the configuration falls
    /// back to one local worker.
    ///
    /// # Errors
    /// `InvalidConfig` if the list cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => search(|name| env::var(name).ok(), Path::new(SYSTEM_LIST)),
        };

        let Some(path) = path else {
            warn!(
                "no worker list in ${WORKERS_VAR}, ~/{PERSONAL_LIST} or {SYSTEM_LIST}, computing locally"
            );
            return Ok(Self::default());
        };

        let text = fs::read_to_string(&path).map_err(|e| {
            WorkforceErr::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&text)?,
            _ => Self::from_host_list(&text),
        };

        info!(
            "loaded {} worker(s) from {}",
            config.workers.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parses a JSON worker list.
    ///
    /// # Errors
    /// `InvalidConfig` if the text is not a valid list.
    pub fn from_json(text: &str) -> Result<Self> {
        let file: ListFile = serde_json::from_str(text)
            .map_err(|e| WorkforceErr::InvalidConfig(format!("bad worker list: {e}")))?;

        let mut config = Self::default();
        if let Some(ms) = file.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.tick_ms {
            if ms == 0 {
                return Err(WorkforceErr::InvalidConfig("tick_ms must be positive".into()));
            }
            config.tick_interval = Duration::from_millis(ms);
        }
        config.pipe_mux = file.pipe_mux.unwrap_or(config.pipe_mux);
        config.socket_mux = file.socket_mux.unwrap_or(config.socket_mux);

        config.workers = file
            .workers
            .into_iter()
            .filter_map(|entry| {
                let port = entry.port.unwrap_or(DEFAULT_PORT);
                let mut worker = resolve(&entry.host, port)?;
                worker.timeout = entry.timeout_ms.map(Duration::from_millis);
                Some(worker)
            })
            .collect();

        Ok(config)
    }

    /// Parses a plain worker list, skipping entries it cannot use.
    pub fn from_host_list(text: &str) -> Self {
        let mut workers = Vec::new();

        for (n, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let mut fields = line.split_whitespace();

            let Some(host) = fields.next() else {
                continue;
            };

            let port = match fields.next() {
                None => DEFAULT_PORT,
                Some(port) => match port.parse() {
                    Ok(port) => port,
                    Err(_) => {
                        warn!("line {}: bad port {port:?} for {host}, skipped", n + 1);
                        continue;
                    }
                },
            };

            if fields.next().is_some() {
                warn!("line {}: junk after the port of {host}", n + 1);
            }

            workers.extend(resolve(host, port));
        }

        Self {
            workers,
            ..Self::default()
        }
    }

    /// Returns the timeout applying to `entry`.
    pub fn timeout_of(&self, entry: &WorkerEntry) -> Duration {
        entry.timeout.unwrap_or(self.timeout)
    }
}

/// Finds the first location holding a worker list.
///
/// # Arguments
/// * `var` - Environment lookup, consulted for `FRACTAL_WORKERS` and `HOME`.
/// * `system` - The machine-wide list.
fn search<F>(var: F, system: &Path) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = var(WORKERS_VAR) {
        return Some(PathBuf::from(path));
    }

    let personal = var("HOME").map(|home| PathBuf::from(home).join(PERSONAL_LIST));
    personal
        .into_iter()
        .chain([system.to_path_buf()])
        .find(|path| path.is_file())
}

/// Resolves `host` to its first IPv4 address; the shared socket is IPv4.
fn resolve(host: &str, port: u16) -> Option<WorkerEntry> {
    let addrs: Vec<_> = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs.collect(),
        Err(e) => {
            warn!("unknown host {host}: {e}");
            return None;
        }
    };

    let Some(addr) = addrs.iter().copied().find(SocketAddr::is_ipv4) else {
        if addrs.is_empty() {
            warn!("host {host} has no address");
        } else {
            warn!("host {host} has no IPv4 address, skipped");
        }
        return None;
    };

    Some(WorkerEntry {
        name: format!("{host}:{port}"),
        addr,
        timeout: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_list_with_comments_and_default_port() {
        let text = "\
# render farm
127.0.0.1            # default port
127.0.0.2 4000

   127.0.0.3 9000 extra
";
        let config = WorkforceConfig::from_host_list(text);
        let addrs: Vec<_> = config.workers.iter().map(|w| w.addr).collect();

        assert_eq!(
            addrs,
            [
                "127.0.0.1:9359".parse().unwrap(),
                "127.0.0.2:4000".parse().unwrap(),
                "127.0.0.3:9000".parse::<SocketAddr>().unwrap(),
            ]
        );
        assert_eq!(config.workers[1].name, "127.0.0.2:4000");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn host_list_skips_bad_ports() {
        let config = WorkforceConfig::from_host_list("127.0.0.1 http\n127.0.0.1 70000\n127.0.0.1 80\n");

        assert_eq!(config.workers.len(), 1);
        assert_eq!(config.workers[0].addr, "127.0.0.1:80".parse().unwrap());
    }

    #[test]
    fn skips_hosts_without_an_ipv4_address() {
        let config = WorkforceConfig::from_host_list("::1 9359\nfe80::1 80\n127.0.0.1\n");
        assert_eq!(config.workers.len(), 1);
        assert!(config.bind.is_ipv4());
        assert!(config.workers.iter().all(|w| w.addr.is_ipv4()));

        let json = WorkforceConfig::from_json(r#"{"workers": [{"host": "::1"}]}"#).unwrap();
        assert!(json.workers.is_empty());

        // Names resolving to both families keep the IPv4 one.
        let named = WorkforceConfig::from_host_list("localhost 9359\n");
        assert!(named.workers.iter().all(|w| w.addr.is_ipv4()));
    }

    #[test]
    fn json_selects_strategies() {
        let text = r#"{
            "tick_ms": 250,
            "pipe_mux": "poll",
            "socket_mux": "simple",
            "workers": []
        }"#;

        let config = WorkforceConfig::from_json(text).unwrap();

        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.pipe_mux, MuxKind::Poll);
        assert_eq!(config.socket_mux, MuxKind::Simple);

        let defaults = WorkforceConfig::from_json(r#"{"workers": []}"#).unwrap();
        assert_eq!(defaults.tick_interval, DEFAULT_TICK);
        assert_eq!(defaults.pipe_mux, MuxKind::Simple);
        assert_eq!(defaults.socket_mux, MuxKind::Poll);

        assert!(WorkforceConfig::from_json(r#"{"socket_mux": "select", "workers": []}"#).is_err());
        assert!(WorkforceConfig::from_json(r#"{"tick_ms": 0, "workers": []}"#).is_err());
    }

    #[test]
    fn searches_env_then_home_then_system() {
        let dir = env::temp_dir().join(format!("workforce-search-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let system = dir.join("system-workers");
        let listed = dir.join("listed");
        let home = dir.join("home");
        fs::create_dir_all(&home).unwrap();

        let var = |env: Option<&Path>, home: &Path| {
            let env = env.map(|p| p.display().to_string());
            let home = home.display().to_string();
            move |name: &str| match name {
                WORKERS_VAR => env.clone(),
                "HOME" => Some(home.clone()),
                _ => None,
            }
        };

        assert_eq!(search(var(None, &home), &system), None);

        fs::write(&system, "127.0.0.1\n").unwrap();
        assert_eq!(search(var(None, &home), &system), Some(system.clone()));

        fs::write(home.join(PERSONAL_LIST), "127.0.0.1\n").unwrap();
        assert_eq!(
            search(var(None, &home), &system),
            Some(home.join(PERSONAL_LIST))
        );

        assert_eq!(
            search(var(Some(&listed), &home), &system),
            Some(listed.clone())
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn json_list_with_timeouts() {
        let text = r#"{
            "timeout_ms": 2000,
            "workers": [
                { "host": "127.0.0.1" },
                { "host": "127.0.0.1", "port": 9400, "timeout_ms": 500 }
            ]
        }"#;

        let config = WorkforceConfig::from_json(text).unwrap();

        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.workers.len(), 2);
        assert_eq!(config.workers[0].addr.port(), 9359);
        assert_eq!(
            config.timeout_of(&config.workers[0]),
            Duration::from_secs(2)
        );
        assert_eq!(
            config.timeout_of(&config.workers[1]),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn json_rejects_garbage() {
        assert!(matches!(
            WorkforceConfig::from_json(r#"{"workers": [{"hots": "x"}]}"#),
            Err(WorkforceErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn loads_by_extension() {
        let dir = env::temp_dir().join(format!("workforce-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let json = dir.join("workers.json");
        fs::write(&json, r#"{"workers": [{"host": "127.0.0.1", "port": 1}]}"#).unwrap();
        let plain = dir.join("workers");
        fs::write(&plain, "127.0.0.1 2\n").unwrap();

        assert_eq!(
            WorkforceConfig::load(Some(&json)).unwrap().workers[0].addr.port(),
            1
        );
        assert_eq!(
            WorkforceConfig::load(Some(&plain)).unwrap().workers[0].addr.port(),
            2
        );
        assert!(WorkforceConfig::load(Some(&dir.join("missing"))).is_err());

        fs::remove_dir_all(&dir).unwrap();
    }
}
