use std::time::Duration;

use comms::{msg::DEFAULT_PORT, mux::DEFAULT_TICK};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_IDLE_SECS: u64 = 60;

/// Where the worker takes its requests from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listen {
    /// A UDP socket bound to `host:port`.
    Udp(String),
    /// Length-delimited frames on stdin, answers on stdout.
    Pipe,
}

/// Immutable execution bounds for a worker instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub listen: Listen,
    /// Exit after this long without a request, `None` never exits.
    pub idle_timeout: Option<Duration>,
    /// How often the idle check runs.
    pub tick: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listen: Listen::Udp(format!("{DEFAULT_HOST}:{DEFAULT_PORT}")),
            idle_timeout: Some(Duration::from_secs(DEFAULT_IDLE_SECS)),
            tick: DEFAULT_TICK,
        }
    }
}

impl WorkerConfig {
    /// Builds the configuration from command line arguments and environment.
    ///
    /// # Arguments
    /// * `args` - The arguments, without the program name.
    /// * `var` - Environment lookup, consulted for `HOST` and `PORT`.
    ///
    /// # Returns
    /// The configuration or a message describing the offending argument.
    pub fn parse<I, F>(args: I, var: F) -> Result<Self, String>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let mut pipe = false;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--pipe" => pipe = true,
                "--idle-timeout" => {
                    let value = args
                        .next()
                        .ok_or("--idle-timeout expects a number of seconds")?;
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| format!("invalid idle timeout {value:?}"))?;
                    config.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
                }
                other => return Err(format!("unknown argument {other:?}")),
            }
        }

        if pipe {
            config.listen = Listen::Pipe;
        } else {
            let host = var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = match var("PORT") {
                Some(port) => port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid PORT {port:?}"))?,
                None => DEFAULT_PORT,
            };
            config.listen = Listen::Udp(format!("{host}:{port}"));
        }

        Ok(config)
    }
}
