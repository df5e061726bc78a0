//! CLI argument parsing and INI config-file loading (§6 CLI surface).
//!
//! Precedence: CLI flags > config file values > built-in defaults. Grounded
//! on the original `cli_utils.py`'s `parse_arguments`/`load_config_file`:
//! the config file is located first (via a bare `-c/--config` pre-parse),
//! then its values become the `clap` defaults for the full parse.

use std::collections::HashMap;
use std::path::PathBuf;

use clap::Parser;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_CLIENT_PORT: u16 = 8765;
const DEFAULT_UI_PORT: u16 = 4567;
const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Bare pre-parse for `-c/--config`, so its contents can seed the real
/// parser's defaults before `--host`/`--client-port`/etc. are resolved.
#[derive(Parser, Debug)]
#[command(disable_help_flag = true, disable_version_flag = true)]
struct ConfigOnly {
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "agentstep-server", about = "Debugger Server Command Line Interface")]
pub struct Args {
    #[arg(short = 'c', long = "config", help = "Path to a .conf file (INI-style). CLI flags take precedence over this file.")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long = "client-port", default_value_t = DEFAULT_CLIENT_PORT)]
    pub client_port: u16,

    #[arg(long = "ui-port", default_value_t = DEFAULT_UI_PORT)]
    pub ui_port: u16,

    #[arg(short = 'r', long = "runs", num_args = 0..)]
    pub runs: Vec<PathBuf>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,
}

#[derive(Debug, Default)]
struct ConfigDefaults {
    host: Option<String>,
    client_port: Option<u16>,
    ui_port: Option<u16>,
    runs: Option<Vec<String>>,
    model: Option<String>,
}

/// Splits a comma- and/or whitespace-separated run-file list.
fn parse_runs_value(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads `[debugger]` > `[server]` > `DEFAULT` section precedence per-key.
fn load_config_file(path: &std::path::Path) -> Result<ConfigDefaults, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let ini = ini::Ini::load_from_str(&text).map_err(|e| e.to_string())?;

    let lookup = |key: &str| -> Option<String> {
        for section in ["debugger", "server"] {
            if let Some(value) = ini.section(Some(section)).and_then(|s| s.get(key)) {
                return Some(value.to_string());
            }
        }
        ini.section(None::<String>).and_then(|s| s.get(key)).map(str::to_string)
    };

    Ok(ConfigDefaults {
        host: lookup("host"),
        client_port: lookup("client_port").and_then(|v| v.parse().ok()),
        ui_port: lookup("ui_port").and_then(|v| v.parse().ok()),
        runs: lookup("runs").map(|v| parse_runs_value(&v)),
        model: lookup("model"),
    })
}

/// Parses `std::env::args()`, applying config-file defaults where the
/// corresponding CLI flag was not explicitly given.
pub fn parse_args() -> Args {
    parse_from(std::env::args_os())
}

fn parse_from<I, T>(argv: I) -> Args
where
    I: IntoIterator<Item = T> + Clone,
    T: Into<std::ffi::OsString> + Clone,
{
    let config_only = ConfigOnly::parse_from(argv.clone());

    let defaults = match &config_only.config {
        Some(path) => match load_config_file(path) {
            Ok(d) => {
                tracing::info!(path = %path.display(), "loaded configuration");
                d
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to load config file");
                ConfigDefaults::default()
            }
        },
        None => ConfigDefaults::default(),
    };

    let mut overrides: HashMap<&str, String> = HashMap::new();
    if let Some(host) = &defaults.host {
        overrides.insert("--host", host.clone());
    }
    if let Some(port) = defaults.client_port {
        overrides.insert("--client-port", port.to_string());
    }
    if let Some(port) = defaults.ui_port {
        overrides.insert("--ui-port", port.to_string());
    }
    if let Some(model) = &defaults.model {
        overrides.insert("--model", model.clone());
    }

    // clap has no runtime-default hook, so re-derive defaults by
    // substituting into a synthetic argv built from the config values,
    // then letting explicit flags in the real argv override via a second
    // parse pass (clap itself applies "last flag wins").
    let mut synthetic: Vec<std::ffi::OsString> = vec!["agentstep-server".into()];
    for (flag, value) in &overrides {
        synthetic.push((*flag).into());
        synthetic.push(value.into());
    }
    if let Some(runs) = &defaults.runs {
        if !runs.is_empty() {
            synthetic.push("--runs".into());
            synthetic.extend(runs.iter().map(std::ffi::OsString::from));
        }
    }
    for arg in argv.into_iter().skip(1) {
        synthetic.push(arg.into());
    }

    Args::parse_from(synthetic)
}
