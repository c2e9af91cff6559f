//! CLI argument definitions using clap

use clap::Parser;
use fifu_runtime::GatewayConfig;
use std::path::PathBuf;

/// FIFU - make resources of one network architecture reachable from others
#[derive(Parser, Debug)]
#[command(name = "fifu")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Resource list mapped at startup
    #[arg(short = 'r', long, env = "FIFU_RESOURCES")]
    pub resources: Option<PathBuf>,

    /// Directory of protocol plugin manifests
    #[arg(short = 'p', long, env = "FIFU_PROTOCOLS")]
    pub protocols: Option<PathBuf>,

    /// Directory of converter plugin manifests
    #[arg(short = 'c', long, env = "FIFU_CONVERTERS")]
    pub converters: Option<PathBuf>,

    /// Worker threads (0 = one per CPU)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Settings file (TOML, YAML or JSON); flags take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print the plugin kinds built into this binary and exit
    #[arg(long)]
    pub list_plugins: bool,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut GatewayConfig) {
        if let Some(resources) = &self.resources {
            config.resources = Some(resources.clone());
        }
        if let Some(protocols) = &self.protocols {
            config.protocols_dir = Some(protocols.clone());
        }
        if let Some(converters) = &self.converters {
            config.converters_dir = Some(converters.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
    }

    /// Log filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self, config: &GatewayConfig) -> String {
        match self.verbose {
            0 => config.log_level.clone().unwrap_or_else(|| "info".to_string()),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}
