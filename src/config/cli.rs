use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "lc-classify")]
#[command(about = "Classify light curves with a remote classification service")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "lc-classify.toml")]
    pub config: String,

    /// CSV file of observations (object_id,jd,magpsf,sigmapsf,magzpsci,fid,ra,dec)
    #[arg(short, long)]
    pub input: String,

    /// Override the service address from the configuration
    #[arg(long)]
    pub address: Option<String>,

    /// Run parameters as a JSON object, passed to every light curve
    #[arg(long)]
    pub run_config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}
