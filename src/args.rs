use std::path::PathBuf;

use clap::Parser;

use clio::{config::ConfigManager, FileLoggerConfig};

#[derive(Parser)]
#[command(version)]
#[command(about = "Prints one of each clio message kind.", long_about = None)]
pub struct DemoArgs {
    #[arg(
        long,
        default_value = "debug",
        help = "Minimum level to print. Unknown names keep the level from CLIO_LOG or CF_LOG."
    )]
    pub level: String,

    #[arg(long, help = "Never write ANSI color codes.")]
    pub no_color: bool,

    #[arg(long, help = "Prefix every line with the local time.")]
    pub timestamps: bool,

    #[arg(
        long,
        value_name = "PATH",
        conflicts_with = "file_logging",
        help = "Mirror records as JSON lines to PATH."
    )]
    pub log_file: Option<PathBuf>,

    #[arg(long, help = "Mirror records as JSON lines to the default log file.")]
    pub file_logging: bool,

    #[arg(long, help = "Rotate the log file after this many megabytes.")]
    pub max_size_mb: Option<u64>,

    #[arg(long, help = "Gzip rotated log files.")]
    pub compress: bool,
}

impl DemoArgs {
    pub fn file_config<C>(&self, config: &C) -> eyre::Result<Option<FileLoggerConfig>>
    where
        C: ConfigManager,
    {
        let path = match (&self.log_file, self.file_logging) {
            (Some(path), _) => path.clone(),
            (None, true) => PathBuf::from(config.get_log_path()?),
            (None, false) => return Ok(None),
        };

        let file_config = FileLoggerConfig::new(path)
            .with_max_size_mb(self.max_size_mb.unwrap_or_default())
            .with_compress(self.compress);

        Ok(Some(file_config))
    }
}
