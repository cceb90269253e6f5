//! Command-line interface definitions for News Podcast.
//!
//! Secrets and connection settings come from flags or, more usually, the
//! environment. Pipeline tunables live in the optional YAML file passed with
//! `--config` (see [`crate::config`]).
//!
//! # Examples
//!
//! ```sh
//! # One pass, then exit; the exit code reflects the batch result
//! news_podcast run
//!
//! # HTTP trigger on $PORT for a scheduler
//! news_podcast --config podcast.yaml serve
//! ```

use crate::store::mysql::DbSettings;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to the pipeline YAML file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_PORT", default_value_t = 3306)]
    pub db_port: u16,

    #[arg(long, env = "DB_USER", default_value = "root")]
    pub db_user: String,

    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub db_password: String,

    #[arg(long, env = "DB_NAME", default_value = "news_db")]
    pub db_name: String,

    /// Generative-text API key; without it every script generation fails
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Speech API key; without it every turn fails to synthesize
    #[arg(long, env = "GOOGLE_TTS_API_KEY", hide_env_values = true)]
    pub google_tts_api_key: Option<String>,

    /// Root directory artifacts are stored under; uploads fail when unset
    #[arg(long, env = "PODCAST_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// KakaoTalk access token for operator alerts (optional)
    #[arg(long, env = "KAKAO_ACCESS_TOKEN", hide_env_values = true)]
    pub kakao_access_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bootstrap the schema, run one pass and exit
    Run,
    /// Serve the HTTP trigger endpoint
    Serve {
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,
    },
}

impl Cli {
    pub fn db_settings(&self) -> DbSettings {
        DbSettings {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_defaults() {
        let cli = Cli::parse_from(["news_podcast", "run"]);
        assert_eq!(cli.command, Command::Run);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_serve_with_flags() {
        let cli = Cli::parse_from([
            "news_podcast",
            "--db-host",
            "db.internal",
            "--db-name",
            "podcast",
            "--storage-dir",
            "/srv/share",
            "serve",
            "--port",
            "8080",
            "-c",
            "podcast.yaml",
        ]);
        assert_eq!(cli.command, Command::Serve { port: 8080 });
        assert_eq!(cli.config.as_deref(), Some("podcast.yaml"));
        let db = cli.db_settings();
        assert_eq!(db.host, "db.internal");
        assert_eq!(db.database, "podcast");
        assert_eq!(cli.storage_dir, Some(PathBuf::from("/srv/share")));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["news_podcast"]).is_err());
    }
}
