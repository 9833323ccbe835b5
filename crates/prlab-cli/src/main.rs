//! prlab CLI - review pull requests from the command line.

mod manager;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use prlab_core::config::Config;
use prlab_core::{
    CommentReply, CommentRequest, Error, NewComment, PrFilter, PullRequestsManager, Result,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use crate::manager::build_manager;

#[derive(Parser)]
#[command(name = "prlab")]
#[command(author, version, about = "prlab - review GitHub and GitLab pull requests", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this configuration file instead of the default one
    #[arg(long = "config", global = true)]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read or write the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show the user owning the access token
    User,

    /// List open pull requests of the current user
    Prs {
        /// created or assigned
        #[arg(short, long, default_value = "created")]
        filter: String,
    },

    /// List the files changed by a pull request
    Files {
        /// Pull request API URL
        pr_id: String,
    },

    /// Show base and head content of a file
    Diff {
        /// Pull request API URL
        pr_id: String,
        filename: String,
    },

    /// List comment threads of a pull request or one of its files
    Threads {
        /// Pull request API URL
        pr_id: String,
        #[arg(long)]
        filename: Option<String>,
    },

    /// Comment on a pull request, a file line or an existing thread
    Comment {
        /// Pull request API URL
        pr_id: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        filename: Option<String>,
        /// Line in the head version
        #[arg(long)]
        line: Option<u32>,
        /// Line in the base version
        #[arg(long)]
        original_line: Option<u32>,
        /// Thread or comment to answer
        #[arg(long)]
        reply_to: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set a configuration value
    Set { key: String, value: String },

    /// Get a configuration value
    Get { key: String },

    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr, stdout is for JSON results
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            println!("{}", serde_json::to_string_pretty(&error_body(&e))?);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<Value> {
    let config_path = match cli.config_path {
        Some(path) => path,
        None => Config::config_path()?,
    };

    let manager = || -> Result<Box<dyn PullRequestsManager>> {
        build_manager(&Config::load_from(&config_path)?)
    };

    let value = match cli.command {
        Commands::Config { command } => run_config(command, &config_path)?,
        Commands::User => to_json(manager()?.get_current_user().await?),
        Commands::Prs { filter } => {
            let filter: PrFilter = filter.parse()?;
            let manager = manager()?;
            let user = manager.get_current_user().await?;
            to_json(manager.list_pull_requests(&user.username, filter).await?)
        }
        Commands::Files { pr_id } => to_json(manager()?.list_files(&pr_id).await?),
        Commands::Diff { pr_id, filename } => {
            to_json(manager()?.get_file_diff(&pr_id, &filename).await?)
        }
        Commands::Threads { pr_id, filename } => {
            to_json(manager()?.get_threads(&pr_id, filename.as_deref()).await?)
        }
        Commands::Comment {
            pr_id,
            text,
            filename,
            line,
            original_line,
            reply_to,
        } => {
            let request = comment_request(text, filename, line, original_line, reply_to);
            to_json(manager()?.post_comment(&pr_id, request).await?)
        }
    };

    Ok(value)
}

fn run_config(command: ConfigCommands, path: &Path) -> Result<Value> {
    let mut config = Config::load_from(path)?;
    match command {
        ConfigCommands::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(path)?;
            let value = config.get(&key)?;
            Ok(entry(key, value))
        }
        ConfigCommands::Get { key } => {
            let value = config.get(&key)?;
            Ok(entry(key, value))
        }
        ConfigCommands::Show => {
            let mut shown = config.clone();
            if shown.access_token.is_some() {
                shown.access_token = Some("<hidden>".to_string());
            }
            shown.api_base_url = Some(config.effective_base_url());
            Ok(to_json(shown))
        }
    }
}

fn comment_request(
    text: String,
    filename: Option<String>,
    line: Option<u32>,
    original_line: Option<u32>,
    reply_to: Option<String>,
) -> CommentRequest {
    match reply_to {
        Some(in_reply_to) => CommentReply {
            text,
            filename,
            in_reply_to,
        }
        .into(),
        None => NewComment {
            text,
            filename,
            line,
            original_line,
        }
        .into(),
    }
}

fn entry(key: String, value: Option<String>) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(key, value.map(Value::String).unwrap_or(Value::Null));
    Value::Object(map)
}

fn to_json(value: impl serde::Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Body printed for a failed command.
fn error_body(error: &Error) -> Value {
    let message = match error {
        Error::RemoteRejected { message, .. } => message.clone(),
        other => other.to_string(),
    };
    json!({
        "error": message,
        "status": error.status_code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_comment_request_variant() {
        let request = comment_request("hi".to_string(), Some("a.py".to_string()), Some(3), None, None);
        assert!(matches!(request, CommentRequest::New(ref c) if c.line == Some(3)));

        let request = comment_request(
            "hi".to_string(),
            Some("a.py".to_string()),
            Some(3),
            None,
            Some("d1".to_string()),
        );
        assert!(matches!(request, CommentRequest::Reply(ref r) if r.in_reply_to == "d1"));
    }

    #[test]
    fn test_error_body() {
        let body = error_body(&Error::from_status(404, "https://x", "Not Found"));
        assert_eq!(body, json!({"error": "Not Found", "status": 404}));

        let err: Error = "mine".parse::<PrFilter>().unwrap_err();
        let body = error_body(&err);
        assert_eq!(body["status"], 400);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Expected value 'created' or 'assigned', received 'mine'"));
    }

    #[test]
    fn test_config_commands() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prlab").join("config.toml");

        let value = run_config(
            ConfigCommands::Set {
                key: "provider".to_string(),
                value: "gitlab".to_string(),
            },
            &path,
        )
        .unwrap();
        assert_eq!(value, json!({"provider": "gitlab"}));

        run_config(
            ConfigCommands::Set {
                key: "token".to_string(),
                value: "glpat-secret".to_string(),
            },
            &path,
        )
        .unwrap();

        let shown = run_config(ConfigCommands::Show, &path).unwrap();
        assert_eq!(shown["provider"], "gitlab");
        assert_eq!(shown["access_token"], "<hidden>");
        assert_eq!(shown["api_base_url"], "https://gitlab.com/api/v4/");

        let value = run_config(ConfigCommands::Get { key: "owner".to_string() }, &path).unwrap();
        assert_eq!(value, json!({"owner": null}));

        assert!(run_config(ConfigCommands::Get { key: "nope".to_string() }, &path).is_err());
    }

    #[tokio::test]
    async fn test_missing_token_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = \"gitlab\"\napi_base_url = \"http://127.0.0.1:1/api/v4\"\n")
            .unwrap();

        std::env::remove_var(prlab_core::config::TOKEN_ENV_VAR);
        let cli = Cli::parse_from([
            "prlab",
            "--config",
            path.to_str().unwrap(),
            "files",
            "http://127.0.0.1:1/api/v4/projects/1/merge_requests/1",
        ]);
        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
        assert_eq!(error_body(&err)["status"], 400);
    }
}
