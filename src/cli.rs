use crate::engine::{
    build_http_client, ContentProvider, Enricher, HttpContentProvider, HttpPersistence,
    NameGenerator,
};
use crate::model::{ActionPolicy, Cardinality, ClientConfig, ServerConfig, ViewEvent};
use crate::orchestrator::{Page, Services, UiCommand, ViewCoordinator};
use crate::session::{Session, TokenAuthProvider};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "pet-namer",
    version,
    about = "AI pet-name suggestions with per-user saved lists"
)]
pub struct Cli {
    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the saved-names API
    Serve(ServeArgs),
    /// Generate suggestions, pick some, and save them
    Suggest(SuggestArgs),
}

#[derive(Debug, Args, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Accepted bearer token as TOKEN=USER_UUID (repeatable)
    #[arg(long = "token", value_parser = parse_token_pair)]
    pub tokens: Vec<(String, Uuid)>,

    /// JSON file holding saved names (defaults to the user data directory)
    #[arg(long)]
    pub store: Option<std::path::PathBuf>,

    /// Keep saved names in memory only
    #[arg(long, conflicts_with = "store")]
    pub memory: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SuggestArgs {
    /// Base URL of the saved-names API
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub api_base_url: String,

    /// Endpoint of the content-generation service
    #[arg(long, default_value = "http://127.0.0.1:3001/api/events")]
    pub content_url: String,

    /// Bearer token of the signed-in user
    #[arg(long, env = "PET_NAMER_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Id of the signed-in user
    #[arg(long, env = "PET_NAMER_USER_ID")]
    pub user_id: Option<Uuid>,

    /// Kind of pet
    #[arg(long, default_value = "Dog")]
    pub species: String,

    /// Personality traits to steer the suggestions
    #[arg(long, default_value = "")]
    pub traits: String,

    /// Ask for ten suggestions instead of five
    #[arg(long)]
    pub ten: bool,

    /// Suggestion to select (repeatable)
    #[arg(long)]
    pub pick: Vec<String>,

    /// Use --save true or --save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub save: bool,

    /// Save picks one request at a time instead of as one batch
    #[arg(long)]
    pub save_each: bool,

    /// Generate an image of the first pick
    #[arg(long)]
    pub image: bool,

    /// Generate speech for the first pick
    #[arg(long)]
    pub speech: bool,

    /// Generate a short story about the first pick
    #[arg(long)]
    pub narrative: bool,

    /// Whether enrichment requests may overlap
    #[arg(long, value_enum, default_value_t = ActionPolicy::Exclusive)]
    pub policy: ActionPolicy,

    /// Transport timeout per request
    #[arg(long, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Print a JSON report instead of text
    #[arg(long)]
    pub json: bool,
}

fn parse_token_pair(s: &str) -> Result<(String, Uuid), String> {
    let (token, user) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TOKEN=USER_UUID, got `{s}`"))?;
    if token.is_empty() {
        return Err("token must not be empty".into());
    }
    let user = Uuid::parse_str(user).map_err(|e| format!("bad user id `{user}`: {e}"))?;
    Ok((token.to_string(), user))
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_client_config(args: &SuggestArgs) -> ClientConfig {
    ClientConfig {
        api_base_url: args.api_base_url.clone(),
        content_url: args.content_url.clone(),
        cardinality: if args.ten {
            Cardinality::Ten
        } else {
            Cardinality::Five
        },
        action_policy: args.policy,
        request_timeout: Duration::from(args.request_timeout),
        user_agent: format!("pet-namer/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Build a `ServerConfig` from CLI arguments.
pub fn build_server_config(args: &ServeArgs) -> ServerConfig {
    ServerConfig {
        bind: args.bind,
        tokens: args.tokens.clone(),
        store_path: if args.memory {
            None
        } else {
            args.store
                .clone()
                .or_else(crate::server::store::default_store_path)
        },
    }
}

pub async fn run(args: Cli) -> Result<()> {
    crate::logging::init(args.log.as_deref());
    match args.command {
        Command::Serve(a) => crate::server::serve(build_server_config(&a)).await,
        Command::Suggest(a) => run_suggest(a).await,
    }
}

fn build_services(cfg: &ClientConfig) -> Result<Services> {
    let http = build_http_client(cfg)?;
    let content: Arc<dyn ContentProvider> =
        Arc::new(HttpContentProvider::new(http.clone(), cfg.content_url.clone()));
    Ok(Services {
        persistence: Arc::new(HttpPersistence::new(http, cfg.api_base_url.clone())),
        generator: Arc::new(NameGenerator::new(content.clone(), cfg.cardinality)),
        enricher: Arc::new(Enricher::new(content)),
    })
}

/// One headless session: generate, pick, enrich, save, report.
async fn run_suggest(args: SuggestArgs) -> Result<()> {
    let cfg = build_client_config(&args);
    let services = build_services(&cfg)?;
    let provider = Arc::new(match (args.user_id, args.access_token.clone()) {
        (Some(user_id), Some(access_token)) => TokenAuthProvider::with_session(Session {
            user_id,
            access_token,
        }),
        _ => TokenAuthProvider::new(),
    });

    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<ViewEvent>();
    let mut coord = ViewCoordinator::connect(provider, services, cfg.action_policy)
        .await
        .with_events(evt_tx);

    if coord.state().page != Page::Home {
        anyhow::bail!("not signed in: pass --access-token and --user-id");
    }

    let mut commands = vec![UiCommand::Generate {
        species: args.species.clone(),
        traits: args.traits.clone(),
    }];
    commands.extend(args.pick.iter().cloned().map(UiCommand::Toggle));
    // Enrichments key off the selection, so they run before the save clears it.
    if args.image {
        commands.push(UiCommand::GenerateImage);
    }
    if args.speech {
        commands.push(UiCommand::GenerateSpeech);
    }
    if args.narrative {
        commands.push(UiCommand::GenerateNarrative);
    }
    if args.save && args.save_each {
        commands.extend(args.pick.iter().cloned().map(UiCommand::SaveOne));
    } else if args.save {
        commands.push(UiCommand::SaveSelected);
    }

    coord.settle().await;
    for cmd in commands {
        let waits = !matches!(cmd, UiCommand::Toggle(_) | UiCommand::SaveOne(_));
        coord.handle_command(cmd).await;
        if waits {
            coord.settle().await;
        }
        while let Ok(ev) = evt_rx.try_recv() {
            let _ = out_tx.send(OutputLine::Stderr(
                crate::text_summary::describe_event(&ev),
            ));
        }
    }
    coord.settle().await;
    while let Ok(ev) = evt_rx.try_recv() {
        let _ = out_tx.send(OutputLine::Stderr(crate::text_summary::describe_event(
            &ev,
        )));
    }

    let state = coord.state().clone();
    if args.json {
        let report = crate::text_summary::build_json_report(&state);
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&report)?));
    } else {
        for line in crate::text_summary::build_text_summary(&state).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    coord.handle_command(UiCommand::Quit).await;

    drop(out_tx);
    out_handle.await.context("output writer failed")?;

    if let Some(kind) = state.error(crate::model::Action::Save) {
        anyhow::bail!("saving names failed ({kind:?})");
    }
    if let Some(kind) = state.error(crate::model::Action::Generate) {
        anyhow::bail!("generation failed ({kind:?})");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_pairs_parse() {
        let (t, u) = parse_token_pair("abc=6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11").unwrap();
        assert_eq!(t, "abc");
        assert_eq!(u.to_string(), "6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11");
        assert!(parse_token_pair("abc").is_err());
        assert!(parse_token_pair("=6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11").is_err());
        assert!(parse_token_pair("abc=not-a-uuid").is_err());
    }

    #[test]
    fn suggest_defaults() {
        let cli = Cli::try_parse_from(["pet-namer", "suggest", "--pick", "Rex", "--ten"]).unwrap();
        let Command::Suggest(a) = cli.command else {
            panic!("expected suggest");
        };
        let cfg = build_client_config(&a);
        assert_eq!(cfg.cardinality, Cardinality::Ten);
        assert_eq!(cfg.action_policy, ActionPolicy::Exclusive);
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(a.save);
        assert_eq!(a.pick, vec!["Rex"]);
    }

    #[test]
    fn memory_flag_disables_store_file() {
        let cli = Cli::try_parse_from([
            "pet-namer",
            "serve",
            "--memory",
            "--token",
            "t=6f1b7c1e-8d9a-4b0e-9c39-1f5a2a6c1d11",
        ])
        .unwrap();
        let Command::Serve(a) = cli.command else {
            panic!("expected serve");
        };
        let cfg = build_server_config(&a);
        assert!(cfg.store_path.is_none());
        assert_eq!(cfg.tokens.len(), 1);
    }
}
