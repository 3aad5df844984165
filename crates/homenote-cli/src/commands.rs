//! Subcommand execution

use crate::config::AppConfig;
use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use homenote_client::{ApiClient, AuthProvider};
use homenote_core::{
    Homenote, HomeNoteDraft, Notice, NoticeLevel, Notifier, PropertySearch, UploadFile,
};
use homenote_session::{FileStorage, KeyValueStorage, SystemClock, TokenStore};
use homenote_sse::{ConnectionState, SseConnection, SseExit};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Prints notices to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("[{}] {}", notice.level, notice.message);
    }
}

/// Resolve configuration: file, then environment, then flags
pub fn resolve_config(matches: &ArgMatches) -> Result<AppConfig> {
    let path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(crate::cli::DEFAULT_CONFIG_FILE));

    let mut config = AppConfig::load_from(&path)?.with_env();
    if let Some(url) = matches.get_one::<String>("api-url") {
        config = config.with_api_url(url.clone());
    }
    if let Some(dir) = matches.get_one::<PathBuf>("state-dir") {
        config = config.with_state_dir(dir.clone());
    }
    Ok(config)
}

/// Build the service facade over the on-disk session
pub fn connect(config: &AppConfig) -> Result<Homenote> {
    let session_path = config.session_path();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(
        FileStorage::open(&session_path)
            .with_context(|| format!("opening session at {}", session_path.display()))?,
    );
    let tokens = TokenStore::new(storage.clone(), Arc::new(SystemClock));
    let client = ApiClient::with_reqwest(config.client_config(), tokens)?;

    Ok(Homenote::new(client, storage, Arc::new(ConsoleNotifier)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn id(args: &ArgMatches, name: &str) -> Result<u64> {
    args.get_one::<u64>(name)
        .copied()
        .with_context(|| format!("missing <{name}>"))
}

/// Run the parsed command line
pub async fn run(matches: &ArgMatches) -> Result<()> {
    let config = resolve_config(matches)?;
    tracing::debug!("Using API at {}", config.api_url);
    let app = connect(&config)?;

    match matches.subcommand() {
        Some(("login", args)) => {
            let provider = args
                .get_one::<AuthProvider>("provider")
                .copied()
                .context("missing --provider")?;
            let code = args.get_one::<String>("code").context("missing --code")?;
            let redirect = args
                .get_one::<String>("redirect-uri")
                .context("missing --redirect-uri")?;

            let outcome = app.client.login(provider, code, redirect).await?;
            if outcome.is_new_member {
                println!("Signed in. Finish onboarding with `homenote nickname` and `homenote lifestyles --select`.");
            } else {
                println!("Signed in.");
            }
        }
        Some(("logout", _)) => {
            app.client.logout().await;
            println!("Signed out.");
        }
        Some(("me", _)) => print_json(&app.members.me().await?)?,
        Some(("nickname", args)) => {
            let name = args.get_one::<String>("name").context("missing <name>")?;
            print_json(&app.members.update_nickname(name).await?)?;
        }
        Some(("lifestyles", args)) => match args.get_many::<u64>("select") {
            Some(ids) => {
                let ids: Vec<u64> = ids.copied().collect();
                app.members.save_lifestyles(&ids).await?;
                println!("Saved {} lifestyles.", ids.len());
            }
            None => print_json(&app.members.lifestyles().await?)?,
        },
        Some(("listings", args)) => run_listings(&app, args).await?,
        Some(("recent", args)) => {
            let searches = app.listings.recent_searches();
            if args.get_flag("clear") {
                searches.clear();
            } else if let Some(keyword) = args.get_one::<String>("remove") {
                searches.remove(keyword);
            }
            print_json(&searches.list())?;
        }
        Some(("contracts", args)) => run_contracts(&app, &config, args).await?,
        Some(("notes", args)) => run_notes(&app, args).await?,
        Some(("listen", _)) => listen(&app, &config).await?,
        Some((other, _)) => bail!("unknown command: {other}"),
        None => bail!("no command given"),
    }
    Ok(())
}

async fn run_listings(app: &Homenote, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("search", args)) => {
            let mut search = PropertySearch::new()
                .with_page(args.get_one::<u32>("page").copied().unwrap_or(0))
                .with_size(
                    args.get_one::<u32>("size")
                        .copied()
                        .unwrap_or(PropertySearch::DEFAULT_SIZE),
                );
            if let Some(keyword) = args.get_one::<String>("keyword") {
                search = search.with_keyword(keyword.clone());
            }
            print_json(&app.listings.search(&search).await?)?;
        }
        Some(("show", args)) => print_json(&app.listings.get(id(args, "id")?).await?)?,
        Some(("bookmark", args)) => {
            let post = id(args, "id")?;
            // Load current state so the toggle flips the server value
            app.listings.get(post).await?;
            let favorite = app.listings.toggle_favorite(post).await?;
            println!(
                "Listing {post} {}.",
                if favorite { "bookmarked" } else { "unbookmarked" }
            );
        }
        Some((other, _)) => bail!("unknown listings command: {other}"),
        None => bail!("no listings command given"),
    }
    Ok(())
}

async fn run_contracts(app: &Homenote, config: &AppConfig, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("submit", args)) => {
            let mut files = Vec::new();
            for path in args.get_many::<PathBuf>("files").into_iter().flatten() {
                files.push(UploadFile::read(path).await?);
            }

            let events = args
                .get_flag("wait")
                .then(|| app.connect_events(config.sse_config()));
            let mut states = app.analysis.subscribe();

            let contract = app.contracts.submit(&files).await?;
            print_json(&contract)?;

            if let Some(events) = events {
                eprintln!("Waiting for analysis of contract {}...", contract.id);
                let mut connection = events.state_changes();
                let waited = tokio::select! {
                    state = states.wait_for(|state| {
                        state.easy_contract_id == Some(contract.id)
                            && state.status.is_some_and(|s| s.is_terminal())
                    }) => state.ok().map(|state| state.clone()),
                    _ = connection.wait_for(|s| *s == ConnectionState::Closed) => None,
                };
                let exit = events.close().await;
                tracing::debug!("Event stream finished: {:?}", exit);

                let state = waited.context("event stream closed before a result arrived")?;
                if let Some(error) = &state.error {
                    eprintln!("[{}] {}", NoticeLevel::Error, error);
                }
                print_json(&app.contracts.get(contract.id).await?)?;
            }
        }
        Some(("list", _)) => print_json(&app.contracts.list().await?)?,
        Some(("show", args)) => print_json(&app.contracts.get(id(args, "id")?).await?)?,
        Some(("delete", args)) => {
            let contract = id(args, "id")?;
            app.contracts.delete(contract).await?;
            println!("Deleted contract {contract}.");
        }
        Some((other, _)) => bail!("unknown contracts command: {other}"),
        None => bail!("no contracts command given"),
    }
    Ok(())
}

async fn run_notes(app: &Homenote, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", _)) => print_json(&app.notes.list().await?)?,
        Some(("show", args)) => print_json(&app.notes.get(id(args, "id")?).await?)?,
        Some(("create", args)) => {
            let draft = HomeNoteDraft {
                title: args.get_one::<String>("title").cloned().unwrap_or_default(),
                address: args.get_one::<String>("address").cloned(),
                memo: args.get_one::<String>("memo").cloned(),
            };
            print_json(&app.notes.create(&draft).await?)?;
        }
        Some(("check", args)) => {
            let note = id(args, "id")?;
            let item = id(args, "item")?;
            app.notes.get(note).await?;
            let checked = app.notes.toggle_checklist_item(note, item).await?;
            println!(
                "Item {item} {}.",
                if checked { "checked" } else { "unchecked" }
            );
        }
        Some(("delete", args)) => {
            let note = id(args, "id")?;
            app.notes.delete(note).await?;
            println!("Deleted note {note}.");
        }
        Some((other, _)) => bail!("unknown notes command: {other}"),
        None => bail!("no notes command given"),
    }
    Ok(())
}

async fn listen(app: &Homenote, config: &AppConfig) -> Result<()> {
    let analysis = app.analysis.clone();
    let handle = SseConnection::spawn(app.client.clone(), config.sse_config(), move |event| {
        analysis.apply_event(&event);
        println!("{}\t{}", event.name, event.data);
    });

    let mut states = handle.state_changes();
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for ctrl-c")?;
            tracing::info!("Interrupted, closing event stream");
        }
        _ = states.wait_for(|s| *s == ConnectionState::Closed) => {}
    }

    match handle.close().await {
        SseExit::Cancelled => Ok(()),
        exit => bail!("event stream ended: {exit:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_cli;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homenote.toml");
        std::fs::write(&path, "api_url = \"http://file.test\"\nrequest_timeout_secs = 9\n").unwrap();

        let matches = build_cli()
            .try_get_matches_from([
                "homenote",
                "--config",
                path.to_str().unwrap(),
                "--api-url",
                "http://flag.test",
                "me",
            ])
            .unwrap();

        let config = resolve_config(&matches).unwrap();
        assert_eq!(config.api_url, "http://flag.test");
        assert_eq!(config.request_timeout_secs, 9);
    }

    #[test]
    fn connect_creates_nothing_until_written() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::default()
            .with_api_url("http://localhost:9")
            .with_state_dir(dir.path().join("state"));

        let app = connect(&config).unwrap();
        assert!(!app.client.is_authenticated());
        assert!(!config.session_path().exists());
    }
}
