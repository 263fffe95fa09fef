//! `cnotes` - CLI for companynotes
//!
//! This binary runs the HTTP API and exposes the note store from the
//! command line.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use companynotes::cli::{Cli, Command, CompaniesCommand, ConfigCommand, NotesCommand, ServeCommand};
use companynotes::model::{Company, CreateNote, Note, UpdateNote};
use companynotes::server::{self, AppState};
use companynotes::store::{NoteStore, ResolvedBackend};
use companynotes::{init_logging, Config};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        // Not loaded up front so `config validate` can report a broken file.
        Command::Config(config_cmd) => handle_config(cli.config, config_cmd),
        Command::Serve(serve_cmd) => handle_serve(load_config(cli.config)?, serve_cmd).await,
        Command::Companies(companies_cmd) => {
            let store = open_store(&load_config(cli.config)?).await?;
            handle_companies(&store, &companies_cmd).await
        }
        Command::Notes(notes_cmd) => {
            let store = open_store(&load_config(cli.config)?).await?;
            handle_notes(&store, notes_cmd).await
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(path).context("loading configuration")
}

async fn open_store(config: &Config) -> anyhow::Result<NoteStore> {
    let backend = ResolvedBackend::resolve(config)
        .await
        .context("selecting note backend")?;
    Ok(NoteStore::new(backend))
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }

    let store = open_store(&config).await?;
    tracing::info!("Notes backend: {}", store.backend_name());

    let state = AppState::from_config(&config, store)?;
    let app = server::router(state, &config.server);
    let running = server::start_server(&config.bind_address(), app).await?;
    println!("Listening on http://{}", running.local_addr());

    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;
    running.shutdown().await;
    Ok(())
}

async fn handle_companies(store: &NoteStore, cmd: &CompaniesCommand) -> anyhow::Result<()> {
    let companies = store.list_companies().await?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&companies)?);
        return Ok(());
    }

    if companies.is_empty() {
        println!("No companies.");
    }
    for company in &companies {
        print_company(company);
    }
    Ok(())
}

fn print_company(company: &Company) {
    println!(
        "{:>5}  {:<30}  {:<20}  {:>7}  {}",
        company.id, company.name, company.sector, company.employees, company.website
    );
}

fn print_note(note: &Note) {
    println!(
        "{}  {:<7}  {:<12}  {}  {}",
        note.id,
        if note.is_private { "private" } else { "public" },
        note.user_id.as_deref().unwrap_or("-"),
        note.created_at.format("%Y-%m-%d %H:%M"),
        note.content
    );
}

async fn handle_notes(store: &NoteStore, cmd: NotesCommand) -> anyhow::Result<()> {
    match cmd {
        NotesCommand::List {
            company,
            as_user,
            json,
        } => {
            let notes = store
                .list_notes_for_company(company, as_user.as_deref())
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&notes)?);
            } else if notes.is_empty() {
                println!("No notes for company {company}.");
            } else {
                notes.iter().for_each(print_note);
            }
        }
        NotesCommand::Create {
            company,
            content,
            private,
            as_user,
        } => {
            let note = store
                .create_note(
                    CreateNote {
                        company_id: company,
                        content,
                        is_private: Some(private),
                    },
                    Some(&as_user),
                )
                .await?;
            println!("Created note {}", note.id);
        }
        NotesCommand::Update {
            id,
            content,
            private,
            as_user,
        } => {
            let note = store
                .update_note(
                    &id,
                    UpdateNote {
                        content,
                        is_private: private,
                    },
                    Some(&as_user),
                )
                .await?;
            print_note(&note);
        }
        NotesCommand::Delete { id, as_user } => {
            store.delete_note(&id, Some(&as_user)).await?;
            println!("Deleted note {id}");
        }
    }
    Ok(())
}

fn handle_config(path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = Config::load_from(path)?.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", config.to_toml()?);
            }
        }
        ConfigCommand::Path => {
            println!("{}", path.unwrap_or_else(Config::default_config_path).display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.or(path).unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => anyhow::bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
