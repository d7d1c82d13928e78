//! Command-line entry point for the play reader engine.
//!
//! Parses arguments, loads `conf/config.toml`, initializes logging and runs
//! one subcommand against `folio-core`.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use folio_core::config::{AppConfig, load_config};
use folio_core::explain::{
    AnthropicClient, AnthropicSettings, ChatRole, DEFAULT_USER_TEXT, ExplainChatRegistry,
    OpenSessionArgs,
};
use folio_core::model::Ordinal;
use folio_core::navigation::{NavigationCommand, PlayStore};
use folio_core::source::source_for_root;
use folio_core::{bindings, transform};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Shakespeare play reader engine", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, global = true, env = "FOLIO_CONFIG_PATH", default_value = "conf/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the line-per-row CSV into the hierarchical plays.json artifact
    Convert {
        /// Source CSV (defaults to [data].csv_path)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Destination file; repeat for several (defaults to [data].output_paths)
        #[arg(long = "out")]
        outputs: Vec<PathBuf>,
    },

    /// Load the corpus and print plays, or the acts and scenes of one play
    Outline {
        /// Directory or http(s) URL holding data/plays.json
        #[arg(long)]
        asset_root: Option<String>,

        #[arg(long)]
        play: Option<String>,

        /// Print the navigation snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ask for an explanation of one line
    Explain {
        #[arg(long)]
        play: String,

        #[arg(long, allow_negative_numbers = true)]
        act: Ordinal,

        #[arg(long, allow_negative_numbers = true)]
        scene: Ordinal,

        /// Sentence number of the line within its act
        #[arg(long, allow_negative_numbers = true)]
        sentence: Ordinal,

        #[arg(long)]
        message: Option<String>,

        #[arg(long)]
        asset_root: Option<String>,

        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Write TypeScript bindings for the UI types
    ExportBindings {
        #[arg(long, default_value = "ui/src/generated")]
        out: PathBuf,
    },
}

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config);
    if std::env::var_os("RUST_LOG").is_none() {
        set_log_level(reload_handle, config.log_level.as_filter_str());
    }

    match cli.command {
        Commands::Convert { csv, outputs } => run_convert(&config, csv, outputs),
        Commands::Outline {
            asset_root,
            play,
            json,
        } => run_outline(&config, asset_root, play, json),
        Commands::Explain {
            play,
            act,
            scene,
            sentence,
            message,
            asset_root,
            api_key,
        } => run_explain(
            &config,
            ExplainTarget {
                play,
                act,
                scene,
                sentence,
            },
            message,
            asset_root,
            api_key,
        ),
        Commands::ExportBindings { out } => {
            let count = bindings::export_ts_bindings(&out)?;
            println!("exported {count} TS bindings to {}", out.display());
            Ok(())
        }
    }
}

fn run_convert(config: &AppConfig, csv: Option<PathBuf>, outputs: Vec<PathBuf>) -> Result<()> {
    let csv_path = csv.unwrap_or_else(|| PathBuf::from(&config.csv_path));
    let destinations = if outputs.is_empty() {
        config.output_paths.iter().map(PathBuf::from).collect()
    } else {
        outputs
    };
    info!(csv = %csv_path.display(), outputs = destinations.len(), "Converting corpus");

    let report = transform::convert(&csv_path, &destinations)?;
    info!(
        records = report.records_read,
        kept = report.rows_kept,
        dropped = report.dropped(),
        plays = report.plays,
        lines = report.lines,
        "Conversion finished"
    );
    if report.slug_collisions > 0 {
        warn!(count = report.slug_collisions, "Play ids were suffixed to stay unique");
    }
    Ok(())
}

fn load_store(config: &AppConfig, asset_root: Option<String>) -> Result<PlayStore> {
    let root = asset_root.unwrap_or_else(|| config.asset_root.clone());
    let source = source_for_root(&root);
    let mut store = PlayStore::new();
    store.init(source.as_ref());
    if let Some(message) = store.error() {
        return Err(anyhow!("{message}"));
    }
    Ok(store)
}

fn run_outline(
    config: &AppConfig,
    asset_root: Option<String>,
    play: Option<String>,
    json: bool,
) -> Result<()> {
    let mut store = load_store(config, asset_root)?;
    let requested = play.clone();
    if let Some(play_id) = play {
        store.apply_command(NavigationCommand::SelectPlay { play_id });
    }

    if json {
        let snapshot = serde_json::to_string_pretty(&store.snapshot())
            .context("failed to serialize snapshot")?;
        println!("{snapshot}");
        return Ok(());
    }

    let Some(play_id) = requested else {
        for play in store.plays() {
            println!("{:<36} {:<10} {}", play.id, play.genre, play.name);
        }
        return Ok(());
    };
    let current = store
        .current_play()
        .ok_or_else(|| anyhow!("Play not found: {play_id}"))?;
    println!("{} ({})", current.name, current.genre);
    for act in &current.acts {
        let scenes: Vec<String> = act
            .scenes
            .iter()
            .map(|scene| format!("{} [{} lines]", scene.number, scene.lines.len()))
            .collect();
        println!("  Act {}: {}", act.number, scenes.join(", "));
    }
    Ok(())
}

struct ExplainTarget {
    play: String,
    act: Ordinal,
    scene: Ordinal,
    sentence: Ordinal,
}

fn run_explain(
    config: &AppConfig,
    target: ExplainTarget,
    message: Option<String>,
    asset_root: Option<String>,
    api_key: Option<String>,
) -> Result<()> {
    let mut store = load_store(config, asset_root)?;
    store.apply_command(NavigationCommand::SelectPlay {
        play_id: target.play.clone(),
    });
    store.apply_command(NavigationCommand::SelectAct { act: target.act });
    store.apply_command(NavigationCommand::SelectScene {
        scene: target.scene,
    });

    let play = store
        .current_play()
        .ok_or_else(|| anyhow!("Play not found: {}", target.play))?;
    if store.selected_act_number() != Some(target.act)
        || store.selected_scene_number() != Some(target.scene)
    {
        return Err(anyhow!(
            "Act {} scene {} not found in {}",
            target.act,
            target.scene,
            play.name
        ));
    }
    let line = store
        .current_scene()
        .and_then(|scene| scene.lines.iter().find(|line| line.sentence == target.sentence))
        .ok_or_else(|| {
            anyhow!(
                "Line {} not found in act {} scene {}",
                target.sentence,
                target.act,
                target.scene
            )
        })?;

    let args = OpenSessionArgs {
        play_id: play.id.clone(),
        play_name: play.name.clone(),
        act: target.act,
        scene: target.scene,
        line_global_index: line.global_index,
        line_sentence: line.sentence,
        speaker: line.character.clone(),
        line_text: line.text.clone(),
        context: store.context_window(line.global_index, config.context_radius),
    };

    let mut registry = ExplainChatRegistry::new(Some(PathBuf::from(&config.cache_dir)));
    registry.set_api_key(api_key.as_deref().or(config.api_key.as_deref()).unwrap_or_default());
    let session_id = registry.open_session_at_line(args);
    let client = AnthropicClient::new(AnthropicSettings::from(config))?;
    let prompt = message.unwrap_or_else(|| DEFAULT_USER_TEXT.to_string());
    registry.send_message(&session_id, &prompt, &client);

    let session = registry
        .get_session(&session_id)
        .ok_or_else(|| anyhow!("Session {session_id} disappeared"))?;
    if let Some(message) = &session.error {
        return Err(anyhow!("{message}"));
    }
    let reply = session
        .messages
        .iter()
        .rev()
        .find(|message| message.role == ChatRole::Assistant)
        .ok_or_else(|| anyhow!("No explanation received"))?;
    println!("{}", reply.text);
    if !session.follow_ups.is_empty() {
        println!();
        for follow_up in &session.follow_ups {
            println!("  - {follow_up}");
        }
    }
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    }
}
