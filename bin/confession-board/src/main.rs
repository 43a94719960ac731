//! # Confession Board Binary
//!
//! The entry point that assembles the session from configuration and runs a
//! single command against it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cb_config::Settings;
use cb_core::{Polarity, VotableEntity};
use cb_services::{Attachment, ConfessionDraft, FeedSort, Session};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

mod app;
mod render;

#[derive(Parser)]
#[command(name = "confession-board")]
#[command(about = "Anonymous confession board", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file path (default: confession-board.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show this device's anonymous id
    Whoami,

    /// List confessions
    Feed {
        /// latest, oldest or popular
        #[arg(short, long, default_value_t = FeedSort::Latest)]
        sort: FeedSort,
    },

    /// Post a confession with optional media
    Post {
        #[arg(long, default_value = "")]
        content: String,

        /// Image or video file, repeatable
        #[arg(long = "media")]
        media: Vec<PathBuf>,
    },

    /// Show a confession's comments
    Thread { confession_id: Uuid },

    /// Comment on a confession
    Comment {
        confession_id: Uuid,
        text: String,

        /// Reply to this comment
        #[arg(long)]
        reply_to: Option<Uuid>,
    },

    /// Like or dislike; repeating the same reaction removes it
    React {
        target: TargetKind,
        id: Uuid,
        polarity: PolarityArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetKind {
    Confession,
    Comment,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolarityArg {
    Like,
    Dislike,
}

impl From<PolarityArg> for Polarity {
    fn from(arg: PolarityArg) -> Self {
        match arg {
            PolarityArg::Like => Polarity::Like,
            PolarityArg::Dislike => Polarity::Dislike,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    app::init_tracing(&settings.log, cli.verbose);
    if let Some(path) = &settings.env_file {
        debug!(path = %path.display(), "loaded .env");
    }

    let session = app::build_session(&settings).await?;
    run(&session, cli.command, cli.json).await
}

async fn run(session: &Session, command: Commands, json: bool) -> Result<()> {
    match command {
        Commands::Whoami => {
            let resolution = session.resolution().await;
            if json {
                print_json(&resolution.identity)?;
            } else {
                render::resolution(resolution);
            }
        }

        Commands::Feed { sort } => {
            let Some(views) = session.refresh_feed(sort).await? else {
                return Ok(());
            };
            if json {
                print_json(&views)?;
            } else {
                render::feed(&views);
            }
        }

        Commands::Post { content, media } => {
            let mut attachments = Vec::with_capacity(media.len());
            for path in media {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                attachments.push(Attachment::from_file_name(file_name, bytes));
            }

            let confession = session.post_confession(ConfessionDraft { content, attachments }).await?;
            info!(confession_id = %confession.id, "posted");
            if json {
                print_json(&confession)?;
            } else {
                println!("Posted {}", confession.id);
            }
        }

        Commands::Thread { confession_id } => {
            let Some(trees) = session.refresh_thread(confession_id).await? else {
                return Ok(());
            };
            if json {
                print_json(&trees)?;
            } else {
                render::thread(&trees);
            }
        }

        Commands::Comment { confession_id, text, reply_to } => {
            let comment = session.post_comment(confession_id, reply_to, &text).await?;
            if json {
                print_json(&comment)?;
            } else {
                println!("Commented {}", comment.id);
            }
        }

        Commands::React { target, id, polarity } => {
            let entity = match target {
                TargetKind::Confession => VotableEntity::Confession(id),
                TargetKind::Comment => VotableEntity::Comment(id),
            };
            let change = session.react(entity, polarity.into()).await?;
            info!(%entity, ?change, "reaction applied");
            show_after_reaction(session, entity, json).await?;
        }
    }
    Ok(())
}

/// Counts come from a fresh read, never from the mutation.
async fn show_after_reaction(session: &Session, entity: VotableEntity, json: bool) -> Result<()> {
    match entity {
        VotableEntity::Confession(id) => {
            let view = session.confession(id).await?;
            if json {
                print_json(&view)?;
            } else {
                render::confession(&view);
            }
        }
        VotableEntity::Comment(id) => {
            let comment = session.comment(id).await?;
            let trees = session.refresh_thread(comment.confession_id).await?.unwrap_or_default();
            let Some(view) = trees
                .iter()
                .flat_map(|t| std::iter::once(&t.parent).chain(&t.replies))
                .find(|v| v.comment.id == id)
            else {
                bail!("comment {id} is no longer in its thread");
            };
            if json {
                print_json(view)?;
            } else {
                render::comment(view);
            }
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
