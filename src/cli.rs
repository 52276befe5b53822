// src/cli.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use crate::audio::{decode_audio_file, extract_waveform_peaks, get_audio_info, LameEncoderFactory};
use crate::config::CutterConfig;
use crate::lookup::MusicBrainzClient;
use crate::pipeline::{ExportOutcome, FsAudioStore, LoftyTagStore, Orchestrator};
use crate::session::{format_time, EditSession};
use crate::tags::TagOverrides;

/// Command-line front end for cutting audio files
#[derive(Parser, Debug)]
#[command(name = "audio-cutter", version)]
#[command(about = "Cut, fade and re-encode MP3/M4A audio files", long_about = None)]
pub struct Cli {
    /// JSON settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show duration, sample rate, channels and codec of a file
    Info {
        input: PathBuf,
    },

    /// Cut a window out of a file, fade it and save it as MP3 or WAV
    Export(ExportArgs),

    /// Look up album and year on MusicBrainz
    Lookup {
        #[arg(long)]
        artist: String,

        #[arg(long)]
        title: String,
    },

    /// Print min/max waveform peaks as JSON
    Peaks {
        input: PathBuf,

        /// Number of peak pairs (default from config)
        #[arg(short, long)]
        num_peaks: Option<usize>,
    },
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Source audio file (MP3 or M4A)
    pub input: PathBuf,

    /// Destination; `.mp3` is MP3-encoded, anything else is written as WAV.
    /// Defaults to "<name> - edited.mp3" next to the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Intro cut point (M:SS or M:SS.mmm)
    #[arg(long)]
    pub intro: Option<String>,

    /// Outro cut point (M:SS or M:SS.mmm), end of file when omitted
    #[arg(long)]
    pub outro: Option<String>,

    /// Fade-in length in seconds
    #[arg(long)]
    pub fade_in: Option<String>,

    /// Fade-out length in seconds
    #[arg(long)]
    pub fade_out: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub artist: Option<String>,

    #[arg(long)]
    pub album: Option<String>,

    #[arg(long)]
    pub year: Option<String>,

    /// Fill album and year from MusicBrainz when not given
    #[arg(long)]
    pub lookup: bool,
}

pub async fn run(args: Cli, config: CutterConfig) -> anyhow::Result<()> {
    match args.command {
        Command::Info { input } => show_info(input).await,
        Command::Export(export_args) => export(export_args, &config).await,
        Command::Lookup { artist, title } => {
            let client = MusicBrainzClient::from_config(&config)?;
            let result = client.search(&artist, &title).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Command::Peaks { input, num_peaks } => {
            let num_peaks = num_peaks.unwrap_or(config.waveform_peaks);
            let peaks = tokio::task::spawn_blocking(move || {
                let audio = decode_audio_file(&input)?;
                extract_waveform_peaks(&audio, Some(num_peaks))
            })
            .await
            .map_err(|e| anyhow::anyhow!("Task join error: {}", e))??;
            println!("{}", serde_json::to_string(&peaks)?);
            Ok(())
        }
    }
}

async fn show_info(input: PathBuf) -> anyhow::Result<()> {
    let display = input.display().to_string();
    let info = tokio::task::spawn_blocking(move || get_audio_info(&input))
        .await
        .map_err(|e| anyhow::anyhow!("Task join error: {}", e))??;

    println!("Input File: {}", display);
    println!("   Duration: {}", format_time(info.duration_seconds, true));
    println!("   Sample Rate: {} Hz", info.sample_rate);
    println!("   Channels: {}", info.channels);
    println!("   Format: {}", info.format);
    if let Some(bits) = info.bit_depth {
        println!("   Bit Depth: {}", bits);
    }

    Ok(())
}

async fn export(args: ExportArgs, config: &CutterConfig) -> anyhow::Result<()> {
    let files = Arc::new(FsAudioStore);
    let tag_store = Arc::new(LoftyTagStore);

    println!("Loading {}...", args.input.display());
    let mut session = EditSession::open(&args.input, files.as_ref(), tag_store.as_ref()).await?;
    println!("   Duration: {}", format_time(session.duration_seconds(), true));

    if let Some(intro) = args.intro {
        session.intro_field = intro;
    }
    if let Some(outro) = args.outro {
        session.outro_field = outro;
    }
    session.fade_in_field = args.fade_in.unwrap_or_default();
    session.fade_out_field = args.fade_out.unwrap_or_default();
    session.tag_edits = TagOverrides {
        title: args.title,
        artist: args.artist,
        album: args.album,
        year: args.year,
    };

    if args.lookup {
        fill_from_lookup(&mut session, config).await?;
    }

    let destination = args
        .output
        .unwrap_or_else(|| default_destination(&session));

    let orchestrator = Orchestrator::new(
        files,
        tag_store,
        Arc::new(LameEncoderFactory),
        config.bitrate_estimator(),
    );

    let mut status = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let message = status.borrow_and_update().message.clone();
            if !message.is_empty() {
                println!("   {}", message);
            }
        }
    });

    let outcome = orchestrator.export(&session, &destination).await;

    // Closing the status channel ends the progress task
    drop(orchestrator);
    progress.await.ok();

    match outcome {
        ExportOutcome::Saved { bytes } => {
            println!("Saved {} bytes to {}", bytes, destination.display());
            Ok(())
        }
        ExportOutcome::SavedWithoutTags { bytes, error } => {
            warn!("Tags not written: {}", error);
            println!("Saved {} bytes to {} (without tags)", bytes, destination.display());
            Ok(())
        }
        ExportOutcome::Failed(e) => Err(e.into()),
    }
}

/// Pre-fill album and year the user left empty
async fn fill_from_lookup(session: &mut EditSession, config: &CutterConfig) -> anyhow::Result<()> {
    let stored = session.stored_tags().cloned().unwrap_or_default();
    let artist = non_empty(&session.tag_edits.artist).or(non_empty(&stored.artist));
    let title = non_empty(&session.tag_edits.title).or(non_empty(&stored.title));

    let (Some(artist), Some(title)) = (artist, title) else {
        warn!("Artist and title are needed for a lookup");
        return Ok(());
    };

    let client = MusicBrainzClient::from_config(config)?;
    let result = client.search(&artist, &title).await;

    if !result.success {
        println!(
            "   Lookup failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(());
    }

    info!(album = ?result.album, year = ?result.year, "Lookup result");
    if non_empty(&session.tag_edits.album).is_none() {
        session.tag_edits.album = result.album.filter(|a| !a.is_empty());
    }
    if non_empty(&session.tag_edits.year).is_none() {
        session.tag_edits.year = result.year.filter(|y| !y.is_empty());
    }

    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|v| !v.is_empty())
}

fn default_destination(session: &EditSession) -> PathBuf {
    let name = session.default_save_name();
    match session.source_path().parent() {
        Some(dir) if dir != Path::new("") => dir.join(name),
        _ => PathBuf::from(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleBuffer;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export_arguments() {
        let cli = Cli::try_parse_from([
            "audio-cutter",
            "export",
            "song.mp3",
            "-o",
            "cut.wav",
            "--intro",
            "0:01.000",
            "--fade-in",
            "0.5",
            "--title",
            "New",
        ])
        .unwrap();

        match cli.command {
            Command::Export(args) => {
                assert_eq!(args.input, PathBuf::from("song.mp3"));
                assert_eq!(args.output, Some(PathBuf::from("cut.wav")));
                assert_eq!(args.intro.as_deref(), Some("0:01.000"));
                assert_eq!(args.outro, None);
                assert_eq!(args.fade_in.as_deref(), Some("0.5"));
                assert_eq!(args.title.as_deref(), Some("New"));
                assert!(!args.lookup);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_destination_is_next_to_source() {
        let audio = SampleBuffer::silent(1, 10, 1000).unwrap();

        let session = EditSession::new("/music/Song.m4a", audio.clone());
        assert_eq!(
            default_destination(&session),
            PathBuf::from("/music/Song - edited.mp3")
        );

        let session = EditSession::new("Song.mp3", audio);
        assert_eq!(
            default_destination(&session),
            PathBuf::from("Song - edited.mp3")
        );
    }
}
