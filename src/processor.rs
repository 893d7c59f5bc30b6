#![forbid(unsafe_code)]

//! Per-channel download state machine and the run loop that sequences
//! configured channels.
//!
//! The decision order per channel is fixed: a live stream aborts first
//! (the VOD is still growing), then a channel with no archives, then an
//! already-processed latest VOD. Only after all three gates does a
//! download start, and persisted state advances strictly after the
//! download and sidecar both succeeded.

use crate::config::Settings;
use crate::downloader::Downloader;
use crate::error::VodError;
use crate::naming::{self, NamingStrategy};
use crate::nfo;
use crate::state::{self, ProcessingState};
use crate::twitch::{Vod, VodSource};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything one channel's run needs, resolved by the caller.
#[derive(Debug, Clone)]
pub struct ChannelJob<'a> {
    pub channel: &'a str,
    pub show_name: &'a str,
    pub output_dir: &'a Path,
    pub state_path: &'a Path,
    pub cookies_path: &'a Path,
    pub extra_args: &'a [String],
    pub naming: NamingStrategy,
}

/// What a channel's run decided, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Live,
    NoArchive,
    AlreadyProcessed { vod_id: String },
    Downloaded { vod_id: String, video_path: PathBuf },
}

/// Season/episode numbering keys off the viewer's wall clock, not UTC.
pub fn local_publish_time(published_at: DateTime<Utc>) -> NaiveDateTime {
    published_at.with_timezone(&Local).naive_local()
}

/// Runs the state machine for one channel. Any error leaves the persisted
/// state exactly as it was, so the next run re-attempts the same VOD.
pub fn process_channel(
    source: &impl VodSource,
    downloader: &impl Downloader,
    job: &ChannelJob<'_>,
) -> Result<Outcome, VodError> {
    let user_id = source.resolve_user_id(job.channel)?;

    if source.is_live(&user_id)? {
        return Ok(Outcome::Live);
    }

    let Some(vod) = source.latest_archived_vod(&user_id)? else {
        return Ok(Outcome::NoArchive);
    };

    let prior = state::load_state(job.state_path)?;
    if prior.already_processed(&vod.id) {
        return Ok(Outcome::AlreadyProcessed { vod_id: vod.id });
    }

    download_and_record(downloader, job, &vod)
}

fn download_and_record(
    downloader: &impl Downloader,
    job: &ChannelJob<'_>,
    vod: &Vod,
) -> Result<Outcome, VodError> {
    let location = naming::resolve_output(
        job.output_dir,
        job.channel,
        job.show_name,
        local_publish_time(vod.published_at),
        &vod.title,
        job.naming,
    );
    fs::create_dir_all(&location.season_dir).map_err(|err| {
        VodError::io(err, format!("creating {}", location.season_dir.display()))
    })?;

    let video_path = location.video_path();
    downloader.download(&vod.url, job.cookies_path, &video_path, job.extra_args)?;

    nfo::write_nfo(
        &location.nfo_path(),
        &vod.title,
        &vod.description,
        location.aired,
        location.season,
        location.episode,
    )?;

    state::save_state(
        job.state_path,
        &ProcessingState {
            last_vod_id: Some(vod.id.clone()),
            last_vod_published_at: Some(vod.published_at),
        },
    )?;

    Ok(Outcome::Downloaded {
        vod_id: vod.id.clone(),
        video_path,
    })
}

/// One channel's result inside a run.
#[derive(Debug)]
pub struct ChannelReport {
    pub channel: String,
    pub result: Result<Outcome, VodError>,
}

/// Processes every configured channel in order. A channel's failure is
/// logged and does not stop its siblings; a rejected token does, since
/// every remaining call would fail the same way.
pub fn run_channels(
    source: &impl VodSource,
    downloader: &impl Downloader,
    settings: &Settings,
) -> Result<Vec<ChannelReport>, VodError> {
    let multi = settings.is_multi();
    let naming = if multi {
        NamingStrategy::TimeStem
    } else {
        NamingStrategy::TitleStem
    };

    let mut reports = Vec::with_capacity(settings.channels.len());
    for (index, channel) in settings.channels.iter().enumerate() {
        let show_name = settings.show_name_for(index);
        let state_path = state::resolve_state_path(
            settings.state_path.as_deref(),
            &settings.output_dir,
            channel,
            multi,
        );
        let job = ChannelJob {
            channel,
            show_name: &show_name,
            output_dir: &settings.output_dir,
            state_path: &state_path,
            cookies_path: &settings.cookies_path,
            extra_args: &settings.ytdlp_extra_args,
            naming,
        };

        let result = process_channel(source, downloader, &job);
        match &result {
            Ok(Outcome::Live) => {
                println!("{channel} is live. Skipping VOD download until stream ends.");
            }
            Ok(Outcome::NoArchive) => {
                println!("No VODs found for {channel}.");
            }
            Ok(Outcome::AlreadyProcessed { vod_id }) => {
                println!("No new VOD for {channel}. Latest is still {vod_id}.");
            }
            Ok(Outcome::Downloaded { vod_id, video_path }) => {
                println!(
                    "Saved VOD {vod_id} for {channel} to {}.",
                    video_path.display()
                );
            }
            Err(VodError::Auth(message)) => {
                return Err(VodError::Auth(message.clone()));
            }
            Err(err) => {
                eprintln!("Error processing {channel}: {err}");
            }
        }
        reports.push(ChannelReport {
            channel: channel.clone(),
            result,
        });
    }
    Ok(reports)
}
