//! Interactive navigation session.
//!
//! Presents a `dialoguer` menu for stepping through time, picking days and
//! day groups, and writes the lot and region layers whenever regions for
//! the current view date arrive.

use std::sync::Arc;
use std::time::Duration;

use dialoguer::{Input, Select};
use parking_map_lots::LotCatalog;
use parking_map_records::{Direction, TemporalIndex, slot_key};
use parking_map_records_models::{DayGroup, ViewDate};
use parking_map_worker::{ChannelConfig, ComputeChannel, ComputeResponse, ViewSession};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Settings;
use crate::view_spec::parse_time;
use crate::write_geojson;

/// How long "Wait for regions" waits beyond the debounce window.
const REGION_WAIT: Duration = Duration::from_secs(30);

enum Action {
    Later,
    Earlier,
    PickDay,
    PickGroup,
    SetTime,
    WaitAndWrite,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::Later,
        Self::Earlier,
        Self::PickDay,
        Self::PickGroup,
        Self::SetTime,
        Self::WaitAndWrite,
        Self::Quit,
    ];

    const fn label(&self) -> &'static str {
        match self {
            Self::Later => "30 minutes later",
            Self::Earlier => "30 minutes earlier",
            Self::PickDay => "Pick a day",
            Self::PickGroup => "Pick a day group",
            Self::SetTime => "Set time of day",
            Self::WaitAndWrite => "Wait for regions and write layers",
            Self::Quit => "Quit",
        }
    }
}

/// Runs the interactive session until the user quits.
///
/// # Errors
///
/// Returns an error if user input fails or a layer cannot be written.
pub async fn run(
    settings: &Settings,
    index: Arc<TemporalIndex>,
    catalog: Arc<LotCatalog>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(latest) = index.latest() else {
        return Err("No status records to navigate".into());
    };

    let (channel, mut responses) = ComputeChannel::new(
        Arc::clone(&catalog),
        ChannelConfig {
            quiescence: settings.quiescence,
        },
        Handle::current(),
    );
    let mut session = ViewSession::new(
        Arc::clone(&index),
        catalog,
        channel,
        ViewDate::instant(latest),
    );
    session.navigate(ViewDate::instant(latest));

    println!("Parking Map");
    if let Some(earliest) = index.earliest() {
        println!(
            "Records from {} to {}",
            slot_key(earliest),
            slot_key(latest)
        );
    }

    loop {
        drain(&mut session, &mut responses, settings)?;
        println!();
        println!("Viewing {}", session.view());

        let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
        let idx = Select::new()
            .with_prompt("Navigate")
            .items(&labels)
            .default(0)
            .interact()?;

        match Action::ALL[idx] {
            Action::Later => step(&mut session, Direction::Later),
            Action::Earlier => step(&mut session, Direction::Earlier),
            Action::PickDay => pick_day(&mut session)?,
            Action::PickGroup => pick_group(&mut session, latest)?,
            Action::SetTime => set_time(&mut session)?,
            Action::WaitAndWrite => {
                wait_for_active(&mut session, &mut responses, settings).await?;
            }
            Action::Quit => break,
        }
    }

    log::info!(
        "Session ended after {} compositions",
        session.channel().executed_count()
    );
    Ok(())
}

fn step(session: &mut ViewSession, direction: Direction) {
    if session.step(direction).is_none() {
        println!("Already at the edge of the recorded range");
    }
}

fn pick_day(session: &mut ViewSession) -> Result<(), Box<dyn std::error::Error>> {
    let index = Arc::clone(session.index());
    let days = index.observed_days();
    if days.is_empty() {
        return Ok(());
    }

    let labels: Vec<String> = days
        .iter()
        .map(|day| {
            let mark = if index.is_day_complete(*day) {
                ""
            } else {
                " (partial)"
            };
            format!("{}{mark}", day.format("%a %Y-%m-%d"))
        })
        .collect();

    let current = match session.view() {
        ViewDate::Instant { timestamp } => days
            .iter()
            .position(|day| *day == timestamp.date())
            .unwrap_or(days.len() - 1),
        ViewDate::Aggregate { .. } => days.len() - 1,
    };

    let idx = Select::new()
        .with_prompt("Day")
        .items(&labels)
        .default(current)
        .interact()?;

    let day = days[idx];
    if let ViewDate::Aggregate { time, .. } = *session.view() {
        session.navigate(index.with_day(&ViewDate::instant(day.and_time(time)), day));
    } else {
        session.select_day(day);
    }
    Ok(())
}

fn pick_group(
    session: &mut ViewSession,
    latest: chrono::NaiveDateTime,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut labels = vec!["Single day".to_string()];
    labels.extend(DayGroup::ALL.iter().map(ToString::to_string));

    let idx = Select::new()
        .with_prompt("Day group")
        .items(&labels)
        .default(0)
        .interact()?;

    if idx == 0 {
        if let ViewDate::Aggregate { time, .. } = *session.view() {
            let index = Arc::clone(session.index());
            let day = latest.date();
            session.navigate(index.with_day(&ViewDate::instant(day.and_time(time)), day));
        }
        return Ok(());
    }

    let group = DayGroup::ALL[idx - 1];
    let encoded = ViewDate::aggregate(group, session.view().time_of_day()).encode();
    if let Err(e) = session.navigate_encoded(&encoded) {
        println!("{e}");
    }
    Ok(())
}

fn set_time(session: &mut ViewSession) -> Result<(), Box<dyn std::error::Error>> {
    let text: String = Input::new()
        .with_prompt("Time of day (HH:MM, on the half hour)")
        .with_initial_text(session.view().time_of_day().format("%H:%M").to_string())
        .interact_text()?;

    let time = match parse_time(&text) {
        Ok(time) => time,
        Err(e) => {
            println!("{e}");
            return Ok(());
        }
    };

    let next = match *session.view() {
        ViewDate::Instant { timestamp } => {
            let day = timestamp.date();
            session
                .index()
                .with_day(&ViewDate::instant(day.and_time(time)), day)
        }
        ViewDate::Aggregate { group, .. } => ViewDate::aggregate(group, time),
    };
    session.navigate(next);
    Ok(())
}

/// Applies every response that has already arrived, writing the layers
/// when one matches the current view date.
fn drain(
    session: &mut ViewSession,
    responses: &mut UnboundedReceiver<ComputeResponse>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut applied = false;
    while let Ok(response) = responses.try_recv() {
        applied |= session.receive(response);
    }
    if applied {
        write_layers(session, settings)?;
    }
    Ok(())
}

/// Waits until regions for the current view date arrive, then writes the
/// layers.
async fn wait_for_active(
    session: &mut ViewSession,
    responses: &mut UnboundedReceiver<ComputeResponse>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    if session.regions_current() {
        return write_layers(session, settings);
    }

    let deadline = tokio::time::Instant::now() + settings.quiescence + REGION_WAIT;

    loop {
        match tokio::time::timeout_at(deadline, responses.recv()).await {
            Ok(Some(response)) => {
                if session.receive(response) {
                    return write_layers(session, settings);
                }
            }
            Ok(None) => return Err("Compute channel closed".into()),
            Err(_) => {
                println!("Regions are still being computed; try again shortly");
                return Ok(());
            }
        }
    }
}

fn write_layers(
    session: &ViewSession,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(regions) = session.regions() else {
        return Ok(());
    };

    let regions_path = settings.output_dir.join("regions.geojson");
    let lots_path = settings.output_dir.join("lots.geojson");
    write_geojson(&regions_path, regions)?;
    write_geojson(&lots_path, &session.lot_points())?;

    println!(
        "Wrote {} regions and {} lots for {} to {}",
        regions.features.len(),
        session.summaries().len(),
        session.view(),
        settings.output_dir.display()
    );
    for error in session.region_errors() {
        println!("  skipped: {error}");
    }
    Ok(())
}
