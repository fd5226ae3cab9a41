use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Duration, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use cyclesense::{
    AppConfig, Clock, CycleAnalysis, DataManager, FertilityPhase, FlowLevel, IntercourseRecord,
    JsonFileStore, MenstrualRecord, Prediction, RecordFacet, ShiftDetection, SymptomRecord,
    SystemClock, TemperatureRecord, UserSettings, analyze_cycles, fertility_status, group_periods,
    validate_date, validate_menstrual_flow, validate_time,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "cyclesense")]
#[command(about = "Fertility tracker - log daily records, predict ovulation")]
struct Args {
    /// Override the data directory from the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log a basal body temperature reading
    LogTemp {
        /// Calendar day, YYYY-MM-DD
        date: String,
        /// Temperature in °C
        temp: f64,
        /// Time of measurement, HH:MM
        #[arg(long, default_value = "07:00")]
        time: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Log menstrual flow for a day
    LogFlow {
        date: String,
        /// One of: none, light, medium, heavy
        flow: String,
        /// Mark the day as a period start
        #[arg(long)]
        start: bool,
        /// Mark the day as a period end
        #[arg(long)]
        end: bool,
    },
    /// Log an intercourse event
    LogIntercourse {
        date: String,
        #[arg(long, default_value = "22:00")]
        time: String,
        #[arg(long)]
        protected: bool,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark a day as explicitly intercourse-free
    LogNoIntercourse { date: String },
    /// Log symptom tags for a day
    LogSymptoms {
        date: String,
        /// Comma-separated tags, e.g. "cramps,headache"
        symptoms: String,
        #[arg(long)]
        note: Option<String>,
    },
    /// Show everything recorded for one day
    Show { date: String },
    /// Delete one facet of a day (temperature | menstrual | intercourse | symptoms)
    Delete {
        date: String,
        facet: String,
        /// Intercourse event id (from `show`) to delete a single event
        #[arg(long)]
        id: Option<Uuid>,
    },
    /// Cycle statistics over the stored history
    Stats {
        /// Days of history to analyze
        #[arg(long, default_value_t = 365)]
        lookback: i64,
    },
    /// Predict ovulation and the fertile window
    Predict {
        /// Days of history to analyze
        #[arg(long, default_value_t = 90)]
        lookback: i64,
    },
    /// Show or update personal averages
    Settings {
        #[arg(long)]
        cycle_length: Option<f64>,
        #[arg(long)]
        luteal_phase: Option<f64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
        .parse_lossy("cyclesense=info");

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = dir;
    }

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args.command, config))
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let store = JsonFileStore::open(&config.storage.data_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to open data directory {}",
                config.storage.data_dir.display()
            )
        })?;
    let clock = Arc::new(SystemClock);
    let manager = DataManager::new(Arc::new(store), clock.clone(), config.engine_config());

    match command {
        Command::LogTemp {
            date,
            temp,
            time,
            note,
        } => {
            let record = TemperatureRecord {
                date: parse_date(&date)?,
                time: parse_time(&time)?,
                temperature: temp,
                note,
            };
            manager.save_temperature_record(record).await?;
            println!("Logged {temp:.1} °C for {date}");
        }
        Command::LogFlow {
            date,
            flow,
            start,
            end,
        } => {
            let record = MenstrualRecord {
                date: parse_date(&date)?,
                flow: parse_flow(&flow)?,
                is_start: start,
                is_end: end,
            };
            manager.save_menstrual_record(record).await?;
            println!("Logged {flow} flow for {date}");
        }
        Command::LogIntercourse {
            date,
            time,
            protected,
            note,
        } => {
            let record = IntercourseRecord {
                id: Uuid::nil(), // assigned by the manager
                date: parse_date(&date)?,
                time: parse_time(&time)?,
                protected,
                note,
            };
            let id = manager.save_intercourse_record(record).await?;
            println!("Logged intercourse for {date} (id {id})");
        }
        Command::LogNoIntercourse { date } => {
            manager
                .save_no_intercourse_record(parse_date(&date)?)
                .await?;
            println!("Marked {date} as intercourse-free");
        }
        Command::LogSymptoms {
            date,
            symptoms,
            note,
        } => {
            let record = SymptomRecord {
                date: parse_date(&date)?,
                symptoms: symptoms
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                note,
            };
            manager.save_symptom_record(record).await?;
            println!("Logged symptoms for {date}");
        }
        Command::Show { date } => show_day(&manager, parse_date(&date)?).await?,
        Command::Delete { date, facet, id } => {
            let facet = parse_facet(&facet)?;
            manager.delete_record(parse_date(&date)?, facet, id).await?;
            println!("Deleted {facet:?} facet for {date}");
        }
        Command::Stats { lookback } => show_stats(&manager, clock.as_ref(), lookback).await?,
        Command::Predict { lookback } => run_prediction(&manager, clock.as_ref(), lookback).await?,
        Command::Settings {
            cycle_length,
            luteal_phase,
        } => update_settings(&manager, cycle_length, luteal_phase).await?,
    }

    Ok(())
}

async fn show_day(manager: &DataManager, date: NaiveDate) -> Result<()> {
    match manager.get_day_record(date).await? {
        None => println!("Nothing recorded for {date}"),
        Some(day) => {
            println!("{date}:");
            if let Some(t) = &day.temperature {
                println!("  temperature: {:.1} °C at {}", t.temperature, t.time.format("%H:%M"));
            }
            if let Some(m) = &day.menstrual {
                let mut tags = Vec::new();
                if m.is_start {
                    tags.push("start");
                }
                if m.is_end {
                    tags.push("end");
                }
                let suffix = if tags.is_empty() {
                    String::new()
                } else {
                    format!(" ({})", tags.join(", "))
                };
                println!("  flow: {}{suffix}", m.flow.as_str());
            }
            for event in &day.intercourse {
                println!(
                    "  intercourse at {} ({}, id {})",
                    event.time.format("%H:%M"),
                    if event.protected { "protected" } else { "unprotected" },
                    event.id
                );
            }
            if day.no_intercourse {
                println!("  no intercourse");
            }
            if let Some(s) = &day.symptoms {
                println!("  symptoms: {}", s.symptoms.join(", "));
            }
        }
    }
    Ok(())
}

async fn show_stats(manager: &DataManager, clock: &dyn Clock, lookback: i64) -> Result<()> {
    let end = clock.today();
    let start = end - Duration::days(lookback);
    let history = manager.collect_history(start, end).await?;

    let periods = group_periods(&history.menstrual);
    println!("{} period(s) in the last {lookback} days", periods.len());
    for period in &periods {
        println!("  {} to {} ({} days)", period.start, period.end, period.duration_days);
    }

    match analyze_cycles(&periods) {
        CycleAnalysis::Insufficient { reason } => println!("No cycle statistics: {reason}"),
        CycleAnalysis::Ready(stats) => {
            println!("Average cycle length: {:.1} days", stats.average_cycle_length);
            if let (Some(regularity), Some(score)) = (stats.regularity, stats.regularity_score) {
                println!("Regularity: {} (score {score:.2})", regularity.as_str());
            }
        }
    }
    Ok(())
}

async fn run_prediction(manager: &DataManager, clock: &dyn Clock, lookback: i64) -> Result<()> {
    let today = clock.today();
    let start = today - Duration::days(lookback);
    let report = manager.predict_ovulation(start, today).await?;

    match &report.shift {
        ShiftDetection::Detected(shift) => {
            print!(
                "Temperature shift on {} ({} confidence",
                shift.shift_date,
                shift.confidence.as_str()
            );
            if let Some(cover) = shift.cover_line {
                print!(", cover-line {cover:.1} °C");
            }
            println!(")");
        }
        ShiftDetection::NotDetected => println!("No temperature shift in the current data"),
        ShiftDetection::Insufficient { reason } => println!("Temperature method: {reason}"),
    }

    match &report.prediction {
        Prediction::Unavailable { reason } => println!("No prediction: {reason}"),
        Prediction::Predicted(p) => {
            println!(
                "Predicted ovulation: {} ({} method, {} confidence)",
                p.ovulation_date,
                p.method.as_str(),
                p.confidence_label()
            );
            println!(
                "Fertile window: {} to {} (optimal {} to {})",
                p.window.fertile_start,
                p.window.fertile_end,
                p.window.optimal_start,
                p.window.optimal_end
            );
            match fertility_status(&p.window, today) {
                FertilityPhase::PreFertile { days_until_window } => {
                    println!("Today: pre-fertile, window opens in {days_until_window} day(s)");
                }
                FertilityPhase::Fertile { days_to_ovulation } if days_to_ovulation >= 0 => {
                    println!("Today: fertile, ovulation in {days_to_ovulation} day(s)");
                }
                FertilityPhase::Fertile { days_to_ovulation } => {
                    println!("Today: fertile, ovulation {} day(s) ago", -days_to_ovulation);
                }
                FertilityPhase::Optimal { days_to_ovulation } => {
                    println!("Today: optimal, ovulation in {days_to_ovulation} day(s)");
                }
                FertilityPhase::PostFertile { days_since_window } => {
                    println!("Today: post-fertile, window closed {days_since_window} day(s) ago");
                }
            }
        }
    }
    Ok(())
}

async fn update_settings(
    manager: &DataManager,
    cycle_length: Option<f64>,
    luteal_phase: Option<f64>,
) -> Result<()> {
    let current = manager.get_user_settings().await?;
    if cycle_length.is_none() && luteal_phase.is_none() {
        println!("Average cycle length: {:.1} days", current.average_cycle_length);
        println!("Average luteal phase: {:.1} days", current.average_luteal_phase);
        return Ok(());
    }

    let updated = UserSettings {
        average_cycle_length: cycle_length.unwrap_or(current.average_cycle_length),
        average_luteal_phase: luteal_phase.unwrap_or(current.average_luteal_phase),
    };
    manager.save_user_settings(updated.clone()).await?;
    println!(
        "Saved settings: cycle {:.1} days, luteal phase {:.1} days",
        updated.average_cycle_length, updated.average_luteal_phase
    );
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    let check = validate_date(value);
    if !check.valid {
        bail!(check.message.unwrap_or_else(|| "invalid date".into()));
    }
    Ok(NaiveDate::parse_from_str(value, "%Y-%m-%d")?)
}

fn parse_time(value: &str) -> Result<NaiveTime> {
    let check = validate_time(value);
    if !check.valid {
        bail!(check.message.unwrap_or_else(|| "invalid time".into()));
    }
    Ok(NaiveTime::parse_from_str(value, "%H:%M")?)
}

fn parse_flow(value: &str) -> Result<FlowLevel> {
    let check = validate_menstrual_flow(value);
    if !check.valid {
        bail!(check.message.unwrap_or_else(|| "invalid flow level".into()));
    }
    Ok(value.parse().expect("validated flow level parses"))
}

fn parse_facet(value: &str) -> Result<RecordFacet> {
    match value {
        "temperature" => Ok(RecordFacet::Temperature),
        "menstrual" => Ok(RecordFacet::Menstrual),
        "intercourse" => Ok(RecordFacet::Intercourse),
        "symptoms" => Ok(RecordFacet::Symptoms),
        other => bail!(
            "unknown facet '{other}' (expected temperature, menstrual, intercourse or symptoms)"
        ),
    }
}
