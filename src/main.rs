use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use pickup_locator::{
    Coordinates, LocationQuery, LocatorConfig, LocatorError, RecommendationFacade,
    StaticVenueProvider, VenueFilters, VenueType, bearing_degrees, cardinal_direction,
    distance_km, format_distance, logging,
};

#[derive(Parser)]
#[command(
    name = "pickup-locator",
    author,
    version,
    about = "Find a place to play: resolve locations, check game-time weather and rank nearby venues"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct LocationArgs {
    /// Address, place name or zip code
    #[arg(short, long)]
    location: Option<String>,

    /// Coordinates as "lat,lng", e.g. from the device GPS
    #[arg(long, value_name = "LAT,LNG", value_parser = parse_coordinates, allow_hyphen_values = true)]
    coords: Option<Coordinates>,
}

impl LocationArgs {
    fn query(&self) -> LocationQuery {
        LocationQuery {
            text: self.location.clone(),
            coordinates: self.coords,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum VenueKind {
    Indoor,
    Outdoor,
    Mixed,
}

impl From<VenueKind> for VenueType {
    fn from(kind: VenueKind) -> Self {
        match kind {
            VenueKind::Indoor => VenueType::Indoor,
            VenueKind::Outdoor => VenueType::Outdoor,
            VenueKind::Mixed => VenueType::Mixed,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a place name, zip code or coordinates
    Resolve {
        #[command(flatten)]
        location: LocationArgs,
    },

    /// Weather for a location at a game time
    Weather {
        #[command(flatten)]
        location: LocationArgs,

        /// Local game time, e.g. 2026-10-17T18:00 (defaults to now)
        #[arg(long, value_parser = parse_local_time)]
        at: Option<NaiveDateTime>,
    },

    /// Rank venues from a JSON file for a sport, place and time
    Recommend {
        #[command(flatten)]
        location: LocationArgs,

        /// Sport to play, e.g. basketball
        #[arg(short, long)]
        sport: String,

        /// JSON file with an array of venues
        #[arg(long, value_name = "FILE")]
        venues: PathBuf,

        /// Local game time, e.g. 2026-10-17T18:00 (defaults to now)
        #[arg(long, value_parser = parse_local_time)]
        at: Option<NaiveDateTime>,

        /// Only venues within this many kilometers
        #[arg(long)]
        max_distance: Option<f64>,

        /// Only venues rated at least this high (0-5)
        #[arg(long)]
        min_rating: Option<f64>,

        /// Only venues of this type
        #[arg(long, value_enum)]
        venue_type: Option<VenueKind>,

        /// Show at most this many venues
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Distance and compass direction between two points (offline)
    Distance {
        #[arg(long, value_name = "LAT,LNG", value_parser = parse_coordinates, allow_hyphen_values = true)]
        from: Coordinates,

        #[arg(long, value_name = "LAT,LNG", value_parser = parse_coordinates, allow_hyphen_values = true)]
        to: Coordinates,
    },
}

fn parse_coordinates(value: &str) -> std::result::Result<Coordinates, String> {
    let (lat, lng) = value
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LNG, got '{value}'"))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {e}"))?;
    let lng: f64 = lng.trim().parse().map_err(|e| format!("bad longitude: {e}"))?;
    Coordinates::new(lat, lng).map_err(|e| e.to_string())
}

fn parse_local_time(value: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
        .map_err(|e| format!("expected YYYY-MM-DDTHH:MM: {e}"))
}

/// Keep the detailed error as the cause, show the friendly wording on top
fn user_facing(error: LocatorError) -> anyhow::Error {
    let message = error.user_message();
    anyhow::Error::new(error).context(message)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

/// Cancel in-flight lookups on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Distance { from, to } => print_distance(&from, &to, cli.json),
        command => run(command, cli.config, cli.verbose, cli.json).await,
    }
}

async fn run(command: Commands, config_path: Option<PathBuf>, verbose: bool, json: bool) -> Result<()> {
    let mut config = LocatorConfig::load_from_path(config_path)?;
    if verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init(&config.logging)?;
    debug!("Loaded configuration: {:?}", config.logging);

    let facade = RecommendationFacade::from_config(&config)?;
    let cancel = cancel_on_interrupt();

    match command {
        Commands::Resolve { location } => {
            let resolved = facade
                .resolver()
                .resolve(&location.query(), &cancel)
                .await
                .map_err(user_facing)?;

            if json {
                return print_json(&resolved);
            }
            println!("{}", resolved.formatted_address);
            println!("  Coordinates: {}", resolved.coordinates.format_pair());
            println!("  Source: {:?}", resolved.source);
            if !resolved.precise {
                println!("  Approximate location");
            }
        }
        Commands::Weather { location, at } => {
            let resolved = facade
                .resolver()
                .resolve(&location.query(), &cancel)
                .await
                .map_err(user_facing)?;
            let when = at.unwrap_or_else(|| chrono::Local::now().naive_local());
            let snapshot = facade
                .weather()
                .forecast_for(resolved.coordinates, when, &cancel)
                .await;

            if json {
                return print_json(&snapshot);
            }
            println!(
                "Weather at {} for {}",
                resolved.formatted_address,
                when.format("%a %b %-d, %H:%M")
            );
            println!(
                "  {} - {}, humidity {:.0}%, wind {:.0} mph",
                snapshot.format_temperature(),
                snapshot.description,
                snapshot.humidity_pct,
                snapshot.wind_mph
            );
            println!(
                "  Outdoor play: {}",
                if snapshot.outdoor_friendly() { "good" } else { "not advised" }
            );
            for alert in &snapshot.alerts {
                println!("  ! {alert}");
            }
        }
        Commands::Recommend {
            location,
            sport,
            venues,
            at,
            max_distance,
            min_rating,
            venue_type,
            limit,
        } => {
            let provider = StaticVenueProvider::from_json_file(&venues)?;
            let filters = VenueFilters {
                venue_type: venue_type.map(VenueType::from),
                min_rating,
                max_distance_km: max_distance,
                limit,
            };
            let result = facade
                .recommend(&location.query(), &sport, at, &provider, &filters, &cancel)
                .await
                .map_err(user_facing)?;

            if json {
                return print_json(&result);
            }
            println!("Near {}", result.location.formatted_address);
            println!(
                "Weather: {}, {}",
                result.weather.format_temperature(),
                result.weather.description
            );
            for alert in &result.weather.alerts {
                println!("  ! {alert}");
            }
            if result.recommendations.is_empty() {
                println!("No {sport} venues match.");
            }
            for (rank, recommendation) in result.recommendations.iter().enumerate() {
                let venue = &recommendation.venue;
                let bearing = bearing_degrees(&result.location.coordinates, &venue.coordinates);
                println!(
                    "{}. {} ({} {}, {:.1}★, score {:.2})",
                    rank + 1,
                    venue.name,
                    format_distance(recommendation.distance_km).map_err(user_facing)?,
                    cardinal_direction(bearing),
                    venue.average_rating,
                    recommendation.score
                );
                for reason in &recommendation.reasons {
                    println!("     - {reason}");
                }
            }
        }
        Commands::Distance { from, to } => return print_distance(&from, &to, json),
    }

    Ok(())
}

fn print_distance(from: &Coordinates, to: &Coordinates, json: bool) -> Result<()> {
    let km = distance_km(from, to);
    let bearing = bearing_degrees(from, to);
    if json {
        return print_json(&serde_json::json!({
            "distance_km": km,
            "bearing_degrees": bearing,
            "direction": cardinal_direction(bearing),
        }));
    }
    println!(
        "{} {}",
        format_distance(km).map_err(user_facing)?,
        cardinal_direction(bearing)
    );
    Ok(())
}
