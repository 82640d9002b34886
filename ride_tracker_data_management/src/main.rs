use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use ride_tracker_data_management::{gpx_util, ride_book::RideBook, DataManager};
use ride_tracker_lib::geo::GeoPoint;
use ride_tracker_recording::{
    finalizer,
    position_stream::WatchConfig,
    simulated::SimulatedPositionSource,
    track_recorder::{RecorderConfig, TrackRecorder},
};

// CLI for manual data operations
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let data_manager = DataManager::start().await?;
    let _ = data_manager.auth().restore().await?;

    match args.as_slice() {
        ["register", email, password, display_name] => {
            data_manager
                .auth()
                .sign_up(email, password, Some(display_name))
                .await?;
            println!("registered {email}");
        }
        ["login", email, password] => {
            let session = data_manager.auth().sign_in(email, password).await?;
            println!(
                "signed in as {}",
                session.display_name.as_deref().unwrap_or(&session.email)
            );
        }
        ["logout"] => {
            data_manager.auth().sign_out().await?;
            println!("signed out");
        }
        ["list"] => {
            let mut book = RideBook::new(data_manager.clone());
            book.load().await?;
            for ride in book.rides() {
                println!(
                    "{}  {:<24} {:>8.2} km  {:>9}  {} points",
                    ride.id,
                    ride.name,
                    ride.distance_km,
                    ride.duration,
                    ride.points.len()
                );
            }
            let totals = book.totals();
            println!(
                "{} rides, {:.2} km, {}",
                totals.trips, totals.distance_km, totals.duration
            );
        }
        ["show", id] => {
            let mut book = RideBook::new(data_manager.clone());
            book.load().await?;
            let Some(ride) = book.get(parse_id(id)?) else {
                bail!("no ride with id {id}");
            };
            println!("{} ({})", ride.name, ride.id);
            println!("  recorded: {}", ride.created_at);
            println!("  distance: {:.2} km", ride.distance_km);
            println!("  duration: {}", ride.duration);
            if let Some(image) = &ride.image {
                println!("  image:    {}", image.0);
            }
            for point in &ride.points {
                println!("  {:.6}, {:.6}", point.latitude, point.longitude);
            }
        }
        ["delete", id] => {
            let mut book = RideBook::new(data_manager.clone());
            book.load().await?;
            book.delete(parse_id(id)?).await?;
            println!("deleted {id}");
        }
        ["import-gpx", path] => {
            let trip = gpx_util::read_gpx(Path::new(path))?;
            finalizer::save_trip(&data_manager, &trip).await?;
            println!(
                "imported {} ({:.2} km, {} points)",
                trip.name,
                trip.distance_km,
                trip.points.len()
            );
        }
        ["export-gpx", id, path] => {
            let mut book = RideBook::new(data_manager.clone());
            book.load().await?;
            let Some(ride) = book.get(parse_id(id)?) else {
                bail!("no ride with id {id}");
            };
            gpx_util::write_gpx(ride, Path::new(path))?;
            println!("wrote {path}");
        }
        ["simulate", name] => {
            let trip = simulate_ride(&data_manager, name).await?;
            println!(
                "saved simulated ride {} ({:.2} km, {}, {} points)",
                trip.name,
                trip.distance_km,
                trip.duration,
                trip.points.len()
            );
        }
        _ => {
            eprintln!("usage: ride_tracker_data_management <command>");
            eprintln!("  register <email> <password> <display name>");
            eprintln!("  login <email> <password>");
            eprintln!("  logout");
            eprintln!("  list");
            eprintln!("  show <ride id>");
            eprintln!("  delete <ride id>");
            eprintln!("  import-gpx <file>");
            eprintln!("  export-gpx <ride id> <file>");
            eprintln!("  simulate <name>");
        }
    }

    Ok(())
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| anyhow::anyhow!("not a ride id: {raw}"))
}

/// Runs a complete recording over a scripted route through the real
/// pipeline and saves it for the signed-in user.
async fn simulate_ride(
    data_manager: &DataManager,
    name: &str,
) -> Result<ride_tracker_lib::trip::Trip> {
    let start = GeoPoint::new(47.3769, 8.5417);
    let route: Vec<GeoPoint> = (1..=20)
        .map(|step| GeoPoint::new(47.3769 + 0.0005 * step as f64, 8.5417 + 0.0002 * step as f64))
        .collect();
    let source = SimulatedPositionSource::with_route(start, route, Duration::from_millis(50));

    let config = RecorderConfig {
        watch: WatchConfig {
            min_interval: Duration::ZERO,
            min_distance_m: 0.0,
            ..WatchConfig::default()
        },
        tick_period: Duration::from_millis(100),
    };
    let recorder = TrackRecorder::spawn_with_config(Arc::new(source), config);

    recorder.start().await?;
    let mut snapshots = recorder.watch_snapshots();
    tokio::time::timeout(Duration::from_secs(10), async {
        while snapshots.borrow_and_update().points.len() < 21 {
            snapshots.changed().await?;
        }
        Ok::<_, tokio::sync::watch::error::RecvError>(())
    })
    .await??;
    let session = recorder.stop().await?;

    let trip = finalizer::finalize(&session, name, None)?;
    finalizer::save_trip(data_manager, &trip).await?;
    Ok(trip)
}
