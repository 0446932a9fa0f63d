//! Route inspection command.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use phototour::geo::haversine_distance;
use phototour::route::Route;
use phototour::tour::durations::allocate_leg_durations;
use phototour::tour::DEFAULT_BASE_LEG_DURATION;

use crate::error::CliError;

/// Arguments for `phototour inspect`.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Path to the route file (image_data.json)
    #[arg(long)]
    pub route: PathBuf,
}

/// Print route statistics: waypoint count, span, distance, leg timing.
pub fn run(args: InspectArgs) -> Result<(), CliError> {
    let route = Route::from_file(&args.route)?;

    println!("Waypoints: {}", route.len());
    if route.is_empty() {
        return Ok(());
    }

    let first = route.get(0).expect("non-empty route has a first waypoint");
    let last = route
        .get(route.len() - 1)
        .expect("non-empty route has a last waypoint");
    println!("Span:      {} .. {}", first.display_date, last.display_date);

    let coords = route.coords();
    let total_m: f64 = coords
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum();
    println!("Distance:  {:.1} km", total_m / 1000.0);

    let durations = allocate_leg_durations(&coords, DEFAULT_BASE_LEG_DURATION);
    if !durations.is_empty() {
        let total: Duration = durations.iter().sum();
        let longest = durations.iter().max().expect("legs exist");
        let shortest = durations.iter().min().expect("legs exist");
        println!(
            "Animation: {} legs, {:.1}s total, legs {}ms..{}ms",
            durations.len(),
            total.as_secs_f64(),
            shortest.as_millis(),
            longest.as_millis()
        );
    }
    Ok(())
}
