//! Fetch weather for a place and print activity recommendations.
//!
//! Run with: OPENWEATHER_KEY=... cargo run --example weather_check --features http -- "Lisbon"

use activity_tracker::{AppConfig, GpsPoint, WeatherClient};

#[tokio::main]
async fn main() {
    env_logger::init();

    let config = AppConfig::from_env();
    let Some(key) = config.openweather_key.as_deref() else {
        eprintln!("Set OPENWEATHER_KEY to run this example");
        return;
    };
    let client = WeatherClient::new(key).expect("client builds");

    let place = std::env::args().nth(1);
    let point = match place.as_deref() {
        Some(name) => match client.geocode(name).await {
            Ok(Some(point)) => point,
            Ok(None) => {
                eprintln!("No place named '{}'", name);
                return;
            }
            Err(e) => {
                eprintln!("Geocoding failed: {}", e);
                return;
            }
        },
        None => GpsPoint::new(37.7749, -122.4194),
    };

    let summary = match client.summary(point).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("Weather unavailable: {}", e);
            return;
        }
    };

    let current = &summary.current;
    println!(
        "{}: {:.0}°C (feels {:.0}°C), {}, humidity {:.0}%, wind {}\n",
        current.location_name,
        current.temp_c,
        current.feels_like_c,
        current.description,
        current.humidity_pct,
        current.wind_label()
    );

    println!("Recommendations:");
    for rec in &summary.recommendations {
        println!("  {:?} [{:?}] {}", rec.activity, rec.suitability, rec.description);
    }

    println!("\nNext hours:");
    for entry in &summary.hourly {
        println!("  {}  {:4.1}°C  {}", entry.time.format("%H:%M"), entry.temp_c, entry.condition);
    }

    println!("\nDaily:");
    for day in &summary.daily {
        println!("  {}  {:4.1} / {:4.1}°C  {}", day.date, day.high_c, day.low_c, day.condition);
    }
}
