//! # Weather
//!
//! Activity recommendations from current conditions, plus (with the `http`
//! feature) an OpenWeatherMap client for current weather, the 5-day forecast
//! and place-name geocoding.
//!
//! The recommendation rules are pure and always available:
//!
//! | Activity | Good | Moderate | Otherwise |
//! |----------|------|----------|-----------|
//! | Running | 10–25 °C, wind < 20 km/h, not rain | 5–30 °C, wind < 25 km/h | poor |
//! | Outdoor workout | 15–28 °C, wind < 15 km/h, not rain | – | omitted |
//! | Hiking | 12–25 °C, humidity < 80 %, not rain, not cloudy | same, but cloudy | omitted |

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "http")]
use crate::{GpsPoint, Result, TrackerError};
#[cfg(feature = "http")]
use log::{debug, info, warn};
#[cfg(feature = "http")]
use reqwest::Client;
#[cfg(feature = "http")]
use std::time::Duration;

/// Default OpenWeatherMap endpoint.
pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// Forecast entries shown as the hourly strip (3-hour steps, ~24 h).
const HOURLY_ENTRIES: usize = 8;
/// Days kept from the forecast.
const MAX_FORECAST_DAYS: usize = 7;

// ============================================================================
// Recommendations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum Suitability {
    Good,
    Moderate,
    Poor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "camelCase")]
pub enum RecommendedActivity {
    Running,
    OutdoorWorkout,
    Hiking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ActivityRecommendation {
    pub activity: RecommendedActivity,
    pub suitability: Suitability,
    pub description: String,
}

impl ActivityRecommendation {
    fn new(activity: RecommendedActivity, suitability: Suitability, description: &str) -> Self {
        Self {
            activity,
            suitability,
            description: description.to_string(),
        }
    }
}

/// Recommend activities for the given conditions.
///
/// `condition` is the OpenWeatherMap main group (`"Rain"`, `"Clouds"`,
/// `"Clear"`, ...). Running is always rated; the others only appear when
/// conditions suit them.
///
/// ```
/// use activity_tracker::{recommend_activities, Suitability};
///
/// let recs = recommend_activities(18.0, "Clear", 8.0, 50.0);
/// assert_eq!(recs.len(), 3);
/// assert!(recs.iter().all(|r| r.suitability == Suitability::Good));
/// ```
pub fn recommend_activities(
    temp_c: f64,
    condition: &str,
    wind_kmh: f64,
    humidity_pct: f64,
) -> Vec<ActivityRecommendation> {
    let raining = condition == "Rain";
    let mut recs = Vec::with_capacity(3);

    let running = if (10.0..=25.0).contains(&temp_c) && wind_kmh < 20.0 && !raining {
        ActivityRecommendation::new(
            RecommendedActivity::Running,
            Suitability::Good,
            "Mild temperature and light winds, ideal for a run.",
        )
    } else if (5.0..=30.0).contains(&temp_c) && wind_kmh < 25.0 {
        ActivityRecommendation::new(
            RecommendedActivity::Running,
            Suitability::Moderate,
            "Fine for running; dress for the temperature.",
        )
    } else {
        ActivityRecommendation::new(
            RecommendedActivity::Running,
            Suitability::Poor,
            "Consider running indoors today.",
        )
    };
    recs.push(running);

    if (15.0..=28.0).contains(&temp_c) && !raining && wind_kmh < 15.0 {
        recs.push(ActivityRecommendation::new(
            RecommendedActivity::OutdoorWorkout,
            Suitability::Good,
            "Comfortable, dry and calm: good for an outdoor workout.",
        ));
    }

    if (12.0..=25.0).contains(&temp_c) && humidity_pct < 80.0 && !raining {
        recs.push(if condition == "Clouds" {
            ActivityRecommendation::new(
                RecommendedActivity::Hiking,
                Suitability::Moderate,
                "Good hiking conditions; watch the cloud cover.",
            )
        } else {
            ActivityRecommendation::new(
                RecommendedActivity::Hiking,
                Suitability::Good,
                "Clear skies and comfortable temperature for hiking.",
            )
        });
    }

    recs
}

/// 16-point compass label for a wind bearing in degrees.
pub fn wind_direction(deg: f64) -> &'static str {
    const POINTS: [&str; 16] = [
        "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
        "NW", "NNW",
    ];
    let idx = ((deg.rem_euclid(360.0) / 22.5).round() as usize) % 16;
    POINTS[idx]
}

// ============================================================================
// Conditions and Forecast
// ============================================================================

/// Current conditions, wind already converted to km/h.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CurrentConditions {
    pub location_name: String,
    pub temp_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: f64,
    pub wind_kmh: f64,
    pub wind_deg: f64,
    /// OpenWeatherMap main group, e.g. "Clear"
    pub condition: String,
    pub description: String,
}

impl CurrentConditions {
    pub fn recommendations(&self) -> Vec<ActivityRecommendation> {
        recommend_activities(self.temp_c, &self.condition, self.wind_kmh, self.humidity_pct)
    }

    pub fn wind_label(&self) -> String {
        format!("{} km/h {}", self.wind_kmh.round(), wind_direction(self.wind_deg))
    }
}

/// One 3-hourly forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    pub time: DateTime<Utc>,
    pub temp_c: f64,
    pub condition: String,
}

/// One day of the forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub high_c: f64,
    pub low_c: f64,
    /// Most frequent condition of the day; ties go to the earliest seen
    pub condition: String,
}

/// Group forecast steps by UTC day, keeping at most seven days.
pub fn daily_forecast(entries: &[ForecastEntry]) -> Vec<DailyForecast> {
    let mut days: Vec<(NaiveDate, Vec<&ForecastEntry>)> = Vec::new();
    for entry in entries {
        let date = entry.time.date_naive();
        match days.iter_mut().find(|(d, _)| *d == date) {
            Some((_, group)) => group.push(entry),
            None => days.push((date, vec![entry])),
        }
    }

    days.into_iter()
        .take(MAX_FORECAST_DAYS)
        .map(|(date, group)| {
            let high_c = group.iter().map(|e| e.temp_c).fold(f64::MIN, f64::max);
            let low_c = group.iter().map(|e| e.temp_c).fold(f64::MAX, f64::min);
            DailyForecast {
                date,
                high_c,
                low_c,
                condition: most_frequent(group.iter().map(|e| e.condition.as_str())),
            }
        })
        .collect()
}

fn most_frequent<'a>(conditions: impl Iterator<Item = &'a str>) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for c in conditions {
        match counts.iter_mut().find(|(name, _)| *name == c) {
            Some((_, n)) => *n += 1,
            None => counts.push((c, 1)),
        }
    }
    let mut best: Option<(&str, usize)> = None;
    for (name, n) in counts {
        if best.map_or(true, |(_, b)| n > b) {
            best = Some((name, n));
        }
    }
    best.map(|(name, _)| name.to_string()).unwrap_or_default()
}

/// Everything the weather panel shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub current: CurrentConditions,
    pub hourly: Vec<ForecastEntry>,
    pub daily: Vec<DailyForecast>,
    pub recommendations: Vec<ActivityRecommendation>,
}

impl WeatherSummary {
    pub fn new(current: CurrentConditions, forecast: &[ForecastEntry]) -> Self {
        Self {
            recommendations: current.recommendations(),
            hourly: forecast.iter().take(HOURLY_ENTRIES).cloned().collect(),
            daily: daily_forecast(forecast),
            current,
        }
    }
}

// ============================================================================
// OpenWeatherMap payloads
// ============================================================================

#[derive(Debug, Deserialize)]
struct OwmCurrent {
    #[serde(default)]
    name: String,
    main: OwmMain,
    #[serde(default)]
    wind: OwmWind,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwmWind {
    /// m/s with `units=metric`
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwmForecast {
    list: Vec<OwmForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwmForecastItem {
    dt: i64,
    main: OwmMain,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmPlace {
    lat: f64,
    lon: f64,
}

impl From<OwmCurrent> for CurrentConditions {
    fn from(raw: OwmCurrent) -> Self {
        let (condition, description) = raw
            .weather
            .into_iter()
            .next()
            .map(|w| (w.main, w.description))
            .unwrap_or_default();
        Self {
            location_name: raw.name,
            temp_c: raw.main.temp,
            feels_like_c: raw.main.feels_like.unwrap_or(raw.main.temp),
            humidity_pct: raw.main.humidity,
            wind_kmh: raw.wind.speed * 3.6,
            wind_deg: raw.wind.deg,
            condition,
            description,
        }
    }
}

impl From<OwmForecast> for Vec<ForecastEntry> {
    fn from(raw: OwmForecast) -> Self {
        raw.list
            .into_iter()
            .map(|item| ForecastEntry {
                time: DateTime::from_timestamp(item.dt, 0).unwrap_or_default(),
                temp_c: item.main.temp,
                condition: item
                    .weather
                    .into_iter()
                    .next()
                    .map(|w| w.main)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

/// Parse a `data/2.5/weather` response body.
pub fn parse_current(json: &str) -> serde_json::Result<CurrentConditions> {
    serde_json::from_str::<OwmCurrent>(json).map(Into::into)
}

/// Parse a `data/2.5/forecast` response body.
pub fn parse_forecast(json: &str) -> serde_json::Result<Vec<ForecastEntry>> {
    serde_json::from_str::<OwmForecast>(json).map(Into::into)
}

// ============================================================================
// HTTP Client
// ============================================================================

/// OpenWeatherMap client. Every failure becomes
/// [`TrackerError::NetworkFetch`]; nothing is retried.
#[cfg(feature = "http")]
pub struct WeatherClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[cfg(feature = "http")]
impl WeatherClient {
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, OPENWEATHER_BASE_URL)
    }

    /// Client against a different host (proxies, test servers).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TrackerError::Config {
                message: "OpenWeather API key is empty".to_string(),
            });
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TrackerError::NetworkFetch {
                message: format!("failed to create HTTP client: {}", e),
                status_code: None,
            })?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("[Weather] GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("[Weather] {} returned {}", path, status);
            return Err(TrackerError::NetworkFetch {
                message: format!("{} returned {}", path, status),
                status_code: Some(status.as_u16()),
            });
        }

        response.json::<T>().await.map_err(network_error)
    }

    fn coords(point: GpsPoint) -> Vec<(&'static str, String)> {
        vec![
            ("lat", point.latitude.to_string()),
            ("lon", point.longitude.to_string()),
            ("units", "metric".to_string()),
        ]
    }

    pub async fn current(&self, point: GpsPoint) -> Result<CurrentConditions> {
        let raw: OwmCurrent = self
            .get_json("data/2.5/weather", &Self::coords(point))
            .await?;
        Ok(raw.into())
    }

    pub async fn forecast(&self, point: GpsPoint) -> Result<Vec<ForecastEntry>> {
        let raw: OwmForecast = self
            .get_json("data/2.5/forecast", &Self::coords(point))
            .await?;
        Ok(raw.into())
    }

    /// Current conditions and forecast, fetched concurrently.
    pub async fn summary(&self, point: GpsPoint) -> Result<WeatherSummary> {
        let (current, forecast) =
            futures::future::try_join(self.current(point), self.forecast(point)).await?;
        info!(
            "[Weather] {}: {:.1}°C {} ({} forecast steps)",
            current.location_name,
            current.temp_c,
            current.condition,
            forecast.len()
        );
        Ok(WeatherSummary::new(current, &forecast))
    }

    /// Resolve a place name to coordinates. `None` when nothing matches.
    pub async fn geocode(&self, name: &str) -> Result<Option<GpsPoint>> {
        let places: Vec<OwmPlace> = self
            .get_json(
                "geo/1.0/direct",
                &[("q", name.to_string()), ("limit", "1".to_string())],
            )
            .await?;
        Ok(places
            .into_iter()
            .next()
            .map(|p| GpsPoint::new(p.lat, p.lon)))
    }
}

#[cfg(feature = "http")]
fn network_error(e: reqwest::Error) -> TrackerError {
    TrackerError::NetworkFetch {
        message: e.to_string(),
        status_code: e.status().map(|s| s.as_u16()),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn suitability_of(recs: &[ActivityRecommendation], activity: RecommendedActivity) -> Option<Suitability> {
        recs.iter()
            .find(|r| r.activity == activity)
            .map(|r| r.suitability)
    }

    #[test]
    fn test_running_tiers() {
        let good = recommend_activities(20.0, "Clear", 10.0, 50.0);
        assert_eq!(suitability_of(&good, RecommendedActivity::Running), Some(Suitability::Good));

        let rainy = recommend_activities(20.0, "Rain", 10.0, 50.0);
        assert_eq!(suitability_of(&rainy, RecommendedActivity::Running), Some(Suitability::Moderate));

        let hot = recommend_activities(32.0, "Clear", 5.0, 30.0);
        assert_eq!(suitability_of(&hot, RecommendedActivity::Running), Some(Suitability::Poor));
        assert_eq!(hot.len(), 1);
    }

    #[test]
    fn test_rain_excludes_outdoor_and_hiking() {
        let recs = recommend_activities(18.0, "Rain", 5.0, 50.0);
        assert_eq!(suitability_of(&recs, RecommendedActivity::OutdoorWorkout), None);
        assert_eq!(suitability_of(&recs, RecommendedActivity::Hiking), None);
    }

    #[test]
    fn test_cloudy_hiking_is_moderate() {
        let recs = recommend_activities(18.0, "Clouds", 5.0, 60.0);
        assert_eq!(suitability_of(&recs, RecommendedActivity::Hiking), Some(Suitability::Moderate));
        let humid = recommend_activities(18.0, "Clear", 5.0, 85.0);
        assert_eq!(suitability_of(&humid, RecommendedActivity::Hiking), None);
    }

    #[test]
    fn test_wind_direction() {
        assert_eq!(wind_direction(0.0), "N");
        assert_eq!(wind_direction(350.0), "N");
        assert_eq!(wind_direction(90.0), "E");
        assert_eq!(wind_direction(225.0), "SW");
        assert_eq!(wind_direction(-90.0), "W");
    }

    #[test]
    fn test_parse_current_converts_wind() {
        let json = r#"{
            "name": "Oslo",
            "main": {"temp": 14.2, "feels_like": 13.1, "humidity": 71},
            "wind": {"speed": 5.0, "deg": 200},
            "weather": [{"main": "Clouds", "description": "broken clouds"}]
        }"#;
        let current = parse_current(json).unwrap();
        assert_eq!(current.location_name, "Oslo");
        assert!((current.wind_kmh - 18.0).abs() < 1e-9);
        assert_eq!(current.condition, "Clouds");
        assert_eq!(current.wind_label(), "18 km/h SSW");
    }

    #[test]
    fn test_parse_forecast_and_group_days() {
        let json = r#"{"list": [
            {"dt": 1718424000, "main": {"temp": 12.0}, "weather": [{"main": "Rain"}]},
            {"dt": 1718434800, "main": {"temp": 17.5}, "weather": [{"main": "Clouds"}]},
            {"dt": 1718445600, "main": {"temp": 15.0}, "weather": [{"main": "Clouds"}]},
            {"dt": 1718510400, "main": {"temp": 20.0}, "weather": [{"main": "Clear"}]}
        ]}"#;
        let entries = parse_forecast(json).unwrap();
        assert_eq!(entries.len(), 4);

        let days = daily_forecast(&entries);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].high_c, 17.5);
        assert_eq!(days[0].low_c, 12.0);
        assert_eq!(days[0].condition, "Clouds");
        assert_eq!(days[1].condition, "Clear");
    }

    #[test]
    fn test_summary_limits_hourly() {
        let current = CurrentConditions {
            location_name: "Test".to_string(),
            temp_c: 20.0,
            feels_like_c: 20.0,
            humidity_pct: 40.0,
            wind_kmh: 5.0,
            wind_deg: 0.0,
            condition: "Clear".to_string(),
            description: "clear sky".to_string(),
        };
        let forecast: Vec<ForecastEntry> = (0..40)
            .map(|i| ForecastEntry {
                time: DateTime::from_timestamp(1_718_409_600 + i * 10_800, 0).unwrap(),
                temp_c: 15.0,
                condition: "Clear".to_string(),
            })
            .collect();
        let summary = WeatherSummary::new(current, &forecast);
        assert_eq!(summary.hourly.len(), 8);
        assert_eq!(summary.daily.len(), 5);
        assert_eq!(summary.recommendations.len(), 3);
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_client_rejects_empty_key() {
        assert!(matches!(
            WeatherClient::new("  "),
            Err(TrackerError::Config { .. })
        ));
    }
}
