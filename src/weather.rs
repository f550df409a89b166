/*
 *  weather.rs
 *
 *  LumaDeck - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Open-Meteo weather provider and background poller
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use serde::{Deserialize, Serialize};
use serde_json::Value;
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;
use std::io::Read;
use log::{info, warn, error};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use chrono::{DateTime, Local, NaiveDate};
use flate2::read::GzDecoder;
use mini_moka::sync::Cache;

use crate::constants::WEATHER_CACHE_TTL;
use crate::error::{WidgetError, WidgetResult};
use crate::BoxFuture;

const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const AIR_QUALITY_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "f" | "fahrenheit" | "imperial" => Units::Imperial,
            _ => Units::Metric,
        }
    }

    pub fn temperature_symbol(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn wind_symbol(self) -> &'static str {
        match self {
            Units::Metric => "km/h",
            Units::Imperial => "mph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    /// "lat,lon"
    pub fn parse(s: &str) -> WidgetResult<Self> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| WidgetError::Config(format!("location must be \"lat,lon\": {s}")))?;
        let lat: f64 = lat.trim().parse().map_err(|_| WidgetError::Config(format!("bad latitude: {lat}")))?;
        let lon: f64 = lon.trim().parse().map_err(|_| WidgetError::Config(format!("bad longitude: {lon}")))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(WidgetError::Config(format!("location out of range: {s}")));
        }
        Ok(Self { lat, lon })
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub temperature: f64,
    pub apparent_temperature: f64,
    pub humidity: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    pub weather_code: i64,
    pub description: String,
    pub is_day: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub weather_code: i64,
    pub description: String,
    pub precipitation_probability: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastData {
    pub days: Vec<ForecastDay>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualityData {
    pub us_aqi: Option<f64>,
    pub pm2_5: Option<f64>,
    pub pm10: Option<f64>,
}

/// WMO weather interpretation codes.
pub fn describe_wmo(code: i64) -> &'static str {
    match code {
        0 => "Clear",
        1 => "Mostly Clear",
        2 => "Partly Cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 | 53 | 55 => "Drizzle",
        56 | 57 => "Freezing Drizzle",
        61 => "Light Rain",
        63 => "Rain",
        65 => "Heavy Rain",
        66 | 67 => "Freezing Rain",
        71 => "Light Snow",
        73 => "Snow",
        75 => "Heavy Snow",
        77 => "Snow Grains",
        80..=82 => "Showers",
        85 | 86 => "Snow Showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm, Hail",
        _ => "Unknown",
    }
}

fn num(v: &Value, key: &str) -> WidgetResult<f64> {
    v.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| WidgetError::Decode(format!("missing field {key}")))
}

pub fn parse_current(body: &str) -> WidgetResult<WeatherData> {
    let json: Value = serde_json::from_str(body)?;
    let cur = json
        .get("current")
        .ok_or_else(|| WidgetError::Decode("no current block".into()))?;
    let code = num(cur, "weather_code")? as i64;
    Ok(WeatherData {
        temperature: num(cur, "temperature_2m")?,
        apparent_temperature: num(cur, "apparent_temperature").unwrap_or_default(),
        humidity: num(cur, "relative_humidity_2m").unwrap_or_default(),
        wind_speed: num(cur, "wind_speed_10m").unwrap_or_default(),
        wind_direction: num(cur, "wind_direction_10m").unwrap_or_default(),
        weather_code: code,
        description: describe_wmo(code).to_string(),
        is_day: num(cur, "is_day").map(|d| d > 0.0).unwrap_or(true),
    })
}

pub fn parse_forecast(body: &str) -> WidgetResult<ForecastData> {
    let json: Value = serde_json::from_str(body)?;
    let daily = json
        .get("daily")
        .ok_or_else(|| WidgetError::Decode("no daily block".into()))?;
    let col = |k: &str| daily.get(k).and_then(Value::as_array).cloned().unwrap_or_default();
    let times = col("time");
    let codes = col("weather_code");
    let maxs = col("temperature_2m_max");
    let mins = col("temperature_2m_min");
    let precip = col("precipitation_probability_max");

    let mut days = Vec::with_capacity(times.len());
    for (i, t) in times.iter().enumerate() {
        let date = t
            .as_str()
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .ok_or_else(|| WidgetError::Decode(format!("bad forecast date at {i}")))?;
        let code = codes.get(i).and_then(Value::as_i64).unwrap_or(-1);
        days.push(ForecastDay {
            date,
            temperature_min: mins.get(i).and_then(Value::as_f64).unwrap_or_default(),
            temperature_max: maxs.get(i).and_then(Value::as_f64).unwrap_or_default(),
            weather_code: code,
            description: describe_wmo(code).to_string(),
            precipitation_probability: precip.get(i).and_then(Value::as_f64).unwrap_or_default(),
        });
    }
    Ok(ForecastData { days })
}

pub fn parse_air_quality(body: &str) -> WidgetResult<AirQualityData> {
    let json: Value = serde_json::from_str(body)?;
    let cur = json
        .get("current")
        .ok_or_else(|| WidgetError::Decode("no current block".into()))?;
    Ok(AirQualityData {
        us_aqi: cur.get("us_aqi").and_then(Value::as_f64),
        pm2_5: cur.get("pm2_5").and_then(Value::as_f64),
        pm10: cur.get("pm10").and_then(Value::as_f64),
    })
}

pub trait WeatherProvider: Send + Sync {
    fn fetch_current<'a>(&'a self, loc: Location, units: Units) -> BoxFuture<'a, WidgetResult<WeatherData>>;
    fn fetch_forecast<'a>(&'a self, loc: Location, units: Units) -> BoxFuture<'a, WidgetResult<ForecastData>>;
    fn fetch_air_quality<'a>(&'a self, loc: Location) -> BoxFuture<'a, WidgetResult<AirQualityData>>;
}

pub struct OpenMeteo {
    client: Client,
    forecast_url: String,
    air_quality_url: String,
    cache: Cache<String, String>,
}

impl OpenMeteo {
    pub fn new() -> WidgetResult<Self> {
        Self::with_urls(FORECAST_URL, AIR_QUALITY_URL)
    }

    pub fn with_urls(forecast_url: &str, air_quality_url: &str) -> WidgetResult<Self> {
        const VERSION: &str = concat!("LumaDeck ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));
        headers.insert("Accept-Encoding", header::HeaderValue::from_static("gzip"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| WidgetError::NotInitialized(e.to_string()))?;

        let cache = Cache::builder()
            .max_capacity(32)
            .time_to_live(WEATHER_CACHE_TTL)
            .build();

        Ok(Self {
            client,
            forecast_url: forecast_url.to_string(),
            air_quality_url: air_quality_url.to_string(),
            cache,
        })
    }

    fn unit_params(units: Units) -> Vec<(&'static str, String)> {
        match units {
            Units::Metric => vec![],
            Units::Imperial => vec![
                ("temperature_unit", "fahrenheit".to_string()),
                ("wind_speed_unit", "mph".to_string()),
            ],
        }
    }

    async fn send_with_retries(&self, url: &str, params: &[(&str, String)], max_retries: u8) -> Result<String, reqwest::Error> {
        let mut retries = 0;
        loop {
            match self.client.get(url).query(params).send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => {
                    let raw = response.bytes().await?;

                    // gzip when the server honoured Accept-Encoding, plain otherwise
                    let mut decoder = GzDecoder::new(&raw[..]);
                    let mut decoded = String::new();
                    let plain = match decoder.read_to_string(&mut decoded) {
                        Ok(_) => decoded,
                        Err(_) => String::from_utf8_lossy(&raw).to_string(),
                    };
                    return Ok(plain);
                }
                Err(e) => {
                    retries += 1;
                    if retries >= max_retries {
                        return Err(e);
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Cached GET; the key covers url and query.
    async fn get_cached(&self, url: &str, params: &[(&str, String)]) -> WidgetResult<String> {
        let key = format!(
            "{url}?{}",
            params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
        );
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }
        let body = self.send_with_retries(url, params, 3).await?;
        self.cache.insert(key, body.clone());
        Ok(body)
    }
}

impl WeatherProvider for OpenMeteo {
    fn fetch_current<'a>(&'a self, loc: Location, units: Units) -> BoxFuture<'a, WidgetResult<WeatherData>> {
        Box::pin(async move {
            let mut params = vec![
                ("latitude", loc.lat.to_string()),
                ("longitude", loc.lon.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,apparent_temperature,is_day,weather_code,wind_speed_10m,wind_direction_10m".to_string(),
                ),
                ("timezone", "auto".to_string()),
            ];
            params.extend(Self::unit_params(units));
            parse_current(&self.get_cached(&self.forecast_url, &params).await?)
        })
    }

    fn fetch_forecast<'a>(&'a self, loc: Location, units: Units) -> BoxFuture<'a, WidgetResult<ForecastData>> {
        Box::pin(async move {
            let mut params = vec![
                ("latitude", loc.lat.to_string()),
                ("longitude", loc.lon.to_string()),
                (
                    "daily",
                    "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max".to_string(),
                ),
                ("forecast_days", "4".to_string()),
                ("timezone", "auto".to_string()),
            ];
            params.extend(Self::unit_params(units));
            parse_forecast(&self.get_cached(&self.forecast_url, &params).await?)
        })
    }

    fn fetch_air_quality<'a>(&'a self, loc: Location) -> BoxFuture<'a, WidgetResult<AirQualityData>> {
        Box::pin(async move {
            let params = vec![
                ("latitude", loc.lat.to_string()),
                ("longitude", loc.lon.to_string()),
                ("current", "us_aqi,pm10,pm2_5".to_string()),
            ];
            parse_air_quality(&self.get_cached(&self.air_quality_url, &params).await?)
        })
    }
}

/// Everything the weather tile shows, published by the poller.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WeatherConditions {
    pub current: Option<WeatherData>,
    pub forecast: Option<ForecastData>,
    pub air_quality: Option<AirQualityData>,
    pub last_error: Option<WidgetError>,
    pub last_updated: Option<DateTime<Local>>,
}

/// Expand {temp} {unit} {desc} {humidity} {wind} {aqi} {min} {max}.
pub fn format_weather(format: &str, w: &WeatherConditions, units: Units) -> String {
    let Some(cur) = &w.current else {
        return String::new();
    };
    let today = w.forecast.as_ref().and_then(|f| f.days.first());
    let aqi = w
        .air_quality
        .as_ref()
        .and_then(|a| a.us_aqi)
        .map(|v| format!("{v:.0}"))
        .unwrap_or_else(|| "-".into());
    format
        .replace("{temp}", &format!("{:.0}", cur.temperature))
        .replace("{unit}", units.temperature_symbol())
        .replace("{desc}", &cur.description)
        .replace("{humidity}", &format!("{:.0}%", cur.humidity))
        .replace("{wind}", &format!("{:.0}{}", cur.wind_speed, units.wind_symbol()))
        .replace("{aqi}", &aqi)
        .replace("{min}", &today.map(|d| format!("{:.0}", d.temperature_min)).unwrap_or_default())
        .replace("{max}", &today.map(|d| format!("{:.0}", d.temperature_max)).unwrap_or_default())
}

/// One fetch round: current conditions are required, the rest best effort.
pub async fn fetch_conditions(
    provider: &dyn WeatherProvider,
    loc: Location,
    units: Units,
    with_aqi: bool,
    previous: &WeatherConditions,
) -> WeatherConditions {
    let mut next = previous.clone();
    match provider.fetch_current(loc, units).await {
        Ok(cur) => {
            next.current = Some(cur);
            next.last_error = None;
            next.last_updated = Some(Local::now());
        }
        Err(e) => {
            next.last_error = Some(e);
            return next;
        }
    }
    match provider.fetch_forecast(loc, units).await {
        Ok(f) => next.forecast = Some(f),
        Err(e) => warn!("forecast fetch failed: {}", e),
    }
    if with_aqi {
        match provider.fetch_air_quality(loc).await {
            Ok(a) => next.air_quality = Some(a),
            Err(e) => warn!("air quality fetch failed: {}", e),
        }
    }
    next
}

/// Background poller; publishes via watch channel, stops on the mpsc signal.
pub struct WeatherPoller {
    rx: watch::Receiver<WeatherConditions>,
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl WeatherPoller {
    /// Needs a running tokio runtime.
    pub fn start(
        provider: Arc<dyn WeatherProvider>,
        loc: Location,
        units: Units,
        with_aqi: bool,
        interval: Duration,
    ) -> WidgetResult<Self> {
        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| WidgetError::NotInitialized(format!("weather poller: {e}")))?;
        let (tx, rx) = watch::channel(WeatherConditions::default());
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let handle = rt.spawn(async move {
            let mut failing = false;
            loop {
                let prev = tx.borrow().clone();
                let next = fetch_conditions(provider.as_ref(), loc, units, with_aqi, &prev).await;
                match (&next.last_error, failing) {
                    (Some(e), false) => {
                        error!("Weather polling failed: {}", e);
                        failing = true;
                    }
                    (None, true) => {
                        info!("Weather polling recovered.");
                        failing = false;
                    }
                    _ => {}
                }
                tx.send_replace(next);

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop_rx.recv() => {
                        info!("Weather polling task received stop signal. Exiting.");
                        break;
                    }
                }
            }
        });

        Ok(Self { rx, stop_tx, handle })
    }

    pub fn latest(&self) -> WeatherConditions {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WeatherConditions> {
        self.rx.clone()
    }

    pub fn stop(&self) {
        if self.stop_tx.try_send(()).is_err() {
            self.handle.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CURRENT: &str = r#"{"current":{"time":"2026-01-02T10:00","temperature_2m":21.4,"relative_humidity_2m":40,"apparent_temperature":20.0,"is_day":1,"weather_code":61,"wind_speed_10m":12.2,"wind_direction_10m":180}}"#;
    const DAILY: &str = r#"{"daily":{"time":["2026-01-02","2026-01-03"],"weather_code":[3,0],"temperature_2m_max":[23.1,25.0],"temperature_2m_min":[12.0,13.5],"precipitation_probability_max":[80,0]}}"#;

    #[test]
    fn test_parse_current() {
        let w = parse_current(CURRENT).unwrap();
        assert_eq!(w.weather_code, 61);
        assert_eq!(w.description, "Light Rain");
        assert!(w.is_day);
        assert!(parse_current("{}").is_err());
        assert!(matches!(parse_current("nope"), Err(WidgetError::Decode(_))));
    }

    #[test]
    fn test_parse_forecast() {
        let f = parse_forecast(DAILY).unwrap();
        assert_eq!(f.days.len(), 2);
        assert_eq!(f.days[1].description, "Clear");
        assert_eq!(f.days[0].temperature_max, 23.1);
    }

    #[test]
    fn test_location_parse() {
        assert_eq!(Location::parse("51.5, -0.12").unwrap(), Location { lat: 51.5, lon: -0.12 });
        assert!(Location::parse("91,0").is_err());
        assert!(Location::parse("london").is_err());
    }

    #[test]
    fn test_format_weather() {
        let w = WeatherConditions {
            current: Some(parse_current(CURRENT).unwrap()),
            forecast: Some(parse_forecast(DAILY).unwrap()),
            ..WeatherConditions::default()
        };
        assert_eq!(format_weather("{temp}{unit} {desc}", &w, Units::Metric), "21°C Light Rain");
        assert_eq!(format_weather("{min}/{max} aqi {aqi}", &w, Units::Metric), "12/23 aqi -");
        assert_eq!(format_weather("{temp}", &WeatherConditions::default(), Units::Metric), "");
    }

    struct Flaky {
        calls: AtomicUsize,
    }

    impl WeatherProvider for Flaky {
        fn fetch_current<'a>(&'a self, _loc: Location, _units: Units) -> BoxFuture<'a, WidgetResult<WeatherData>> {
            Box::pin(async move {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(WidgetError::Connection("down".into()))
                } else {
                    parse_current(CURRENT)
                }
            })
        }
        fn fetch_forecast<'a>(&'a self, _loc: Location, _units: Units) -> BoxFuture<'a, WidgetResult<ForecastData>> {
            Box::pin(async move { parse_forecast(DAILY) })
        }
        fn fetch_air_quality<'a>(&'a self, _loc: Location) -> BoxFuture<'a, WidgetResult<AirQualityData>> {
            Box::pin(async move { Ok(AirQualityData { us_aqi: Some(42.0), ..Default::default() }) })
        }
    }

    #[tokio::test]
    async fn test_fetch_keeps_previous_on_error() {
        let p = Flaky { calls: AtomicUsize::new(0) };
        let loc = Location { lat: 0.0, lon: 0.0 };
        let first = fetch_conditions(&p, loc, Units::Metric, true, &WeatherConditions::default()).await;
        assert!(first.current.is_none());
        assert!(matches!(first.last_error, Some(WidgetError::Connection(_))));
        let second = fetch_conditions(&p, loc, Units::Metric, true, &first).await;
        assert!(second.last_error.is_none());
        assert_eq!(second.air_quality.unwrap().us_aqi, Some(42.0));
    }

    #[tokio::test]
    async fn test_poller_publishes_and_stops() {
        let p: Arc<dyn WeatherProvider> = Arc::new(Flaky { calls: AtomicUsize::new(1) });
        let poller = WeatherPoller::start(p, Location { lat: 0.0, lon: 0.0 }, Units::Metric, false, Duration::from_secs(60)).unwrap();
        let mut rx = poller.subscribe();
        rx.changed().await.unwrap();
        assert!(poller.latest().current.is_some());
        poller.stop();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(poller.is_finished());
    }
}
