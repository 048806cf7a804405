//! Open-Meteo forecast client and prompt-context summarization.
//!
//! Fetches today's hourly temperature / precipitation / cloud-cover series
//! and condenses the remaining hours of the day into eight coarse segments
//! with human-readable sky and rainfall descriptions.

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Deserialize;
use std::time::Duration;

use crate::config::Settings;

/// Request timeout for the forecast call.
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Number of segments the day is condensed into.
const SEGMENT_COUNT: usize = 8;

/// Errors from forecast fetching and summarization.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No hourly data returned from Open-Meteo")]
    NoHourlyData,
}

pub type Result<T> = std::result::Result<T, WeatherError>;

/// Wire format of the Open-Meteo hourly block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlySeries {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub precipitation: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
}

/// Wire format of the forecast response (fields we consume).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Forecast {
    #[serde(default)]
    pub hourly: HourlySeries,
}

/// One hourly sample, joined across the parallel series.
#[derive(Debug, Clone)]
pub struct HourSample {
    pub at: NaiveDateTime,
    pub temp: Option<f64>,
    pub precip: Option<f64>,
    pub cloud: Option<f64>,
}

/// Template variables derived from the forecast.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub width: u32,
    pub height: u32,
    pub temp_min: String,
    pub temp_max: String,
    pub temp_range: String,
    pub segments_summary: String,
    pub date: String,
}

impl PromptContext {
    /// Flatten into (key, value) pairs for template rendering.
    pub fn variables(&self) -> Vec<(&'static str, String)> {
        vec![
            ("width", self.width.to_string()),
            ("height", self.height.to_string()),
            ("temp_min", self.temp_min.clone()),
            ("temp_max", self.temp_max.clone()),
            ("temp_range", self.temp_range.clone()),
            ("segments_summary", self.segments_summary.clone()),
            ("date", self.date.clone()),
        ]
    }
}

/// Fetch today's hourly forecast for the configured location.
pub async fn fetch_forecast(settings: &Settings) -> Result<Forecast> {
    let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
    let forecast = client
        .get(&settings.open_meteo_url)
        .query(&[
            ("latitude", settings.latitude.to_string()),
            ("longitude", settings.longitude.to_string()),
            (
                "hourly",
                "temperature_2m,precipitation,cloud_cover".to_string(),
            ),
            ("timezone", settings.timezone.clone()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(forecast)
}

/// Build the prompt context from a forecast and the local clock.
pub fn build_prompt_context(
    settings: &Settings,
    forecast: &Forecast,
    now: NaiveDateTime,
) -> Result<PromptContext> {
    let hours = remaining_hours_today(&forecast.hourly, now);
    if hours.is_empty() {
        return Err(WeatherError::NoHourlyData);
    }

    let temps: Vec<f64> = hours.iter().filter_map(|h| h.temp).collect();
    let (temp_min, temp_max) = if temps.is_empty() {
        (String::new(), String::new())
    } else {
        let min = temps.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = temps.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        (
            format!("{}", round_half_even(min)),
            format!("{}", round_half_even(max)),
        )
    };
    let temp_range = if temp_min.is_empty() || temp_max.is_empty() {
        "unknown".to_string()
    } else {
        format!("{temp_min}-{temp_max} deg")
    };

    let segments = build_segments(&hours, SEGMENT_COUNT);
    let segments_summary = format_segments_summary(&segments);

    Ok(PromptContext {
        width: settings.image_width,
        height: settings.image_height,
        temp_min,
        temp_max,
        temp_range,
        segments_summary,
        date: now.date().format("%Y-%m-%d").to_string(),
    })
}

/// Round to the nearest integer, ties to even: 12.5 -> 12, 13.5 -> 14.
fn round_half_even(value: f64) -> i64 {
    let floor = value.floor();
    if value - floor == 0.5 {
        let below = floor as i64;
        if below % 2 == 0 {
            below
        } else {
            below + 1
        }
    } else {
        value.round() as i64
    }
}

/// Hours of today at or after `now`; when none remain, all of today's hours.
pub fn remaining_hours_today(hourly: &HourlySeries, now: NaiveDateTime) -> Vec<HourSample> {
    let today = now.date();
    let samples = join_samples(hourly, today);

    let remaining: Vec<HourSample> = samples.iter().filter(|h| h.at >= now).cloned().collect();
    if remaining.is_empty() {
        samples
    } else {
        remaining
    }
}

fn join_samples(hourly: &HourlySeries, today: NaiveDate) -> Vec<HourSample> {
    let mut samples = Vec::new();
    for (idx, raw) in hourly.time.iter().enumerate() {
        let Some(at) = parse_hour(raw) else { continue };
        if at.date() != today {
            continue;
        }
        samples.push(HourSample {
            at,
            temp: hourly.temperature_2m.get(idx).copied().flatten(),
            precip: hourly.precipitation.get(idx).copied().flatten(),
            cloud: hourly.cloud_cover.get(idx).copied().flatten(),
        });
    }
    samples
}

/// Open-Meteo emits local ISO timestamps without seconds.
fn parse_hour(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// A condensed slice of the day.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_time: String,
    pub end_time: String,
    pub cloud_desc: &'static str,
    pub precip_desc: &'static str,
}

/// Split `hours` into `count` index-proportional segments.
pub fn build_segments(hours: &[HourSample], count: usize) -> Vec<Segment> {
    if hours.is_empty() {
        return Vec::new();
    }
    let total = hours.len();
    let mut segments = Vec::with_capacity(count);
    for idx in 0..count {
        let mut start = idx * total / count;
        let mut end = (idx + 1) * total / count;
        if start >= total {
            start = total - 1;
        }
        if end <= start {
            end = (start + 1).min(total);
        }
        segments.push(summarize_segment(&hours[start..end]));
    }
    segments
}

fn summarize_segment(slice: &[HourSample]) -> Segment {
    let clouds: Vec<f64> = slice.iter().filter_map(|h| h.cloud).collect();
    let precip: Vec<f64> = slice.iter().filter_map(|h| h.precip).collect();
    let avg = |values: &[f64]| {
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    };

    let fmt = |at: &NaiveDateTime| format!("{:02}:{:02}", at.hour(), at.minute());
    Segment {
        start_time: fmt(&slice[0].at),
        end_time: fmt(&slice[slice.len() - 1].at),
        cloud_desc: describe_cloud_cover(avg(&clouds)),
        precip_desc: describe_precipitation(avg(&precip)),
    }
}

/// Bucket average cloud cover (percent) into a description.
pub fn describe_cloud_cover(cloud_cover: Option<f64>) -> &'static str {
    match cloud_cover {
        None => "unknown cloud cover",
        Some(c) if c < 20.0 => "clear skies",
        Some(c) if c < 40.0 => "mostly clear skies",
        Some(c) if c < 60.0 => "partly cloudy skies",
        Some(c) if c < 80.0 => "mostly cloudy skies",
        Some(_) => "overcast skies",
    }
}

/// Bucket average precipitation (mm) into a description.
pub fn describe_precipitation(precip_mm: Option<f64>) -> &'static str {
    match precip_mm {
        None => "unknown rainfall",
        Some(p) if p < 0.1 => "no rain",
        Some(p) if p < 0.5 => "very light rain",
        Some(p) if p < 2.0 => "light rain",
        Some(p) if p < 5.0 => "moderate rain",
        Some(_) => "heavy rain",
    }
}

/// Render segments as `"1) 09:00-11:00: clear skies, no rain | 2) ..."`.
pub fn format_segments_summary(segments: &[Segment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            format!(
                "{}) {}-{}: {}, {}",
                idx + 1,
                s.start_time,
                s.end_time,
                s.cloud_desc,
                s.precip_desc
            )
        })
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(times: &[&str]) -> HourlySeries {
        HourlySeries {
            time: times.iter().map(|t| t.to_string()).collect(),
            temperature_2m: times.iter().map(|_| Some(20.0)).collect(),
            precipitation: times.iter().map(|_| Some(0.0)).collect(),
            cloud_cover: times.iter().map(|_| Some(10.0)).collect(),
        }
    }

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M").unwrap()
    }

    #[test]
    fn halfway_temperatures_round_to_even() {
        assert_eq!(round_half_even(12.5), 12);
        assert_eq!(round_half_even(13.5), 14);
        assert_eq!(round_half_even(-12.5), -12);
        assert_eq!(round_half_even(12.4), 12);
        assert_eq!(round_half_even(12.6), 13);
    }

    #[test]
    fn cloud_cover_buckets() {
        assert_eq!(describe_cloud_cover(None), "unknown cloud cover");
        assert_eq!(describe_cloud_cover(Some(5.0)), "clear skies");
        assert_eq!(describe_cloud_cover(Some(25.0)), "mostly clear skies");
        assert_eq!(describe_cloud_cover(Some(50.0)), "partly cloudy skies");
        assert_eq!(describe_cloud_cover(Some(70.0)), "mostly cloudy skies");
        assert_eq!(describe_cloud_cover(Some(95.0)), "overcast skies");
    }

    #[test]
    fn precipitation_buckets() {
        assert_eq!(describe_precipitation(None), "unknown rainfall");
        assert_eq!(describe_precipitation(Some(0.0)), "no rain");
        assert_eq!(describe_precipitation(Some(0.3)), "very light rain");
        assert_eq!(describe_precipitation(Some(1.0)), "light rain");
        assert_eq!(describe_precipitation(Some(3.0)), "moderate rain");
        assert_eq!(describe_precipitation(Some(10.0)), "heavy rain");
    }

    #[test]
    fn remaining_hours_skips_past_and_other_days() {
        let hourly = series(&[
            "2026-08-30T08:00",
            "2026-08-30T12:00",
            "2026-08-30T18:00",
            "2026-08-31T08:00",
        ]);
        let hours = remaining_hours_today(&hourly, at("2026-08-30T10:00"));
        let times: Vec<_> = hours.iter().map(|h| h.at.hour()).collect();
        assert_eq!(times, vec![12, 18]);
    }

    #[test]
    fn remaining_hours_falls_back_to_whole_day() {
        let hourly = series(&["2026-08-30T08:00", "2026-08-30T09:00"]);
        let hours = remaining_hours_today(&hourly, at("2026-08-30T23:00"));
        assert_eq!(hours.len(), 2);
    }

    #[test]
    fn unparseable_times_are_skipped() {
        let mut hourly = series(&["2026-08-30T08:00"]);
        hourly.time.push("not-a-time".to_string());
        let hours = remaining_hours_today(&hourly, at("2026-08-30T00:00"));
        assert_eq!(hours.len(), 1);
    }

    #[test]
    fn segments_cover_the_day_in_order() {
        let hourly = series(&[
            "2026-08-30T08:00",
            "2026-08-30T09:00",
            "2026-08-30T10:00",
            "2026-08-30T11:00",
        ]);
        let hours = remaining_hours_today(&hourly, at("2026-08-30T00:00"));
        let segments = build_segments(&hours, 8);
        assert_eq!(segments.len(), 8);
        assert_eq!(segments[0].start_time, "08:00");
        assert_eq!(segments[7].end_time, "11:00");
    }

    #[test]
    fn summary_format_is_numbered_and_pipe_joined() {
        let segments = vec![
            Segment {
                start_time: "08:00".into(),
                end_time: "10:00".into(),
                cloud_desc: "clear skies",
                precip_desc: "no rain",
            },
            Segment {
                start_time: "10:00".into(),
                end_time: "12:00".into(),
                cloud_desc: "overcast skies",
                precip_desc: "light rain",
            },
        ];
        assert_eq!(
            format_segments_summary(&segments),
            "1) 08:00-10:00: clear skies, no rain | 2) 10:00-12:00: overcast skies, light rain"
        );
    }

    #[test]
    fn prompt_context_rounds_temperatures() {
        let mut hourly = series(&["2026-08-30T08:00", "2026-08-30T09:00"]);
        hourly.temperature_2m = vec![Some(12.4), Some(21.6)];
        let forecast = Forecast { hourly };
        let settings = Settings::from_env();
        let ctx = build_prompt_context(&settings, &forecast, at("2026-08-30T00:00")).unwrap();
        assert_eq!(ctx.temp_min, "12");
        assert_eq!(ctx.temp_max, "22");
        assert_eq!(ctx.temp_range, "12-22 deg");
        assert_eq!(ctx.date, "2026-08-30");
    }

    #[test]
    fn empty_forecast_is_an_error() {
        let forecast = Forecast::default();
        let settings = Settings::from_env();
        let err = build_prompt_context(&settings, &forecast, at("2026-08-30T00:00"));
        assert!(matches!(err, Err(WeatherError::NoHourlyData)));
    }
}
