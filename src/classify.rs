/*
 *  classify.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Airport weather records and lightning / high wind classification
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

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use embedded_graphics::pixelcolor::Rgb888;
use log::info;

use crate::constants::{BLUE, GREEN, GREY, LIGHTNING_VOCABULARY, MAGENTA, MISSING_CATEGORY, RED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FlightCategory {
    Vfr,
    Mvfr,
    Ifr,
    Lifr,
    #[default]
    None,
}

impl FlightCategory {
    /// Marker color
    pub fn color(self) -> Rgb888 {
        match self {
            FlightCategory::Vfr => GREEN,
            FlightCategory::Mvfr => BLUE,
            FlightCategory::Ifr => RED,
            FlightCategory::Lifr => MAGENTA,
            FlightCategory::None => GREY,
        }
    }
}

impl FromStr for FlightCategory {
    type Err = std::convert::Infallible;

    /// Anything unrecognised is NONE
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "VFR" => FlightCategory::Vfr,
            "MVFR" => FlightCategory::Mvfr,
            "IFR" => FlightCategory::Ifr,
            "LIFR" => FlightCategory::Lifr,
            _ => FlightCategory::None,
        })
    }
}

impl fmt::Display for FlightCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlightCategory::Vfr => "VFR",
            FlightCategory::Mvfr => "MVFR",
            FlightCategory::Ifr => "IFR",
            FlightCategory::Lifr => "LIFR",
            FlightCategory::None => MISSING_CATEGORY,
        };
        f.write_str(s)
    }
}

/// Latest observation for one station. Missing feed fields hold their
/// sentinel: category NONE, zero position and wind, empty weather.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Airport {
    pub station: String,
    pub lat: f64,
    pub lon: f64,
    pub category: FlightCategory,
    pub wind_speed_kt: u32,
    pub wind_gust_kt: u32,
    pub wind_dir_deg: u32,
    pub wx: String,
}

impl Airport {
    pub fn new(station: &str) -> Self {
        Self { station: station.to_string(), ..Default::default() }
    }

    pub fn has_lightning(&self) -> bool {
        self.wx
            .split_whitespace()
            .map(|tok| tok.trim_start_matches(['+', '-']))
            .any(|tok| LIGHTNING_VOCABULARY.contains(&tok))
    }

    /// Wind used for the high wind test
    pub fn effective_wind(&self, use_gusts: bool) -> u32 {
        if use_gusts { self.wind_speed_kt.max(self.wind_gust_kt) } else { self.wind_speed_kt }
    }
}

/// One complete fetch, replaced as a whole on every refresh
#[derive(Debug, Clone, PartialEq)]
pub struct MetarSnapshot {
    pub airports: BTreeMap<String, Airport>,
    pub fetched_at: DateTime<Utc>,
}

impl MetarSnapshot {
    /// Later records for the same station replace earlier ones
    pub fn from_records<I: IntoIterator<Item = Airport>>(records: I, fetched_at: DateTime<Utc>) -> Self {
        let airports = records.into_iter().map(|a| (a.station.clone(), a)).collect();
        Self { airports, fetched_at }
    }

    pub fn len(&self) -> usize {
        self.airports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airports.is_empty()
    }

    pub fn get(&self, station: &str) -> Option<&Airport> {
        self.airports.get(station)
    }
}

/// A snapshot and the stations that animate
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub snapshot: MetarSnapshot,
    pub lightning: BTreeSet<String>,
    pub high_wind: BTreeSet<String>,
}

impl Classification {
    pub fn lightning_airports(&self) -> impl Iterator<Item = &Airport> {
        self.lightning.iter().filter_map(|s| self.snapshot.get(s))
    }

    pub fn high_wind_airports(&self) -> impl Iterator<Item = &Airport> {
        self.high_wind.iter().filter_map(|s| self.snapshot.get(s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherClassifier {
    pub threshold_kt: u32,
    pub use_gusts: bool,
}

impl WeatherClassifier {
    pub fn new(threshold_kt: u32, use_gusts: bool) -> Self {
        Self { threshold_kt, use_gusts }
    }

    /// Partition a snapshot; both sets start empty on every call
    pub fn classify(&self, snapshot: MetarSnapshot) -> Classification {
        let mut lightning = BTreeSet::new();
        let mut high_wind = BTreeSet::new();

        for (station, ap) in &snapshot.airports {
            if ap.has_lightning() {
                lightning.insert(station.clone());
            }
            if ap.effective_wind(self.use_gusts) >= self.threshold_kt {
                high_wind.insert(station.clone());
            }
        }

        info!(
            "Classified {} stations: {} lightning, {} high wind",
            snapshot.len(),
            lightning.len(),
            high_wind.len()
        );
        Classification { snapshot, lightning, high_wind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ap(station: &str, wx: &str, wind: u32) -> Airport {
        Airport { wx: wx.into(), wind_speed_kt: wind, ..Airport::new(station) }
    }

    fn snapshot(records: Vec<Airport>) -> MetarSnapshot {
        MetarSnapshot::from_records(records, Utc::now())
    }

    #[test]
    fn test_category_parse_and_color() {
        assert_eq!("vfr".parse::<FlightCategory>().unwrap(), FlightCategory::Vfr);
        assert_eq!("LIFR".parse::<FlightCategory>().unwrap(), FlightCategory::Lifr);
        assert_eq!("".parse::<FlightCategory>().unwrap(), FlightCategory::None);
        assert_eq!(FlightCategory::Vfr.color(), Rgb888::new(0, 200, 0));
        assert_eq!(FlightCategory::None.to_string(), "NONE");
    }

    #[test]
    fn test_lightning_tokens() {
        assert!(ap("K1", "TSRA", 0).has_lightning());
        assert!(ap("K1", "-RA +TSRA BR", 0).has_lightning());
        assert!(ap("K1", "VCTS", 0).has_lightning());
        assert!(!ap("K1", "RA BR", 0).has_lightning());
        // substring of another token does not count
        assert!(!ap("K1", "TSX", 0).has_lightning());
        assert!(!ap("K1", "", 40).has_lightning());
    }

    #[test]
    fn test_thunderstorm_and_empty_weather() {
        let c = WeatherClassifier::new(15, false)
            .classify(snapshot(vec![ap("KTS", "TSRA", 0), ap("KCLR", "", 30)]));
        assert!(c.lightning.contains("KTS"));
        assert!(!c.lightning.contains("KCLR"));
        assert!(c.high_wind.contains("KCLR"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let c = WeatherClassifier::new(10, false)
            .classify(snapshot(vec![ap("KTEN", "", 10), ap("KNINE", "", 9)]));
        assert!(c.high_wind.contains("KTEN"));
        assert!(!c.high_wind.contains("KNINE"));
    }

    #[test]
    fn test_gusts_count_only_when_enabled() {
        let gusty = Airport { wind_gust_kt: 25, ..ap("KGST", "", 8) };
        let plain = WeatherClassifier::new(15, false).classify(snapshot(vec![gusty.clone()]));
        assert!(plain.high_wind.is_empty());
        let gusts = WeatherClassifier::new(15, true).classify(snapshot(vec![gusty]));
        assert!(gusts.high_wind.contains("KGST"));
    }

    #[test]
    fn test_sets_have_no_orphans_and_are_rebuilt() {
        let classifier = WeatherClassifier::new(15, false);
        let first = classifier.classify(snapshot(vec![ap("KA", "TS", 20), ap("KB", "", 0)]));
        for s in first.lightning.iter().chain(first.high_wind.iter()) {
            assert!(first.snapshot.get(s).is_some());
        }
        assert_eq!(first.lightning_airports().count(), 1);

        // conditions cleared: nothing carried over
        let second = classifier.classify(snapshot(vec![ap("KA", "", 3)]));
        assert!(second.lightning.is_empty());
        assert!(second.high_wind.is_empty());
    }
}
