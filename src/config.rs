/*
 *  config.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Layered runtime settings: defaults, YAML settings file, CLI overrides
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

use chrono::NaiveTime;
use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::constants::*;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level runtime settings.
///
/// Every group is `#[serde(default)]` so the settings file written by the
/// control panel only needs to carry what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    /// Regions shown in turn, one per refresh interval
    pub regions: Vec<String>,
    pub data: DataPaths,
    pub feed: FeedSettings,
    pub panel: PanelConfig,
    pub outline: OutlineSettings,
    pub animation: AnimationSettings,
    pub brightness: BrightnessSettings,
    pub transition: TransitionSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: None,
            regions: vec!["COLORADO".to_string()],
            data: DataPaths::default(),
            feed: FeedSettings::default(),
            panel: PanelConfig::default(),
            outline: OutlineSettings::default(),
            animation: AnimationSettings::default(),
            brightness: BrightnessSettings::default(),
            transition: TransitionSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    /// Region catalog: airports per region, custom layouts, aliases
    pub catalog: PathBuf,
    /// Square and rectangular scale tables
    pub scale_profiles: PathBuf,
    /// GeoJSON with one feature per named region
    pub region_shapes: PathBuf,
    /// GeoJSON for the continental outline
    pub continental_shape: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        Self {
            catalog: PathBuf::from("data/regions.yaml"),
            scale_profiles: PathBuf::from("data/scale_profiles.yaml"),
            region_shapes: PathBuf::from("data/states.geojson"),
            continental_shape: PathBuf::from("data/usa.geojson"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
    pub url: String,
    pub max_age_hours: f64,
    pub chunk_size: usize,
    pub retry_backoff_secs: u64,
    /// None retries forever
    pub max_attempts: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            max_age_hours: DEFAULT_METAR_AGE_HOURS,
            chunk_size: MAX_STATIONS_PER_REQUEST,
            retry_backoff_secs: DEFAULT_RETRY_BACKOFF_SECS,
            max_attempts: None,
            timeout_secs: FEED_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PanelKind {
    /// In-memory panel (headless, optional PPM snapshot)
    Memory,
    /// Dynamically loaded panel plugin
    Plugin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
    pub chain_length: u32,
    pub parallel: u32,
    pub driver: PanelKind,
    /// Panel type, e.g. "rgbmatrix" -> libledmap_rgbmatrix.so, or a path
    /// to the driver library
    pub plugin: String,
    pub hardware_mapping: String,
    pub gpio_slowdown: u32,
    /// Memory panel only: write each shown frame here
    pub snapshot: Option<PathBuf>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            rows: 32,
            cols: 64,
            chain_length: 1,
            parallel: 1,
            driver: PanelKind::Memory,
            plugin: "rgbmatrix".to_string(),
            hardware_mapping: "adafruit-hat".to_string(),
            gpio_slowdown: 1,
            snapshot: None,
        }
    }
}

impl PanelConfig {
    /// Chained and parallel panels as one canvas; None when the product
    /// does not fit a pixel coordinate.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let w = self.cols.checked_mul(self.chain_length)?;
        let h = self.rows.checked_mul(self.parallel)?;
        (w <= i32::MAX as u32 && h <= i32::MAX as u32).then_some((w, h))
    }

    pub fn width(&self) -> u32 {
        self.cols.saturating_mul(self.chain_length)
    }

    pub fn height(&self) -> u32 {
        self.rows.saturating_mul(self.parallel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutlineStyle {
    Points,
    Lines,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    pub enabled: bool,
    pub style: OutlineStyle,
    /// Use every n-th ring point
    pub step: usize,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self { enabled: true, style: OutlineStyle::Lines, step: 1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BlinkMode {
    /// Each high wind station blinks on its own, in turn
    Single,
    /// All high wind stations blink together with one swap
    Batched,
}

/// Durations used by the lightning and wind effects, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectTimings {
    /// Hold between big flash toggles
    pub flash_toggle_ms: u64,
    /// Pause after a big flash restores the map
    pub flash_settle_ms: u64,
    /// Small flash: white, yellow, full yellow, restore
    pub flicker_steps_ms: [u64; 4],
    pub flicker_repeats: u32,
    /// Single mode: how long each station stays dark
    pub blink_single_ms: u64,
    /// Batched mode: how long the blinked frame stays up, and the recovery after
    pub blink_batched_ms: u64,
}

impl Default for EffectTimings {
    fn default() -> Self {
        Self {
            flash_toggle_ms: 100,
            flash_settle_ms: 300,
            flicker_steps_ms: [100, 100, 200, 200],
            flicker_repeats: 2,
            blink_single_ms: 500,
            blink_batched_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    pub refresh_secs: u64,
    pub phase_waits_ms: [u64; PHASE_COUNT],
    pub cycle_settle_ms: u64,
    pub lightning: bool,
    pub big_flash: bool,
    pub flash_size: u32,
    /// Must be odd so the map is left showing the flash frame before restore
    pub flash_count: u32,
    pub hiwind: bool,
    pub hiwind_threshold_kt: u32,
    pub hiwind_use_gusts: bool,
    pub blink_mode: BlinkMode,
    pub timings: EffectTimings,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            refresh_secs: DEFAULT_REFRESH_SECS,
            phase_waits_ms: DEFAULT_PHASE_WAITS_MS,
            cycle_settle_ms: CYCLE_SETTLE_MS,
            lightning: true,
            big_flash: true,
            flash_size: DEFAULT_FLASH_SIZE,
            flash_count: DEFAULT_FLASH_COUNT,
            hiwind: true,
            hiwind_threshold_kt: DEFAULT_HIWIND_THRESHOLD_KT,
            hiwind_use_gusts: false,
            blink_mode: BlinkMode::Batched,
            timings: EffectTimings::default(),
        }
    }
}

impl AnimationSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessSettings {
    pub default_percent: u8,
    pub lightning_percent: u8,
    pub hiwind_percent: u8,
    /// "HH:MM", 24 hour clock
    pub dim_start: String,
    pub dim_end: String,
    pub dim_divisor: u8,
}

impl Default for BrightnessSettings {
    fn default() -> Self {
        Self {
            default_percent: DEFAULT_BRIGHTNESS,
            lightning_percent: LIGHTNING_BRIGHTNESS,
            hiwind_percent: HIWIND_BRIGHTNESS,
            dim_start: DEFAULT_DIM_START.to_string(),
            dim_end: DEFAULT_DIM_END.to_string(),
            dim_divisor: DIM_DIVISOR,
        }
    }
}

impl BrightnessSettings {
    pub fn dim_window(&self) -> Result<(NaiveTime, NaiveTime), ConfigError> {
        Ok((parse_clock(&self.dim_start)?, parse_clock(&self.dim_end)?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    pub clock: bool,
    pub clock_secs: u64,
    pub wipe: bool,
    pub wipe_step_ms: u64,
    pub title: bool,
    pub title_secs: u64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            clock: true,
            clock_secs: 5,
            wipe: true,
            wipe_step_ms: 20,
            title: true,
            title_secs: 3,
        }
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "ledmap", about = "Aviation weather map for RGB LED matrices", version)]
pub struct Cli {
    /// Path to a YAML settings file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Verbose logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Comma separated region rotation, e.g. "COLORADO,ARIZONA,USA"
    #[arg(long, value_delimiter = ',')]
    pub regions: Option<Vec<String>>,
    #[arg(long)]
    pub refresh_secs: Option<u64>,
    #[arg(long)]
    pub metar_age: Option<f64>,
    #[arg(long)]
    pub hiwind_threshold: Option<u32>,
    #[arg(long, value_enum)]
    pub blink_mode: Option<BlinkMode>,
    #[arg(long, action = ArgAction::Set)]
    pub lightning: Option<bool>,
    #[arg(long, action = ArgAction::Set)]
    pub outline: Option<bool>,
    #[arg(long, value_enum)]
    pub outline_style: Option<OutlineStyle>,
    #[arg(long)]
    pub brightness: Option<u8>,
    #[arg(long, value_enum)]
    pub driver: Option<PanelKind>,
    #[arg(long)]
    pub panel_rows: Option<u32>,
    #[arg(long)]
    pub panel_cols: Option<u32>,
    #[arg(long)]
    pub chain_length: Option<u32>,
    #[arg(long)]
    pub parallel: Option<u32>,
    /// Memory panel: write each shown frame to this PPM file
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub snapshot: Option<PathBuf>,
    /// Skip clock, wipe and title between regions
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_transitions: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<(Settings, Cli), ConfigError> {
    let cli = Cli::parse();
    let settings = load_with(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&settings)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok((settings, cli))
}

/// Layer defaults, the settings file and `cli`, then validate.
pub fn load_with(cli: &Cli) -> Result<Settings, ConfigError> {
    // 1) defaults, 2) YAML file (explicit path or search)
    let mut settings = if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            read_yaml(p)?
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        read_yaml(&p)?
    } else {
        Settings::default()
    };

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut settings, cli);

    // 4) Validate
    validate(&settings)?;
    Ok(settings)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/ledmap/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/ledmap/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/ledmap.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["ledmap.yaml", "config/ledmap.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

pub fn read_yaml(path: &Path) -> Result<Settings, ConfigError> {
    let s = fs::read_to_string(path)?;
    let settings: Settings = serde_yaml::from_str(&s)?;
    Ok(settings)
}

fn apply_cli_overrides(cfg: &mut Settings, cli: &Cli) {
    if cli.log_level.is_some()            { cfg.log_level = cli.log_level.clone(); }
    if let Some(r) = cli.regions.as_ref() { cfg.regions = r.clone(); }
    if let Some(v) = cli.refresh_secs     { cfg.animation.refresh_secs = v; }
    if let Some(v) = cli.metar_age        { cfg.feed.max_age_hours = v; }
    if let Some(v) = cli.hiwind_threshold { cfg.animation.hiwind_threshold_kt = v; }
    if let Some(v) = cli.blink_mode       { cfg.animation.blink_mode = v; }
    if let Some(v) = cli.lightning        { cfg.animation.lightning = v; }
    if let Some(v) = cli.outline          { cfg.outline.enabled = v; }
    if let Some(v) = cli.outline_style    { cfg.outline.style = v; }
    if let Some(v) = cli.brightness       { cfg.brightness.default_percent = v; }
    if let Some(v) = cli.driver           { cfg.panel.driver = v; }
    if let Some(v) = cli.panel_rows       { cfg.panel.rows = v; }
    if let Some(v) = cli.panel_cols       { cfg.panel.cols = v; }
    if let Some(v) = cli.chain_length     { cfg.panel.chain_length = v; }
    if let Some(v) = cli.parallel         { cfg.panel.parallel = v; }
    if cli.snapshot.is_some()             { cfg.panel.snapshot = cli.snapshot.clone(); }
    if cli.no_transitions {
        cfg.transition.clock = false;
        cfg.transition.wipe = false;
        cfg.transition.title = false;
    }
}

/// Put any invariants here (required fields, ranges, etc.)
pub fn validate(cfg: &Settings) -> Result<(), ConfigError> {
    if cfg.regions.is_empty() {
        return Err(ConfigError::Validation("at least one region is required".into()));
    }
    match cfg.panel.dimensions() {
        None => {
            return Err(ConfigError::Validation(format!(
                "panel {}x{} chained {}x{} is too large",
                cfg.panel.cols, cfg.panel.rows, cfg.panel.chain_length, cfg.panel.parallel)));
        }
        Some((w, h)) if w == 0 || h == 0 => {
            return Err(ConfigError::Validation("panel rows/cols/chain_length/parallel must be > 0".into()));
        }
        Some(_) => {}
    }
    if cfg.outline.step == 0 {
        return Err(ConfigError::Validation("outline step must be >= 1".into()));
    }
    if cfg.feed.chunk_size == 0 || cfg.feed.chunk_size > MAX_STATIONS_PER_REQUEST {
        return Err(ConfigError::Validation(format!(
            "feed chunk_size must be 1..={}", MAX_STATIONS_PER_REQUEST)));
    }
    if cfg.feed.max_age_hours.is_nan() || cfg.feed.max_age_hours <= 0.0 {
        return Err(ConfigError::Validation("feed max_age_hours must be > 0".into()));
    }
    if cfg.feed.max_attempts == Some(0) {
        return Err(ConfigError::Validation("feed max_attempts must be >= 1 when set".into()));
    }
    if cfg.animation.refresh_secs == 0 {
        return Err(ConfigError::Validation("refresh_secs must be > 0".into()));
    }
    if cfg.animation.flash_count % 2 == 0 {
        return Err(ConfigError::Validation("flash_count must be odd".into()));
    }
    let b = &cfg.brightness;
    for (name, v) in [("default", b.default_percent), ("lightning", b.lightning_percent), ("hiwind", b.hiwind_percent)] {
        if v > 100 {
            return Err(ConfigError::Validation(format!("{} brightness must be 0..=100", name)));
        }
    }
    if b.dim_divisor == 0 {
        return Err(ConfigError::Validation("dim_divisor must be >= 1".into()));
    }
    b.dim_window()?;
    Ok(())
}

/// Parse "HH:MM" (24 hour)
pub fn parse_clock(s: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| ConfigError::Validation(format!("bad time '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let s = Settings::default();
        validate(&s).unwrap();
        assert_eq!(s.panel.width(), 64);
        assert_eq!(s.panel.height(), 32);
        assert_eq!(s.animation.refresh_interval(), Duration::from_secs(300));
        assert_eq!(s.feed.chunk_size, 300);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "regions: [ARIZONA, USA]\npanel:\n  rows: 64\n  chain_length: 3\n  parallel: 2\nanimation:\n  blink_mode: single\n").unwrap();

        let cli = Cli { config: Some(f.path().to_path_buf()), ..Default::default() };
        let s = load_with(&cli).unwrap();

        assert_eq!(s.regions, vec!["ARIZONA", "USA"]);
        assert_eq!(s.panel.width(), 192);
        assert_eq!(s.panel.height(), 128);
        assert_eq!(s.animation.blink_mode, BlinkMode::Single);
        assert_eq!(s.animation.hiwind_threshold_kt, 15);
        assert_eq!(s.brightness.default_percent, 50);
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "animation:\n  refresh_secs: 60\n").unwrap();

        let cli = Cli {
            config: Some(f.path().to_path_buf()),
            refresh_secs: Some(120),
            regions: Some(vec!["CUSTOM".into()]),
            no_transitions: true,
            ..Default::default()
        };
        let s = load_with(&cli).unwrap();
        assert_eq!(s.animation.refresh_secs, 120);
        assert_eq!(s.regions, vec!["CUSTOM"]);
        assert!(!s.transition.wipe && !s.transition.clock && !s.transition.title);
    }

    #[test]
    fn test_missing_explicit_file() {
        let cli = Cli { config: Some(PathBuf::from("/nonexistent/ledmap.yaml")), ..Default::default() };
        assert!(matches!(load_with(&cli), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut s = Settings::default();
        s.feed.chunk_size = 301;
        assert!(validate(&s).is_err());

        let mut s = Settings::default();
        s.animation.flash_count = 4;
        assert!(validate(&s).is_err());

        let mut s = Settings::default();
        s.brightness.dim_start = "25:99".into();
        assert!(validate(&s).is_err());

        let mut s = Settings::default();
        s.regions.clear();
        assert!(validate(&s).is_err());
    }

    #[test]
    fn test_oversized_panel_chain_is_rejected() {
        let mut s = Settings::default();
        s.panel.cols = u32::MAX;
        s.panel.chain_length = 2;
        assert!(matches!(validate(&s), Err(ConfigError::Validation(_))));
        assert_eq!(s.panel.dimensions(), None);

        let mut s = Settings::default();
        s.panel.rows = 1 << 20;
        s.panel.parallel = 1 << 12;
        assert!(matches!(validate(&s), Err(ConfigError::Validation(_))));

        let mut s = Settings::default();
        s.panel.parallel = 0;
        assert!(matches!(validate(&s), Err(ConfigError::Validation(_))));
        assert_eq!(Settings::default().panel.dimensions(), Some((64, 32)));
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("06:30").unwrap(), NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert!(parse_clock("6.30").is_err());
    }
}
