//! This module contains global constants used across the map, feed and display modules.

use embedded_graphics::pixelcolor::Rgb888;

/// Crate version string sent as the feed User-Agent.
pub const VERSION: &str = concat!(env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

// Weather feed
/// Default METAR endpoint.
pub const DEFAULT_FEED_URL: &str = "https://aviationweather.gov/api/data/metar";
/// The feed rejects requests naming more than this many stations.
pub const MAX_STATIONS_PER_REQUEST: usize = 300;
/// Fixed pause between failed feed attempts, in seconds.
pub const DEFAULT_RETRY_BACKOFF_SECS: u64 = 5;
/// Default METAR max age in hours.
pub const DEFAULT_METAR_AGE_HOURS: f64 = 2.5;
/// Per request HTTP timeout, in seconds.
pub const FEED_TIMEOUT_SECS: u64 = 20;

/// Present weather tokens that mark a station as lightning active.
pub const LIGHTNING_VOCABULARY: &[&str] = &[
    "TS", "TSRA", "TSGR", "TSRG", "FC", "SQ", "VCTS", "VCTSRA", "VCTSDZ", "LTG",
];

// Sentinels used when a METAR omits a field
pub const MISSING_CATEGORY: &str = "NONE";
pub const MISSING_WX: &str = "";

// Animation cycle
pub const PHASE_COUNT: usize = 6;
/// Phases (0-indexed) that render lightning.
pub const LIGHTNING_PHASES: [usize; 2] = [2, 4];
/// Phases (0-indexed) that render high wind blinks.
pub const WIND_PHASES: [usize; 3] = [3, 4, 5];
/// Per phase wait in milliseconds.
pub const DEFAULT_PHASE_WAITS_MS: [u64; PHASE_COUNT] = [450, 450, 40, 50, 40, 250];
/// Settle time after each complete cycle.
pub const CYCLE_SETTLE_MS: u64 = 100;

/// Default refresh interval, in seconds.
pub const DEFAULT_REFRESH_SECS: u64 = 300;

// Brightness (percent)
pub const DEFAULT_BRIGHTNESS: u8 = 50;
pub const LIGHTNING_BRIGHTNESS: u8 = 100;
pub const HIWIND_BRIGHTNESS: u8 = 10;
pub const DIM_DIVISOR: u8 = 4;
pub const DEFAULT_DIM_START: &str = "21:30";
pub const DEFAULT_DIM_END: &str = "06:30";

/// Wind speed (kt) at or above which a station blinks.
pub const DEFAULT_HIWIND_THRESHOLD_KT: u32 = 15;

// Continental outline clip box; a point outside ends its ring
pub const CONTINENTAL_MAX_LON: f64 = 0.0;
pub const CONTINENTAL_MIN_LON: f64 = -125.0;
pub const CONTINENTAL_MIN_LAT: f64 = 20.0;

/// Default big lightning star arm length, in pixels.
pub const DEFAULT_FLASH_SIZE: u32 = 5;
/// Number of on/off toggles in a big flash.
pub const DEFAULT_FLASH_COUNT: u32 = 3;

// Region names with special meaning in the catalog
pub const CONTINENTAL_REGION: &str = "USA";
pub const DEFAULT_SCALE_KEY: &str = "DEFAULT";
pub const CUSTOM_SCALE_KEY: &str = "CUSTOM";

// Palette
pub const BLACK: Rgb888 = Rgb888::new(0, 0, 0);
pub const WHITE: Rgb888 = Rgb888::new(255, 255, 255);
pub const GREY: Rgb888 = Rgb888::new(50, 50, 50);
pub const GREEN: Rgb888 = Rgb888::new(0, 200, 0);
pub const BLUE: Rgb888 = Rgb888::new(0, 0, 255);
pub const RED: Rgb888 = Rgb888::new(255, 0, 0);
pub const MAGENTA: Rgb888 = Rgb888::new(255, 0, 255);
pub const YELLOW: Rgb888 = Rgb888::new(255, 255, 0);

pub const OUTLINE_COLOR: Rgb888 = GREY;
pub const TITLE_COLOR: Rgb888 = Rgb888::new(0, 120, 255);
pub const CLOCK_COLOR: Rgb888 = Rgb888::new(200, 120, 0);
