/*
 *  tests/map_integration.rs
 *
 *  Region activation and animation against an in-memory panel
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 */

use std::path::PathBuf;
use std::time::Duration;

use ledmap::classify::{Airport, FlightCategory};
use ledmap::config::{BlinkMode, DataPaths, EffectTimings, Settings, read_yaml, validate};
use ledmap::constants::{BLACK, GREEN, OUTLINE_COLOR};
use ledmap::display::drivers::memory::MemoryPanel;
use ledmap::display::{BrightnessSchedule, FrameCompositor};
use ledmap::error::MapError;
use ledmap::geodata::FeatureCollection;
use ledmap::metar::{MetarFetcher, RetryPolicy, ScriptedTransport};
use ledmap::outline::build_outline;
use ledmap::pacer::RecordingSleeper;
use ledmap::region::{MapData, RegionCatalog, ScaleTable};
use ledmap::scheduler::AnimationScheduler;
use ledmap::transition::NoTransition;

const CATALOG: &str = r#"
regions:
  COLORADO: [KDEN]
custom:
  - name: Test Square
    outline: [[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]]
    airports: [KTST, KNOP]
    scale: { x_offset: 0.0, y_offset: 0.0 }
  - name: Stormy Square
    outline: [[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]]
    airports: [KTST, KWND]
    scale: { x_offset: 0.0, y_offset: 0.0 }
"#;

const SHAPES: &str = r#"{ "type": "FeatureCollection", "features": [] }"#;

fn shipped(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(name)
}

fn shipped_data() -> MapData {
    MapData::load(&DataPaths {
        catalog: shipped("data/regions.yaml"),
        scale_profiles: shipped("data/scale_profiles.yaml"),
        region_shapes: shipped("data/states.geojson"),
        continental_shape: shipped("data/usa.geojson"),
    })
    .unwrap()
}

fn square_data() -> MapData {
    MapData {
        catalog: RegionCatalog::from_yaml(CATALOG).unwrap(),
        scales: ScaleTable::default(),
        shapes: FeatureCollection::from_json(SHAPES).unwrap(),
        continental: None,
    }
}

fn settings(regions: &[&str]) -> Settings {
    let mut s = Settings::default();
    s.regions = regions.iter().map(|r| r.to_string()).collect();
    s.animation.refresh_secs = 1;
    s
}

type TestScheduler = AnimationScheduler<MemoryPanel, ScriptedTransport, NoTransition, RecordingSleeper>;

fn scheduler(transport: ScriptedTransport, settings: &Settings) -> (TestScheduler, MemoryPanel) {
    let panel = MemoryPanel::new(10, 10);
    let comp = FrameCompositor::new(
        panel.clone(),
        BrightnessSchedule::from_settings(&settings.brightness).unwrap(),
    )
    .unwrap();
    let fetcher = MetarFetcher::new(transport, 300, RetryPolicy::forever(Duration::from_secs(5)));
    let sched = AnimationScheduler::new(
        comp,
        fetcher,
        NoTransition,
        RecordingSleeper::default(),
        square_data(),
        settings,
    );
    (sched, panel)
}

fn station(code: &str, lat: f64, lon: f64, category: FlightCategory) -> Airport {
    Airport { lat, lon, category, ..Airport::new(code) }
}

#[test]
fn test_shipped_settings_are_valid() {
    let s = read_yaml(&shipped("ledmap.yaml")).unwrap();
    validate(&s).unwrap();
    assert!(s.regions.iter().any(|r| r == "Northern Arizona"));
}

#[test]
fn test_every_shipped_region_lands_on_the_panel() {
    let data = shipped_data();
    let names = ["COLORADO", "ARIZONA", "CONNECTICUT", "MARYLAND", "WASHINGTON D.C.", "USA", "Northern Arizona", "BELGIUM"];
    for (w, h) in [(64, 32), (64, 64), (128, 64)] {
        for name in names {
            let region = data.resolve(name, w, h).unwrap();
            assert!(!region.airports.is_empty(), "{} has no airports", name);
            let outline = build_outline(&region, w, h, 1).unwrap();
            for ring in &outline.rings {
                for p in &ring.points {
                    assert!(outline.projector.on_panel(*p), "{} point {:?} off {}x{}", name, p, w, h);
                }
            }
        }
    }
}

#[test]
fn test_continental_outline_drops_outlying_territory() {
    let data = shipped_data();
    let region = data.resolve("USA", 64, 32).unwrap();
    assert!(region.is_continental());
    assert_eq!(region.rings.len(), 2);

    let outline = build_outline(&region, 64, 32, 1).unwrap();
    assert_eq!(outline.rings.len(), 1);
    assert!(outline.bbox.min_lon >= -125.0);
    assert!(outline.bbox.min_lat >= 20.0);

    // every region's stations are shown on the national map
    assert!(region.airports.iter().any(|a| a == "KDEN"));
    assert!(region.airports.iter().any(|a| a == "KBDL"));
}

#[test]
fn test_unknown_region_is_reported() {
    let err = shipped_data().resolve("ATLANTIS", 64, 32).unwrap_err();
    assert!(matches!(err, MapError::UnknownRegion(_)));
    assert!(err.is_region_error());
}

#[tokio::test]
async fn test_activate_draws_outline_and_markers() {
    let transport = ScriptedTransport::new()
        .with_station(station("KTST", 5.0, 5.0, FlightCategory::Vfr))
        // reported without a position
        .with_station(station("KNOP", 0.0, 0.0, FlightCategory::Ifr));
    let (mut sched, panel) = scheduler(transport, &settings(&["Test Square"]));

    let cls = sched.activate("Test Square").await.unwrap();
    assert_eq!(cls.snapshot.len(), 2);
    assert!(cls.lightning.is_empty());

    let visible = sched.compositor().visible();
    assert_eq!(visible.pixel(5, 5), Some(GREEN));
    assert_eq!(visible.pixel(0, 0), Some(OUTLINE_COLOR));
    assert_eq!(visible.pixel(9, 9), Some(OUTLINE_COLOR));
    // only the square border and one marker are lit
    assert_eq!(visible.lit_count(), 36 + 1);
    assert_eq!(visible.pixel(4, 4), Some(BLACK));
    // both frames hold the map after a full render
    assert_eq!(sched.compositor().offscreen(), visible);

    let state = panel.state();
    let state = state.lock().unwrap();
    assert_eq!(state.last_frame.as_ref(), Some(visible));
    // midnight: inside the dimming window
    assert_eq!(state.last_brightness(), Some(50 / 4));
}

#[tokio::test]
async fn test_region_animates_until_refresh() {
    let storm = Airport { wx: "+TSRA".into(), ..station("KTST", 5.0, 5.0, FlightCategory::Ifr) };
    let transport = ScriptedTransport::new().with_station(storm);
    let (mut sched, panel) = scheduler(transport, &settings(&["Test Square"]));

    sched.run_region("Test Square").await.unwrap();

    let cls = sched.classification().unwrap();
    assert!(cls.lightning.contains("KTST"));
    assert!(cls.high_wind.is_empty());
    assert!(sched.sleeper().total_slept() >= Duration::from_secs(1));

    let state = panel.state();
    let state = state.lock().unwrap();
    assert!(state.brightness_history.contains(&100));
    assert!(state.show_count > 2);
    assert_eq!(state.last_brightness(), Some(50 / 4));
}

#[tokio::test]
async fn test_rotation_gives_up_when_every_region_fails() {
    let (mut sched, _) = scheduler(ScriptedTransport::new(), &settings(&["ATLANTIS", "NOWHERE"]));
    let err = sched.run().await.unwrap_err();
    assert!(matches!(err, MapError::UnknownRegion(_)));
    assert!(sched.fetcher().transport().requests().is_empty());
}

#[tokio::test]
async fn test_rotation_skips_bad_region() {
    let transport = ScriptedTransport::new().with_station(station("KTST", 5.0, 5.0, FlightCategory::Vfr));
    let (mut sched, _) = scheduler(transport, &settings(&["ATLANTIS", "Test Square"]));

    // runs forever; stop it once a few refreshes have gone by
    let stopped = tokio::time::timeout(Duration::from_millis(200), sched.run()).await;
    assert!(stopped.is_err());

    let requests = sched.fetcher().transport().requests();
    assert!(!requests.is_empty());
    assert!(requests.iter().all(|r| r.contains(&"KTST".to_string())));
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn stormy_settings() -> Settings {
    let mut s = settings(&["Stormy Square"]);
    let anim = &mut s.animation;
    anim.refresh_secs = 3;
    anim.phase_waits_ms = [450, 450, 40, 50, 40, 250];
    anim.cycle_settle_ms = 100;
    anim.big_flash = true;
    anim.flash_count = 3;
    anim.blink_mode = BlinkMode::Batched;
    anim.timings = EffectTimings { flash_toggle_ms: 30, flash_settle_ms: 70, blink_batched_ms: 200, ..EffectTimings::default() };
    s
}

fn stormy_transport() -> ScriptedTransport {
    let storm = Airport { wx: "TSRA".into(), ..station("KTST", 5.0, 5.0, FlightCategory::Ifr) };
    let windy = Airport { wind_speed_kt: 30, ..station("KWND", 3.0, 3.0, FlightCategory::Vfr) };
    ScriptedTransport::new().with_station(storm).with_station(windy)
}

/// Every sleep of one activation: a full cycle, then phase 0 of the next
/// cycle pushes the clock past the 3 s refresh.
fn stormy_pass() -> Vec<Duration> {
    let flash = [30, 30, 30, 70];
    let blink = [200, 200];
    let mut pass = vec![450, 450];
    pass.extend(flash);
    pass.push(40);
    pass.extend(blink);
    pass.push(50);
    pass.extend(flash);
    pass.extend(blink);
    pass.push(40);
    pass.extend(blink);
    pass.push(250);
    pass.push(100);
    pass.push(450);
    pass.into_iter().map(ms).collect()
}

#[tokio::test]
async fn test_phase_schedule_for_one_refresh() {
    let (mut sched, _) = scheduler(stormy_transport(), &stormy_settings());

    sched.run_region("Stormy Square").await.unwrap();

    let cls = sched.classification().unwrap();
    assert!(cls.lightning.contains("KTST"));
    assert!(cls.high_wind.contains("KWND"));
    // lightning at phases 2 and 4, wind at 3, 4 and 5
    assert_eq!(sched.sleeper().sleeps(), stormy_pass());
    assert_eq!(sched.sleeper().total_slept(), ms(3350));
    assert_eq!(sched.fetcher().transport().requests().len(), 1);
}

#[tokio::test]
async fn test_refresh_fetches_again_from_phase_zero() {
    let (mut sched, _) = scheduler(stormy_transport(), &stormy_settings());
    let pass = stormy_pass();

    let stopped = tokio::time::timeout(Duration::from_millis(200), sched.run()).await;
    assert!(stopped.is_err());

    let requests = sched.fetcher().transport().requests();
    assert!(requests.len() >= 2);
    assert!(requests.iter().all(|r| r == &requests[0]));

    // every refresh restarts the cycle at phase 0
    let sleeps = sched.sleeper().sleeps();
    assert!(sleeps.len() > pass.len());
    for chunk in sleeps.chunks(pass.len()) {
        assert_eq!(chunk, &pass[..chunk.len()]);
    }
}
