/*
 *  scheduler.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Region rotation, refresh loop and the timed animation phases
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

use std::time::Duration;

use log::{debug, error, info};

use crate::classify::{Classification, WeatherClassifier};
use crate::config::Settings;
use crate::constants::{LIGHTNING_PHASES, PHASE_COUNT, WIND_PHASES};
use crate::display::compositor::FrameCompositor;
use crate::display::traits::PanelDriver;
use crate::effects::{Effects, draw_markers};
use crate::error::MapError;
use crate::metar::{FeedTransport, MetarFetcher};
use crate::outline::{OutlineCache, build_outline};
use crate::pacer::{RefreshTimer, Sleeper};
use crate::region::{GeographicRegion, MapData};
use crate::transition::Transition;

/// Fixed ring of timed phases.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationCycle {
    waits: [Duration; PHASE_COUNT],
}

impl AnimationCycle {
    pub fn new(waits_ms: [u64; PHASE_COUNT]) -> Self {
        Self { waits: waits_ms.map(Duration::from_millis) }
    }

    pub fn len(&self) -> usize {
        PHASE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn wait(&self, phase: usize) -> Duration {
        self.waits[phase % PHASE_COUNT]
    }

    pub fn is_lightning_phase(&self, phase: usize) -> bool {
        LIGHTNING_PHASES.contains(&(phase % PHASE_COUNT))
    }

    pub fn is_wind_phase(&self, phase: usize) -> bool {
        WIND_PHASES.contains(&(phase % PHASE_COUNT))
    }

    /// Phase after `phase`, wrapping to 0
    pub fn next(&self, phase: usize) -> usize {
        (phase + 1) % PHASE_COUNT
    }
}

/// Drives the display: for each region in turn, fetch, classify, draw,
/// then animate until the refresh timer runs out.
pub struct AnimationScheduler<P, T, X, S>
where
    P: PanelDriver,
    T: FeedTransport,
    X: Transition,
    S: Sleeper,
{
    comp: FrameCompositor<P>,
    fetcher: MetarFetcher<T>,
    transition: X,
    sleeper: S,
    data: MapData,
    classifier: WeatherClassifier,
    outline: OutlineCache,
    effects: Effects,
    cycle: AnimationCycle,
    regions: Vec<String>,
    max_age_hours: f64,
    refresh: Duration,
    settle: Duration,
    current: Option<Classification>,
}

impl<P, T, X, S> AnimationScheduler<P, T, X, S>
where
    P: PanelDriver,
    T: FeedTransport,
    X: Transition,
    S: Sleeper,
{
    pub fn new(
        comp: FrameCompositor<P>,
        fetcher: MetarFetcher<T>,
        transition: X,
        sleeper: S,
        data: MapData,
        settings: &Settings,
    ) -> Self {
        let anim = &settings.animation;
        Self {
            comp,
            fetcher,
            transition,
            sleeper,
            data,
            classifier: WeatherClassifier::new(anim.hiwind_threshold_kt, anim.hiwind_use_gusts),
            outline: OutlineCache::new(&settings.outline),
            effects: Effects::new(anim, &settings.brightness),
            cycle: AnimationCycle::new(anim.phase_waits_ms),
            regions: settings.regions.clone(),
            max_age_hours: settings.feed.max_age_hours,
            refresh: anim.refresh_interval(),
            settle: Duration::from_millis(anim.cycle_settle_ms),
            current: None,
        }
    }

    pub fn compositor(&self) -> &FrameCompositor<P> {
        &self.comp
    }

    pub fn fetcher(&self) -> &MetarFetcher<T> {
        &self.fetcher
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// Weather for the region on the panel
    pub fn classification(&self) -> Option<&Classification> {
        self.current.as_ref()
    }

    pub fn outline(&self) -> &OutlineCache {
        &self.outline
    }

    /// Rotate through the configured regions forever. A region that fails
    /// to activate is skipped; when every region of a pass fails the last
    /// error is returned.
    pub async fn run(&mut self) -> Result<(), MapError> {
        if self.regions.is_empty() {
            return Err(MapError::UnknownRegion("no regions configured".into()));
        }
        let mut failed = 0usize;
        let mut index = 0usize;
        loop {
            let name = self.regions[index].clone();
            match self.run_region(&name).await {
                Ok(()) => failed = 0,
                Err(e) if e.is_region_error() => {
                    error!("Skipping region {}: {}", name, e);
                    failed += 1;
                    if failed >= self.regions.len() {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
            index = (index + 1) % self.regions.len();
        }
    }

    /// Activate one region and animate it until the next refresh is due
    pub async fn run_region(&mut self, name: &str) -> Result<(), MapError> {
        self.activate(name).await?;
        self.animate().await
    }

    /// Resolve, fetch, classify and draw a region. The previous frame stays
    /// on the panel until the new outline is ready to be drawn.
    pub async fn activate(&mut self, name: &str) -> Result<&Classification, MapError> {
        let (w, h) = (self.comp.width(), self.comp.height());
        let region = self.data.resolve(name, w, h)?;
        // geometry problems surface before any network traffic
        let preview = build_outline(&region, w, h, 1)?;
        info!("Activating {} with {} airports", region.title, region.airports.len());
        debug!(
            "{} bbox lat {:.3}..{:.3} lon {:.3}..{:.3}",
            region.title, preview.bbox.min_lat, preview.bbox.max_lat, preview.bbox.min_lon, preview.bbox.max_lon
        );

        let snapshot = self.fetcher.fetch(&region.airports, self.max_age_hours, &self.sleeper).await?;
        let cls = self.classifier.classify(snapshot);

        self.transition.run(&mut self.comp, &region.title, &self.sleeper).await?;
        self.draw_region(&region, &cls)?;

        Ok(self.current.insert(cls))
    }

    /// Outline first, then markers, on both frames
    fn draw_region(&mut self, region: &GeographicRegion, cls: &Classification) -> Result<(), MapError> {
        self.comp.clear_all()?;
        self.comp.apply_schedule(self.sleeper.local_time())?;
        let projector = self.outline.render_full(region, &mut self.comp)?.projector.clone();
        let drawn = draw_markers(&mut self.comp, &projector, cls, true);
        debug!("{} of {} markers on the panel", drawn, cls.snapshot.len());
        self.comp.present()?;
        Ok(())
    }

    /// Phase loop for the active region; returns when the refresh is due
    pub async fn animate(&mut self) -> Result<(), MapError> {
        let cls = self.current.take().ok_or(MapError::NoCachedOutline)?;
        let result = self.phase_loop(&cls).await;
        self.current = Some(cls);
        result
    }

    async fn phase_loop(&mut self, cls: &Classification) -> Result<(), MapError> {
        let timer = RefreshTimer::start(self.sleeper.now(), self.refresh);
        let mut phase = 0usize;
        loop {
            if phase == 0 {
                // day / night boundary can pass while running unattended
                self.comp.apply_schedule(self.sleeper.local_time())?;
                debug!("Cycle start, refresh in {:?}", timer.remaining(self.sleeper.now()));
            }
            if self.cycle.is_lightning_phase(phase) {
                self.effects.lightning(&mut self.comp, &self.outline, cls, &self.sleeper).await?;
            }
            if self.cycle.is_wind_phase(phase) {
                self.effects.high_wind(&mut self.comp, &self.outline, cls, &self.sleeper).await?;
            }
            self.sleeper.sleep(self.cycle.wait(phase)).await;

            phase = self.cycle.next(phase);
            if phase == 0 {
                self.sleeper.sleep(self.settle).await;
            }
            if timer.expired(self.sleeper.now()) {
                debug!("Refresh due after {:?}", timer.interval());
                return Ok(());
            }
        }
    }
}
