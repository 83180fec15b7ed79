/*
 *  metar.rs
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 *
 *  Chunked METAR feed requests with fixed backoff retry
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

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::Read;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use flate2::read::GzDecoder;
use local_ip_address::local_ip;
use log::{debug, info, warn};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use reqwest::{Client, header};
use thiserror::Error;

use crate::classify::{Airport, FlightCategory, MetarSnapshot};
use crate::config::FeedSettings;
use crate::constants::{MAX_STATIONS_PER_REQUEST, MISSING_WX, VERSION};
use crate::pacer::Sleeper;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Feed returned HTTP status {0}")]
    Status(u16),
    #[error("Malformed feed response: {0}")]
    Malformed(String),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

/// Issues one feed request; the query carries `ids`, `format` and `hours`.
#[allow(async_fn_in_trait)]
pub trait FeedTransport {
    async fn fetch(&self, query: &[(&str, String)]) -> Result<String, FeedError>;
}

/// reqwest client against the METAR endpoint
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(settings: &FeedSettings) -> Result<Self, FeedError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/xml, text/xml"));
        headers.insert("Accept-Encoding", header::HeaderValue::from_static("gzip"));
        headers.insert("Connection", header::HeaderValue::from_static("close"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self { client, url: settings.url.clone() })
    }
}

impl FeedTransport for HttpTransport {
    async fn fetch(&self, query: &[(&str, String)]) -> Result<String, FeedError> {
        let response = self.client.get(&self.url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }
        let raw = response.bytes().await?;
        decode_body(&raw)
    }
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Response body as text; only gzip is requested so anything without the
/// gzip magic is taken as plain text.
pub fn decode_body(raw: &[u8]) -> Result<String, FeedError> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return Ok(String::from_utf8_lossy(raw).into_owned());
    }
    let mut decoded = String::new();
    GzDecoder::new(raw)
        .read_to_string(&mut decoded)
        .map_err(|e| FeedError::Malformed(format!("gzip body: {}", e)))?;
    Ok(decoded)
}

/// How long to wait between failed attempts, and whether to ever stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// None retries until the network comes back
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn forever(backoff: Duration) -> Self {
        Self { backoff, max_attempts: None }
    }

    pub fn limited(backoff: Duration, max_attempts: u32) -> Self {
        Self { backoff, max_attempts: Some(max_attempts) }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

/// Fetches current observations for any number of stations.
pub struct MetarFetcher<T: FeedTransport> {
    transport: T,
    chunk_size: usize,
    policy: RetryPolicy,
}

impl<T: FeedTransport> MetarFetcher<T> {
    pub fn new(transport: T, chunk_size: usize, policy: RetryPolicy) -> Self {
        let chunk_size = chunk_size.clamp(1, MAX_STATIONS_PER_REQUEST);
        Self { transport, chunk_size, policy }
    }

    pub fn from_settings(transport: T, settings: &FeedSettings) -> Self {
        let policy = RetryPolicy {
            backoff: Duration::from_secs(settings.retry_backoff_secs),
            max_attempts: settings.max_attempts,
        };
        Self::new(transport, settings.chunk_size, policy)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every station, chunk by chunk. A chunk that fails is retried
    /// after the backoff until it succeeds (or the policy gives up).
    pub async fn fetch<S: Sleeper>(
        &self,
        codes: &[String],
        max_age_hours: f64,
        sleeper: &S,
    ) -> Result<MetarSnapshot, FeedError> {
        let mut seen = HashSet::new();
        let stations: Vec<&str> = codes
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty() && seen.insert(c.to_ascii_uppercase()))
            .collect();

        match local_ip() {
            Ok(ip) => info!("Loading METAR data for {} stations from {}", stations.len(), ip),
            Err(e) => warn!("Loading METAR data for {} stations, no local IP: {}", stations.len(), e),
        }

        let mut records = Vec::with_capacity(stations.len());
        for (index, chunk) in stations.chunks(self.chunk_size).enumerate() {
            records.extend(self.fetch_chunk(index, chunk, max_age_hours, sleeper).await?);
        }

        let snapshot = MetarSnapshot::from_records(records, Utc::now());
        info!("METAR data loaded: {} stations reporting", snapshot.len());
        Ok(snapshot)
    }

    async fn fetch_chunk<S: Sleeper>(
        &self,
        index: usize,
        chunk: &[&str],
        max_age_hours: f64,
        sleeper: &S,
    ) -> Result<Vec<Airport>, FeedError> {
        let query = [
            ("ids", chunk.join(",")),
            ("format", "xml".to_string()),
            ("hours", max_age_hours.to_string()),
        ];

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            debug!("Chunk {} ({} stations), attempt {}", index, chunk.len(), attempts);

            let result = self
                .transport
                .fetch(&query)
                .await
                .and_then(|body| parse_records(extract_payload(&body)?));

            match result {
                Ok(records) => return Ok(records),
                Err(e) if self.policy.exhausted(attempts) => {
                    return Err(FeedError::RetriesExhausted { attempts, last: e.to_string() });
                }
                Err(e) => {
                    warn!("METAR feed not available ({}); retrying in {:?}", e, self.policy.backoff);
                    sleeper.sleep(self.policy.backoff).await;
                }
            }
        }
    }
}

/// Canned feed: queued replies first, then a well formed response echoing
/// every requested station. Used by tests and headless demos.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, FeedError>>>,
    stations: BTreeMap<String, Airport>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observation returned whenever this station is requested
    pub fn with_station(mut self, ap: Airport) -> Self {
        self.stations.insert(ap.station.clone(), ap);
        self
    }

    pub fn push_reply(&self, reply: Result<String, FeedError>) {
        lock(&self.replies).push_back(reply);
    }

    /// Station ids of every request, in order
    pub fn requests(&self) -> Vec<Vec<String>> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

impl FeedTransport for ScriptedTransport {
    async fn fetch(&self, query: &[(&str, String)]) -> Result<String, FeedError> {
        let ids: Vec<String> = query
            .iter()
            .find(|(k, _)| *k == "ids")
            .map(|(_, v)| v.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        lock(&self.requests).push(ids.clone());

        if let Some(reply) = lock(&self.replies).pop_front() {
            return reply;
        }
        let records: Vec<Airport> = ids
            .iter()
            .map(|id| self.stations.get(id).cloned().unwrap_or_else(|| Airport::new(id)))
            .collect();
        Ok(render_response(&records))
    }
}

/// Feed style XML envelope around `records`
pub fn render_response(records: &[Airport]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<response version=\"1.3\">\n  <errors />\n",
    );
    out.push_str(&format!("  <data num_results=\"{}\">\n", records.len()));
    for ap in records {
        out.push_str("    <METAR>\n");
        out.push_str(&format!("      <station_id>{}</station_id>\n", escape(&ap.station)));
        if ap.lat != 0.0 || ap.lon != 0.0 {
            out.push_str(&format!("      <latitude>{}</latitude>\n", ap.lat));
            out.push_str(&format!("      <longitude>{}</longitude>\n", ap.lon));
        }
        if ap.wind_speed_kt > 0 {
            out.push_str(&format!("      <wind_speed_kt>{}</wind_speed_kt>\n", ap.wind_speed_kt));
        }
        if ap.wind_gust_kt > 0 {
            out.push_str(&format!("      <wind_gust_kt>{}</wind_gust_kt>\n", ap.wind_gust_kt));
        }
        if ap.wind_dir_deg > 0 {
            out.push_str(&format!("      <wind_dir_degrees>{}</wind_dir_degrees>\n", ap.wind_dir_deg));
        }
        if !ap.wx.is_empty() {
            out.push_str(&format!("      <wx_string>{}</wx_string>\n", escape(&ap.wx)));
        }
        if ap.category != FlightCategory::None {
            out.push_str(&format!("      <flight_category>{}</flight_category>\n", ap.category));
        }
        out.push_str("    </METAR>\n");
    }
    out.push_str("  </data>\n</response>\n");
    out
}

/// Contents of the `<data ...>` element, without the response envelope
pub fn extract_payload(body: &str) -> Result<&str, FeedError> {
    let start = body
        .find("<data>")
        .or_else(|| body.find("<data "))
        .ok_or_else(|| FeedError::Malformed("no <data> element".into()))?;
    let open_end = body[start..]
        .find('>')
        .map(|i| start + i)
        .ok_or_else(|| FeedError::Malformed("unterminated <data> tag".into()))?;

    if body[..open_end].ends_with('/') {
        return Ok("");
    }
    let close = body[open_end..]
        .find("</data>")
        .map(|i| open_end + i)
        .ok_or_else(|| FeedError::Malformed("truncated response, no </data>".into()))?;
    Ok(&body[open_end + 1..close])
}

fn number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn knots(text: &str) -> u32 {
    number(text).filter(|v| *v >= 0.0).map(|v| v as u32).unwrap_or(0)
}

fn apply_field(ap: &mut Airport, field: &[u8], text: &str) {
    match field {
        b"station_id" => ap.station = text.trim().to_ascii_uppercase(),
        b"latitude" => ap.lat = number(text).unwrap_or(0.0),
        b"longitude" => ap.lon = number(text).unwrap_or(0.0),
        b"flight_category" => ap.category = text.parse().unwrap_or_default(),
        b"wind_speed_kt" => ap.wind_speed_kt = knots(text),
        b"wind_gust_kt" => ap.wind_gust_kt = knots(text),
        b"wind_dir_degrees" => ap.wind_dir_deg = knots(text),
        b"wx_string" => ap.wx = text.trim().to_string(),
        _ => {}
    }
}

/// METAR records from a run of `<METAR>` elements
///
/// Absent fields keep their sentinel. Records without a station id are
/// dropped; a record cut off by the end of input is an error.
pub fn parse_records(xml: &str) -> Result<Vec<Airport>, FeedError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut records = Vec::new();
    let mut current: Option<Airport> = None;
    let mut field: Option<Vec<u8>> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = e.local_name();
                if name.as_ref() == b"METAR" {
                    current = Some(Airport { wx: MISSING_WX.to_string(), ..Default::default() });
                    field = None;
                } else if current.is_some() {
                    field = Some(name.as_ref().to_vec());
                }
            }
            Event::Text(t) => {
                if let (Some(ap), Some(f)) = (current.as_mut(), field.as_deref()) {
                    let text = t.unescape()?;
                    apply_field(ap, f, &text);
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"METAR" {
                    match current.take() {
                        Some(ap) if !ap.station.is_empty() => records.push(ap),
                        Some(_) => debug!("METAR without station_id skipped"),
                        None => {}
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if current.is_some() {
        return Err(FeedError::Malformed("truncated METAR record".into()));
    }
    Ok(records)
}
