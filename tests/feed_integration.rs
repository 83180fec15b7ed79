/*
 *  tests/feed_integration.rs
 *
 *  METAR fetch and classification through the scripted feed
 *
 *  ledmap - aviation weather on an LED matrix
 *  (c) 2020-26 Stuart Hunter
 */

use std::time::Duration;

use ledmap::classify::{Airport, FlightCategory, WeatherClassifier};
use ledmap::config::FeedSettings;
use ledmap::metar::{FeedError, MetarFetcher, RetryPolicy, ScriptedTransport};
use ledmap::pacer::RecordingSleeper;

fn codes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("K{:04}", i)).collect()
}

#[tokio::test]
async fn test_large_region_is_requested_in_chunks() {
    let fetcher = MetarFetcher::from_settings(ScriptedTransport::new(), &FeedSettings::default());
    let sleeper = RecordingSleeper::default();

    let snapshot = fetcher.fetch(&codes(650), 2.5, &sleeper).await.unwrap();

    let sizes: Vec<usize> = fetcher.transport().requests().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![300, 300, 50]);
    assert_eq!(snapshot.len(), 650);
    assert!(snapshot.get("K0649").is_some());
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_chunk_size_is_capped() {
    let fetcher = MetarFetcher::new(ScriptedTransport::new(), 1000, RetryPolicy::forever(Duration::from_secs(5)));
    fetcher.fetch(&codes(301), 2.5, &RecordingSleeper::default()).await.unwrap();
    let sizes: Vec<usize> = fetcher.transport().requests().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![300, 1]);
}

#[tokio::test]
async fn test_outage_is_retried_after_backoff() {
    let transport = ScriptedTransport::new();
    transport.push_reply(Err(FeedError::Status(503)));
    transport.push_reply(Ok("<html>maintenance</html>".to_string()));
    let fetcher = MetarFetcher::new(transport, 300, RetryPolicy::forever(Duration::from_secs(5)));
    let sleeper = RecordingSleeper::default();

    let snapshot = fetcher.fetch(&codes(3), 2.5, &sleeper).await.unwrap();

    assert_eq!(snapshot.len(), 3);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5); 2]);
    // the same chunk every time
    let requests = fetcher.transport().requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r == &requests[0]));
}

#[tokio::test]
async fn test_fetched_weather_is_classified() {
    let transport = ScriptedTransport::new()
        .with_station(Airport { wx: "TSRA".into(), category: FlightCategory::Ifr, ..Airport::new("KSTM") })
        .with_station(Airport { wind_speed_kt: 10, ..Airport::new("KWND") })
        .with_station(Airport { wind_speed_kt: 9, wind_gust_kt: 25, ..Airport::new("KCLM") });
    let fetcher = MetarFetcher::new(transport, 300, RetryPolicy::forever(Duration::from_secs(5)));
    let ids: Vec<String> = ["KSTM", "KWND", "KCLM"].iter().map(|s| s.to_string()).collect();

    let snapshot = fetcher.fetch(&ids, 2.5, &RecordingSleeper::default()).await.unwrap();
    assert_eq!(snapshot.get("KSTM").map(|a| a.category), Some(FlightCategory::Ifr));
    assert_eq!(snapshot.get("KWND").map(|a| a.category), Some(FlightCategory::None));

    let cls = WeatherClassifier::new(10, false).classify(snapshot.clone());
    assert_eq!(cls.lightning.iter().collect::<Vec<_>>(), vec!["KSTM"]);
    assert_eq!(cls.high_wind.iter().collect::<Vec<_>>(), vec!["KWND"]);

    let gusty = WeatherClassifier::new(10, true).classify(snapshot);
    assert!(gusty.high_wind.contains("KCLM"));
}
