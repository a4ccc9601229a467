//! HTTP clients against a local mock server

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use intrinsic_value::api::{
    BackoffPolicy, CompanyUniverse, EpsSource, FetchThrottle, MacrotrendsEpsClient, PriceSource,
    WikipediaUniverseClient, YahooPriceClient,
};
use intrinsic_value::error::ApiError;
use intrinsic_value::models::PriceQuote;
use intrinsic_value::price_oracle::PriceOracle;

use crate::common::date;
use crate::common::logging::init_test_logging;

const TIMEOUT: Duration = Duration::from_secs(5);
const EPS_PATH: &str = "/stocks/charts/ACM/acm/eps-earnings-per-share-diluted";

const EPS_PAGE: &str = r#"<html><body>
<table class="historical_data_table table">
  <thead><tr><th colspan="2">Acme Annual EPS</th></tr></thead>
  <tbody>
    <tr><td>2024</td><td>$2.00</td></tr>
    <tr><td>2019</td><td>$1.40</td></tr>
    <tr><td>2014</td><td>$1.00</td></tr>
  </tbody>
</table>
</body></html>"#;

fn eps_client(server: &MockServer, max_retries: u32) -> MacrotrendsEpsClient {
    let backoff = BackoffPolicy {
        max_retries,
        initial_delay: Duration::from_millis(10),
        multiplier: 1.0,
    };
    MacrotrendsEpsClient::new(
        server.uri(),
        TIMEOUT,
        FetchThrottle::new(Duration::ZERO),
        backoff,
    )
    .unwrap()
}

#[tokio::test]
async fn test_macrotrends_returns_raw_eps_text() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(EPS_PAGE))
        .expect(2)
        .mount(&server)
        .await;

    let client = eps_client(&server, 0);
    assert_eq!(client.fetch_eps("acm", 2014).await.as_deref(), Some("$1.00"));
    assert_eq!(client.fetch_eps("ACM", 2024).await.as_deref(), Some("$2.00"));
}

#[tokio::test]
async fn test_macrotrends_missing_year_or_page_is_absent() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(EPS_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stocks/charts/NOPE/nope/eps-earnings-per-share-diluted"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = eps_client(&server, 3);
    assert_eq!(client.fetch_eps("ACM", 2009).await, None);
    assert_matches!(
        client.try_fetch_eps("NOPE", 2024).await,
        Err(ApiError::Status { status: 404, .. })
    );
}

#[tokio::test]
async fn test_macrotrends_retries_after_throttling() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPS_PATH))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(EPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(EPS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let client = eps_client(&server, 2);
    assert_eq!(client.fetch_eps("ACM", 2019).await.as_deref(), Some("$1.40"));
}

#[tokio::test]
async fn test_macrotrends_gives_up_when_blocked() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPS_PATH))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let client = eps_client(&server, 1);
    assert_matches!(
        client.try_fetch_eps("ACM", 2024).await,
        Err(ApiError::Blocked {
            status: 403,
            attempts: 2
        })
    );
}

#[tokio::test]
async fn test_macrotrends_spaces_out_requests() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(EPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(EPS_PAGE))
        .expect(2)
        .mount(&server)
        .await;

    let period = Duration::from_millis(200);
    let client = MacrotrendsEpsClient::new(
        server.uri(),
        TIMEOUT,
        FetchThrottle::new(period),
        BackoffPolicy::none(),
    )
    .unwrap();

    let start = Instant::now();
    assert_eq!(client.fetch_eps("ACM", 2014).await.as_deref(), Some("$1.00"));
    assert_eq!(client.fetch_eps("ACM", 2024).await.as_deref(), Some("$2.00"));
    let elapsed = start.elapsed();
    // Throttle and test timer use different clocks; allow a little slack
    assert!(
        elapsed >= period - Duration::from_millis(20),
        "two fetches took only {elapsed:?}"
    );
}

const UNIVERSE_PAGE: &str = r#"<html><body>
<table class="wikitable"><tr><th>Year</th><th>Change</th></tr><tr><td>2024</td><td>+3</td></tr></table>
<table class="wikitable sortable" id="constituents">
  <tr><th>Company</th><th>Ticker[5]</th><th>GICS Sector</th></tr>
  <tr><td><a href="/wiki/Acme">Acme Corp.</a></td><td>ACM</td><td>Industrials</td></tr>
  <tr><td>Beta, Inc.</td><td>BTA</td><td>Technology</td></tr>
</table>
</body></html>"#;

#[tokio::test]
async fn test_wikipedia_universe() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/Nasdaq-100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(UNIVERSE_PAGE))
        .mount(&server)
        .await;

    let client =
        WikipediaUniverseClient::new(format!("{}/wiki/Nasdaq-100", server.uri()), TIMEOUT).unwrap();
    let companies = client.list_companies().await.unwrap();
    let tickers: Vec<&str> = companies.iter().map(|c| c.ticker.as_str()).collect();
    assert_eq!(tickers, vec!["ACM", "BTA"]);
    assert_eq!(companies[0].company_name, "Acme Corp.");
    assert_eq!(companies[1].company_name, "Beta, Inc.");
}

#[tokio::test]
async fn test_wikipedia_server_error() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client =
        WikipediaUniverseClient::new(format!("{}/wiki/Nasdaq-100", server.uri()), TIMEOUT).unwrap();
    assert_matches!(
        client.list_companies().await,
        Err(ApiError::Status { status: 500, .. })
    );
}

fn chart_body() -> serde_json::Value {
    // 2025-06-12 and 2025-06-13, 13:30 UTC
    json!({
        "chart": {
            "result": [{
                "meta": { "symbol": "ACM", "gmtoffset": -14400 },
                "timestamp": [1749735000, 1749821400],
                "indicators": {
                    "quote": [{ "close": [11.9, 12.1] }],
                    "adjclose": [{ "adjclose": [11.5, 12.0] }]
                }
            }],
            "error": null
        }
    })
}

#[tokio::test]
async fn test_yahoo_daily_closes() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ACM"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
        .mount(&server)
        .await;

    let client = YahooPriceClient::new(server.uri(), TIMEOUT).unwrap();
    let closes = client
        .daily_closes("ACM", date(2025, 6, 11), date(2025, 6, 14))
        .await
        .unwrap();
    let pairs: Vec<_> = closes.iter().map(|c| (c.date, c.close)).collect();
    assert_eq!(
        pairs,
        vec![(date(2025, 6, 12), 11.5), (date(2025, 6, 13), 12.0)]
    );
}

#[tokio::test]
async fn test_price_oracle_over_yahoo() {
    init_test_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ACM"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/GONE"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        })))
        .mount(&server)
        .await;

    let oracle = PriceOracle::new(YahooPriceClient::new(server.uri(), TIMEOUT).unwrap());

    // Saturday resolves to Friday's close
    assert_eq!(
        oracle.price_on("ACM", Some(date(2025, 6, 14))).await,
        Some(PriceQuote {
            price: 12.0,
            resolved_date: date(2025, 6, 13),
        })
    );
    assert_eq!(oracle.price_on("GONE", Some(date(2025, 6, 13))).await, None);
}
