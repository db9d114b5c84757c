mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use commit_age_exporter::collector::{Collector, CycleReport};
use commit_age_exporter::metrics::{MetricSample, Metrics};
use commit_age_exporter::providers::{GithubFetcher, GithubFetcherConfig};
use commit_age_exporter::startup;
use common::{
    Answer, ScriptedFetcher, build_app, commit_age_lines, get, load_test_config, sample_value,
};
use mockito::{Matcher, Server};
use tokio::sync::broadcast;

const TWO_REPOS: &str = r#"
repo_names: "a/b,c/d"
scrape_interval: "1s"
"#;

#[tokio::test]
async fn integration_one_success_one_failure() {
    let config = load_test_config(TWO_REPOS);
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (
            "a/b",
            vec![Answer::Commit {
                age_secs: 5,
                sha: "abcdef1234567890",
            }],
        ),
        ("c/d", vec![Answer::Fail]),
    ]));
    let metrics = Metrics::new().unwrap();
    let collector = Collector::new(
        fetcher.clone(),
        metrics.clone(),
        config.repo_names.clone(),
        config.scrape_interval,
    );

    let report = collector.run_cycle().await;
    assert_eq!(
        report,
        CycleReport {
            updated: 1,
            failed: 1,
            skipped: 0
        }
    );

    let app = build_app(config, metrics);
    let (status, content_type, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content_type.as_deref(),
        Some("text/plain; version=0.0.4; charset=utf-8")
    );

    let lines = commit_age_lines(&body);
    assert_eq!(lines.len(), 1, "unexpected samples: {:?}", lines);
    assert!(lines[0].contains(r#"repository="a/b""#));
    assert!(lines[0].contains(r#"commit_sha="abcdef12""#));
    assert!((sample_value(lines[0]) - 5.0).abs() < 1.0);
    assert!(body.contains(
        r#"github_commit_fetch_failures_total{reason="status",repository="c/d"} 1"#
    ));
}

#[tokio::test]
async fn integration_failed_cycle_keeps_previous_value() {
    let config = load_test_config(TWO_REPOS);
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        (
            "a/b",
            vec![
                Answer::Commit {
                    age_secs: 30,
                    sha: "1234567890abcdef",
                },
                Answer::Fail,
            ],
        ),
        (
            "c/d",
            vec![
                Answer::Commit {
                    age_secs: 10,
                    sha: "00000000aaaaaaaa",
                },
                Answer::Commit {
                    age_secs: 1,
                    sha: "11111111bbbbbbbb",
                },
            ],
        ),
    ]));
    let metrics = Metrics::new().unwrap();
    let collector = Collector::new(
        fetcher,
        metrics.clone(),
        config.repo_names.clone(),
        config.scrape_interval,
    );

    collector.run_cycle().await;
    let first: Vec<MetricSample> = metrics.samples();
    assert_eq!(first.len(), 2);

    let report = collector.run_cycle().await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.updated, 1);

    let second = metrics.samples();
    // a/b failed: its sample is frozen, not cleared.
    assert_eq!(second[0], first[0]);
    // c/d moved to a new commit, which adds a new series next to the old one.
    assert_eq!(second.len(), 3);
    assert_eq!(second[1].commit_sha, "00000000");
    assert_eq!(second[2].commit_sha, "11111111");
    assert!((second[2].value - 1.0).abs() < 1.0);

    let app = build_app(config, metrics);
    let (_, _, body) = get(&app, "/metrics").await;
    let a_b: Vec<&str> = commit_age_lines(&body)
        .into_iter()
        .filter(|line| line.contains(r#"repository="a/b""#))
        .collect();
    assert_eq!(a_b.len(), 1);
    assert_eq!(sample_value(a_b[0]), first[0].value);
}

#[tokio::test]
async fn integration_malformed_repository_is_skipped() {
    let config = load_test_config(
        "repo_names: \"onlyname,octo/widgets#x,a/..\"\nscrape_interval: 1s\n",
    );
    let fetcher = Arc::new(ScriptedFetcher::default());
    let metrics = Metrics::new().unwrap();
    let collector = Collector::new(
        fetcher.clone(),
        metrics.clone(),
        config.repo_names.clone(),
        config.scrape_interval,
    );

    let report = collector.run_cycle().await;
    assert_eq!(report.skipped, 3);
    assert!(fetcher.calls.lock().unwrap().is_empty());
    assert!(metrics.samples().is_empty());
    assert_eq!(
        metrics.fetch_failures("octo/widgets#x", "invalid_repository"),
        1.0
    );

    let app = build_app(config, metrics);
    let (status, _, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(commit_age_lines(&body).is_empty());
}

#[tokio::test]
async fn integration_pruning_replaces_superseded_series() {
    let config = load_test_config(
        "repo_names: a/b\nscrape_interval: 1s\nprune_superseded_shas: true\n",
    );
    let fetcher = Arc::new(ScriptedFetcher::new(&[(
        "a/b",
        vec![
            Answer::Commit {
                age_secs: 100,
                sha: "aaaaaaaa11111111",
            },
            Answer::Commit {
                age_secs: 2,
                sha: "bbbbbbbb22222222",
            },
        ],
    )]));
    let metrics = Metrics::with_pruning(config.prune_superseded_shas).unwrap();
    let collector = Collector::new(
        fetcher,
        metrics.clone(),
        config.repo_names.clone(),
        config.scrape_interval,
    );

    collector.run_cycle().await;
    collector.run_cycle().await;

    let samples = metrics.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].commit_sha, "bbbbbbbb");
}

#[tokio::test]
async fn integration_health() {
    let app = build_app(load_test_config(TWO_REPOS), Metrics::new().unwrap());
    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "OK");
}

/// Full path: HTTP lookups against a mock API, background loop, scrape.
#[tokio::test]
async fn integration_github_fetcher_loop() {
    let mut server = Server::new_async().await;
    let ok = server
        .mock("GET", "/repos/octo/widgets/commits")
        .match_query(Matcher::Any)
        .match_header("authorization", "token test-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"sha": "0f0f0f0f0f0f0f0f", "commit": {"committer": {"date": "2020-01-01T00:00:00Z"}}}]"#,
        )
        .expect_at_least(2)
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/repos/octo/missing/commits")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body(r#"{"message": "Not Found"}"#)
        .expect_at_least(1)
        .create_async()
        .await;

    let fetcher = Arc::new(
        GithubFetcher::new(GithubFetcherConfig {
            api_url: server.url(),
            access_token: "test-token".to_string(),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap(),
    );
    let metrics = Metrics::new().unwrap();
    let collector = Collector::new(
        fetcher,
        metrics.clone(),
        vec!["octo/widgets".to_string(), "octo/missing".to_string()],
        common::SHORT_INTERVAL,
    );

    let (tx, rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { collector.run(rx).await });

    tokio::time::timeout(Duration::from_secs(5), async {
        while metrics.cycles() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("two cycles should complete");
    tx.send(()).unwrap();
    handle.await.unwrap();

    ok.assert_async().await;
    missing.assert_async().await;

    let samples = metrics.samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].repository, "octo/widgets");
    assert_eq!(samples[0].commit_sha, "0f0f0f0f");
    // Committed on 2020-01-01, so well over four years old.
    assert!(samples[0].value > 4.0 * 365.0 * 86_400.0);
    assert!(metrics.fetch_failures("octo/missing", "status") >= 2.0);
}

#[tokio::test]
async fn integration_bind_failure_is_fatal() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();
    let config = load_test_config(&format!(
        "repo_names: a/b\nscrape_interval: 1s\nbind_address: \"{}\"\n",
        addr
    ));

    let result = tokio::time::timeout(Duration::from_secs(5), startup::run(Arc::new(config)))
        .await
        .expect("startup should fail fast");
    assert!(result.is_err());
}
