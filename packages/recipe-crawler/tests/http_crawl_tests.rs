//! HTTP fetcher and crawl tests against a local axum server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use recipe_crawler::testing::RecordingSink;
use recipe_crawler::{CrawlError, HttpFetcher, PageFetcher, RetryPolicy, SiteConfig, SiteCrawler};

#[derive(Default)]
struct Hits {
    flaky: AtomicUsize,
    down: AtomicUsize,
    missing: AtomicUsize,
}

async fn flaky(State(hits): State<Arc<Hits>>) -> (StatusCode, &'static str) {
    if hits.flaky.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, "try later")
    } else {
        (StatusCode::OK, "<html><h1>finally</h1></html>")
    }
}

async fn down(State(hits): State<Arc<Hits>>) -> StatusCode {
    hits.down.fetch_add(1, Ordering::SeqCst);
    StatusCode::BAD_GATEWAY
}

async fn missing(State(hits): State<Arc<Hits>>) -> StatusCode {
    hits.missing.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn listing_one() -> Html<&'static str> {
    Html(
        r#"<ul>
            <li><a class="recipe" href="/recipe/pancakes">Pancakes</a></li>
            <li><a class="recipe" href="/recipe/satay">Satay</a></li>
           </ul>
           <a class="next" href="/recipes?page=2">Next</a>"#,
    )
}

async fn listing_two() -> Html<&'static str> {
    Html(
        r#"<ul><li><a class="recipe" href="/recipe/satay">Satay</a></li></ul>
           <a class="next" href="/recipes">Back to start</a>"#,
    )
}

async fn pancakes() -> Html<&'static str> {
    Html(
        r#"<article>
             <h1 class="recipe-title">Pancakes</h1>
             <ul class="ingredients"><li>2 cups all-purpose flour (sifted)</li><li>2 eggs</li><li>1 cup milk</li></ul>
             <ol class="steps"><li>Whisk.</li><li>Fry.</li></ol>
             <span class="tag">Breakfast</span>
           </article>"#,
    )
}

async fn satay() -> Html<&'static str> {
    Html(
        r#"<article>
             <h1 class="recipe-title">Chicken Satay</h1>
             <ul class="ingredients"><li>3 tbsp peanut butter</li><li>1 tbsp soy sauce</li></ul>
           </article>"#,
    )
}

async fn serve() -> (SocketAddr, Arc<Hits>) {
    let hits = Arc::new(Hits::default());
    let app = Router::new()
        .route("/flaky", get(flaky))
        .route("/down", get(down))
        .route("/missing", get(missing))
        .route("/recipes", get(listing_dispatch))
        .route("/recipe/pancakes", get(pancakes))
        .route("/recipe/satay", get(satay))
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, hits)
}

async fn listing_dispatch(
    axum::extract::RawQuery(query): axum::extract::RawQuery,
) -> Html<&'static str> {
    match query.as_deref() {
        Some("page=2") => listing_two().await,
        _ => listing_one().await,
    }
}

fn fast_fetcher() -> HttpFetcher {
    HttpFetcher::new(Duration::from_secs(5))
        .unwrap()
        .with_retry_policy(RetryPolicy::default().with_backoff_factor(Duration::from_millis(5)))
}

#[tokio::test]
async fn test_retries_transient_status_then_succeeds() {
    let (addr, hits) = serve().await;
    let fetcher = fast_fetcher();

    let html = fetcher.fetch(&format!("http://{}/flaky", addr)).await.unwrap();

    assert!(html.contains("finally"));
    assert_eq!(hits.flaky.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_gives_up_after_three_attempts() {
    let (addr, hits) = serve().await;
    let fetcher = fast_fetcher();

    let err = fetcher
        .fetch(&format!("http://{}/down", addr))
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Fetch { attempts: 3, .. }));
    assert_eq!(hits.down.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_does_not_retry_client_errors() {
    let (addr, hits) = serve().await;
    let fetcher = fast_fetcher();

    let err = fetcher
        .fetch(&format!("http://{}/missing", addr))
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlError::Fetch { attempts: 1, .. }));
    assert_eq!(hits.missing.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_crawl_over_http_follows_pagination_once() {
    let (addr, _hits) = serve().await;
    let base = format!("http://{}", addr);
    let config = SiteConfig::new("Local", format!("{}/recipes", base), "a.recipe")
        .with_pagination("a.next")
        .with_title("h1.recipe-title")
        .with_ingredients("ul.ingredients li")
        .with_instructions("ol.steps li")
        .with_tags("span.tag")
        .validated()
        .unwrap();

    let fetcher = fast_fetcher();
    let sink = RecordingSink::new();
    let summary = SiteCrawler::new(&config, &fetcher).crawl(&sink).await;

    assert_eq!(summary.links_found, 2);
    assert_eq!(summary.saved, 2);
    assert_eq!(summary.failed, 0);

    let mut records = sink.records();
    records.sort_by(|a, b| a.1.title.cmp(&b.1.title));
    assert_eq!(records[0].1.title, "Chicken Satay");
    assert_eq!(records[1].1.title, "Pancakes");
    assert_eq!(records[1].1.instructions, vec!["Whisk.", "Fry."]);
    assert_eq!(records[1].1.tags_text(), "Breakfast");
    assert_eq!(records[1].0, format!("{}/recipe/pancakes", base));
}
