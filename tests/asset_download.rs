//! Image migration against a local image server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use sermitsiaq_ingest::models::{Article, ImageData, Language};
use sermitsiaq_ingest::services::{AssetConfig, AssetFetcher};
use tempfile::tempdir;

const ORIGIN: &str = "https://www.sermitsiaq.com";
const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";
const JPEG: &[u8] = b"\xff\xd8\xff\xe0\x00\x10JFIF\x00";

/// Serves `<name>` with bytes chosen by extension; counts hits.
async fn serve_images() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/:name",
            get(
                |State(hits): State<Arc<AtomicUsize>>, Path(name): Path<String>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    if name.starts_with("missing") {
                        return Err(StatusCode::NOT_FOUND);
                    }
                    Ok(if name.ends_with(".jpg") { JPEG } else { WEBP })
                },
            ),
        )
        .with_state(hits.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), hits)
}

fn fetcher(dir: &std::path::Path, all: bool) -> AssetFetcher {
    let config = AssetConfig {
        download_all_formats: all,
        timeout_secs: 5,
    };
    AssetFetcher::new(&config, dir, ORIGIN).unwrap()
}

#[tokio::test]
async fn partial_coverage_downloads_primaries_and_backfills() {
    let (base, hits) = serve_images().await;
    let dir = tempdir().unwrap();
    let fetcher = fetcher(dir.path(), false);

    let mut article =
        Article::new(Language::Da, "Billede", "https://www.sermitsiaq.ag/kultur/b/1");
    article.image_data = Some(ImageData {
        desktop_webp: Some(format!("{base}/2329660.webp?imageId=2329660")),
        fallback: Some(format!("{base}/2329660.webp?imageId=2329660&format=jpg")),
        ..Default::default()
    });
    fetcher.localize_article(&mut article).await;

    let image = article.image_data.clone().unwrap();
    let webp = format!("{ORIGIN}/static/uploads/images/2329660.webp");
    assert_eq!(image.desktop_webp.as_deref(), Some(webp.as_str()));
    assert_eq!(
        image.fallback.as_deref(),
        Some(format!("{ORIGIN}/static/uploads/images/2329660.jpg").as_str())
    );
    for backfilled in [&image.desktop_jpeg, &image.mobile_webp, &image.mobile_jpeg] {
        assert_eq!(backfilled.as_deref(), Some(webp.as_str()));
    }
    assert!(dir.path().join("2329660.webp").is_file());
    assert!(dir.path().join("2329660.jpg").is_file());
    assert_eq!(hits.load(Ordering::SeqCst), 2);

    // Fixed point: nothing changes and nothing is requested.
    let before = article.clone();
    assert_eq!(fetcher.localize_article(&mut article).await, 0);
    assert_eq!(article, before);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stored_files_are_reused_across_urls() {
    let (base, hits) = serve_images().await;
    let dir = tempdir().unwrap();
    let fetcher = fetcher(dir.path(), true);

    let first = fetcher
        .fetch(&format!("{base}/77.webp?imageId=77&width=600"))
        .await
        .unwrap();
    let second = fetcher
        .fetch(&format!("{base}/77.webp?imageId=77&width=1200"))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(first, format!("{ORIGIN}/static/uploads/images/77.webp"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // Content sniffing picks the extension when the URL has none.
    let sniffed = fetcher.fetch(&format!("{base}/88")).await.unwrap();
    assert!(sniffed.ends_with("/88.webp"));
}

#[tokio::test]
async fn failed_download_keeps_source_url() {
    let (base, _) = serve_images().await;
    let dir = tempdir().unwrap();
    let source = format!("{base}/missing.webp?imageId=404");
    let mut image = ImageData {
        desktop_webp: Some(source.clone()),
        ..Default::default()
    };
    fetcher(dir.path(), false).localize(&mut image).await;
    assert_eq!(image.desktop_webp.as_deref(), Some(source.as_str()));
    assert_eq!(image.mobile_webp, None);
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn first_download_creates_uploads_dir() {
    let (base, _) = serve_images().await;
    let root = tempdir().unwrap();
    let uploads = root.path().join("static").join("uploads").join("images");
    let stored = fetcher(&uploads, false)
        .fetch(&format!("{base}/12.jpg?imageId=12"))
        .await
        .unwrap();
    assert_eq!(stored, format!("{ORIGIN}/static/uploads/images/12.jpg"));
    assert!(uploads.join("12.jpg").is_file());
}
