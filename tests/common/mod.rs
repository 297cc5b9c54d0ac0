#![allow(dead_code)]

use std::io::Cursor;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, RgbImage};
use proofbox::repo::PhotosRepository;
use proofbox::sync::{FeedHandle, Snapshot};
use proofbox::{Client, Config, SourceFile};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

pub const WAIT: Duration = Duration::from_secs(5);

/// Fresh file-backed store under a temp directory; the directory guard must
/// outlive the client.
pub async fn connect_client(app_id: &str) -> (Client, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let dir = TempDir::new().unwrap();
    let database_url = format!("sqlite://{}/photos.db", dir.path().display());

    let client = Client::connect(Config::new(database_url, app_id))
        .await
        .unwrap();

    (client, dir)
}

/// A feed subscription that forwards every snapshot into a channel.
pub fn channel_feed(
    repo: &PhotosRepository,
) -> (FeedHandle, mpsc::UnboundedReceiver<Snapshot>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = proofbox::sync::subscribe(
        repo,
        move |snapshot| {
            let _ = tx.send(snapshot);
        },
        |error| panic!("feed error: {error}"),
    );

    (handle, rx)
}

pub async fn wait_for_snapshot<F>(
    rx: &mut mpsc::UnboundedReceiver<Snapshot>,
    mut predicate: F,
) -> Snapshot
where
    F: FnMut(&Snapshot) -> bool,
{
    timeout(WAIT, async {
        loop {
            let snapshot = rx.recv().await.expect("feed ended before the condition was met");
            if predicate(&snapshot) {
                return snapshot;
            }
        }
    })
    .await
    .expect("timed out waiting for a snapshot")
}

/// Polls until `condition` holds; for state that settles out of band.
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    timeout(WAIT, async {
        while !condition() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("timed out waiting for the condition")
}

pub fn png_source(filename: &str, width: u32, height: u32) -> SourceFile {
    let raster = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 251) as u8, (y % 241) as u8, ((x ^ y) % 239) as u8])
    });

    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(raster)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    SourceFile::new(filename, bytes)
}
