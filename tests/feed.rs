mod common;

use std::time::Duration;

use common::{channel_feed, connect_client, wait_for_snapshot};
use proofbox::sync::FeedState;
use proofbox::{NewPhoto, PhotoId};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

/// Seeds a row directly in the backing table, bypassing the repository, so
/// tests can pin creation timestamps (or leave them unset).
async fn seed_row(pool: &sqlx::SqlitePool, namespace: &str, name: &str, created_at: Option<i64>) {
    sqlx::query(
        "insert into photos (namespace, filename, payload, selected, created_at, owner_id) \
         values ($1, $2, 'data:image/jpeg;base64,', 0, $3, 'seeder')",
    )
    .bind(namespace)
    .bind(name)
    .bind(created_at)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn delivers_the_current_state_on_subscribe() {
    let (client, _dir) = connect_client("initial").await;

    let (handle, mut rx) = channel_feed(client.repository());
    let snapshot = wait_for_snapshot(&mut rx, |_| true).await;

    assert!(snapshot.records.is_empty());
    assert_eq!(snapshot.selected_count, 0);
    assert_eq!(handle.state(), FeedState::Streaming);
}

#[tokio::test]
async fn orders_newest_first_with_unstamped_rows_last() {
    let (client, dir) = connect_client("ordering").await;
    let namespace = client.repository().namespace().as_str().to_string();

    let database_url = format!("sqlite://{}/photos.db", dir.path().display());
    let pool = sqlx::SqlitePool::connect(&database_url).await.unwrap();
    seed_row(&pool, &namespace, "t1.jpg", Some(1)).await;
    seed_row(&pool, &namespace, "t3.jpg", Some(3)).await;
    seed_row(&pool, &namespace, "t2.jpg", Some(2)).await;
    seed_row(&pool, &namespace, "pending.jpg", None).await;

    let (_handle, mut rx) = channel_feed(client.repository());
    let snapshot = wait_for_snapshot(&mut rx, |s| s.records.len() == 4).await;

    let names: Vec<&str> = snapshot
        .records
        .iter()
        .map(|r| r.filename.as_str())
        .collect();
    assert_eq!(names, ["t3.jpg", "t2.jpg", "t1.jpg", "pending.jpg"]);
}

#[tokio::test]
async fn every_write_fans_out_a_fresh_snapshot() {
    let (client, _dir) = connect_client("fanout").await;
    let repo = client.repository();

    let (_handle, mut rx) = channel_feed(repo);
    wait_for_snapshot(&mut rx, |s| s.records.is_empty()).await;

    let stored = repo
        .insert_photo(NewPhoto::new("new.jpg", "data:image/jpeg;base64,", "u1"))
        .await
        .unwrap();
    wait_for_snapshot(&mut rx, |s| s.records.len() == 1).await;

    repo.set_selected(stored.id, true).await.unwrap();
    let selected = wait_for_snapshot(&mut rx, |s| s.selected_count == 1).await;
    assert!(selected.records[0].selected);

    repo.delete_photo(stored.id).await.unwrap();
    let empty = wait_for_snapshot(&mut rx, |s| s.records.is_empty()).await;
    assert_eq!(empty.selected_count, 0);
}

#[tokio::test]
async fn count_matches_the_records_of_the_same_snapshot() {
    let (client, _dir) = connect_client("invariant").await;
    let repo = client.repository();

    let mut ids: Vec<PhotoId> = Vec::new();
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        let stored = repo
            .insert_photo(NewPhoto::new(name, "data:image/jpeg;base64,", "u1"))
            .await
            .unwrap();
        ids.push(stored.id);
    }
    repo.set_selected(ids[0], true).await.unwrap();
    repo.set_selected(ids[2], true).await.unwrap();
    repo.delete_photo(ids[1]).await.unwrap();

    let (_handle, mut rx) = channel_feed(repo);
    let snapshot =
        wait_for_snapshot(&mut rx, |s| s.records.len() == 2 && s.selected_count == 2).await;

    assert_eq!(
        snapshot.selected_count,
        snapshot.records.iter().filter(|r| r.selected).count()
    );
}

#[tokio::test]
async fn unsubscribe_stops_deliveries_and_is_idempotent() {
    let (client, _dir) = connect_client("teardown").await;
    let repo = client.repository();

    let (handle, mut rx) = channel_feed(repo);
    wait_for_snapshot(&mut rx, |_| true).await;

    handle.unsubscribe();
    handle.unsubscribe();
    assert_eq!(handle.state(), FeedState::Closed);

    repo.insert_photo(NewPhoto::new("late.jpg", "data:image/jpeg;base64,", "u1"))
        .await
        .unwrap();
    sleep(Duration::from_millis(200)).await;

    // The callback was dropped on unsubscribe, so the channel closes without
    // ever seeing the post-teardown write.
    timeout(common::WAIT, async {
        while let Some(snapshot) = rx.recv().await {
            assert!(snapshot.records.is_empty());
        }
    })
    .await
    .expect("deliveries kept arriving after unsubscribe");
}

#[tokio::test]
async fn transport_errors_reach_the_error_callback_once() {
    let (client, _dir) = connect_client("errors").await;
    client.close().await;

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let handle = proofbox::sync::subscribe(
        client.repository(),
        |_| panic!("no snapshot can be loaded from a closed store"),
        move |error| {
            let _ = error_tx.send(error.to_string());
        },
    );

    let reported = timeout(common::WAIT, error_rx.recv())
        .await
        .expect("timed out waiting for the feed error")
        .expect("error callback dropped without reporting");
    assert!(!reported.is_empty());
    assert_eq!(handle.state(), FeedState::Error);

    // Exactly once: the channel ends after the single report.
    assert!(error_rx.recv().await.is_none());
}
