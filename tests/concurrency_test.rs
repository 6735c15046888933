mod common;

use chrono::Utc;
use common::*;
use rust_decimal_macros::dec;
use tour_settlement::application::engine::WebhookOutcome;
use tour_settlement::domain::ports::SettlementStore;
use uuid::Uuid;

const DELIVERIES: u64 = 16;

async fn deliver_concurrently(h: &Harness, same_gateway_id: bool) -> Vec<WebhookOutcome> {
    let mut handles = Vec::new();
    for i in 0..DELIVERIES {
        let engine = h.engine.clone();
        let gateway_id = if same_gateway_id { 4242 } else { 5000 + i };
        let notification = incoming(gateway_id, dec!(4000000), "Thanh toan TK20251104001");
        handles.push(tokio::spawn(async move {
            engine.process_notification(notification).await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }
    outcomes
}

async fn assert_settled_once(h: &Harness, outcomes: &[WebhookOutcome], tour_id: Uuid) {
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Completed(_)))
        .count();
    let duplicates = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::AlreadyProcessed(_)))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(duplicates, outcomes.len() - 1);

    assert_eq!(h.store.transaction_count().await, 1);
    assert_eq!(h.store.revenue_share_count().await, 2);
    assert_eq!(h.store.tour(tour_id).await.unwrap().unwrap().booking_count, 1);
    assert_eq!(h.mailer.sent().await.len(), 1);
    assert_eq!(h.publisher.events_on("admin-transactions").await.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redeliveries_settle_once() {
    let h = Harness::new();
    let t = tour(Uuid::new_v4());
    let b = booking("TK20251104001", &t, BOOKING_TOTAL, days_from(Utc::now(), 30));
    h.seed_booking(&b, &t).await;

    let outcomes = deliver_concurrently(&h, true).await;
    assert_settled_once(&h, &outcomes, t.id).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_for_one_reference_settle_once() {
    let h = Harness::new();
    let t = tour(Uuid::new_v4());
    let b = booking("TK20251104001", &t, BOOKING_TOTAL, days_from(Utc::now(), 30));
    h.seed_booking(&b, &t).await;

    let outcomes = deliver_concurrently(&h, false).await;
    assert_settled_once(&h, &outcomes, t.id).await;
}
