use axum::http::Method;
use axum::http::StatusCode;
use chrono::Local;
use serde_json::json;

use crate::tests::helper;

fn today_prefix() -> String {
    Local::now().date_naive().format("%Y%m%d").to_string()
}

#[tokio::test]
async fn test_create_delivery() {
    let mut app = helper::setup_test_app().await;

    let payload = json!({
        "date": "2024-06-15",
        "fromBranch": "  本部 ",
        "toBranch": "Think Life旭",
        "type": "delivery-note",
        "items": [
            { "name": "Towels", "quantity": 3 },
            { "name": "Gloves", "quantity": 10 },
        ],
        "note": "Fragile",
    });

    let (status_code, delivery_id, error) = helper::maybe_create_delivery(&mut app, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);
    assert!(error.is_none());

    let delivery_id = delivery_id.unwrap();
    assert_eq!(format!("{}-001", today_prefix()), delivery_id);

    let (status_code, delivery, _) = helper::single_delivery(&mut app, &delivery_id).await;
    assert_eq!(StatusCode::OK, status_code);

    let delivery = delivery.unwrap();
    assert_eq!(delivery_id, delivery.id);
    assert_eq!("2024-06-15", delivery.date);
    assert_eq!("本部", delivery.from_branch);
    assert_eq!("Think Life旭", delivery.to_branch);
    assert_eq!("delivery-note", delivery.kind);
    assert_eq!(
        vec![("Towels".to_string(), 3), ("Gloves".to_string(), 10)],
        delivery.items
    );
    assert_eq!("sent", delivery.status);
    assert_eq!(Some("Fragile".to_string()), delivery.note);
    assert!(delivery.received_at.is_none());
    assert!(delivery.received_by.is_none());
}

#[tokio::test]
async fn test_create_delivery_sequence() {
    let mut app = helper::setup_test_app().await;

    let first = helper::create_delivery(&mut app, "本部", "Life Up 可児", &[("Paper", 1)]).await;
    let second = helper::create_delivery(&mut app, "本部", "Life Up 可児", &[("Paper", 2)]).await;
    let third = helper::create_delivery(&mut app, "本部", "Life Up 可児", &[("Paper", 3)]).await;

    let prefix = today_prefix();
    assert_eq!(format!("{prefix}-001"), first);
    assert_eq!(format!("{prefix}-002"), second);
    assert_eq!(format!("{prefix}-003"), third);

    // a deleted ID is never handed out again
    let (status_code, _, _) = helper::maybe_delete_delivery(&mut app, &third).await;
    assert_eq!(StatusCode::OK, status_code);

    let fourth = helper::create_delivery(&mut app, "本部", "Life Up 可児", &[("Paper", 4)]).await;
    assert_eq!(format!("{prefix}-004"), fourth);
}

#[tokio::test]
async fn test_create_delivery_older_item_names() {
    let mut app = helper::setup_test_app().await;

    let payload = json!({
        "date": "2024-06-15",
        "fromBranch": "本部",
        "toBranch": "訪問看護ステーション旭",
        "type": "delivery-note",
        "items": [ { "item": "Masks", "qty": 50 } ],
    });

    let (status_code, delivery_id, _) = helper::maybe_create_delivery(&mut app, &payload).await;
    assert_eq!(StatusCode::CREATED, status_code);

    let (_, delivery, _) = helper::single_delivery(&mut app, &delivery_id.unwrap()).await;
    let delivery = delivery.unwrap();
    assert_eq!(vec![("Masks".to_string(), 50)], delivery.items);
    assert!(delivery.note.is_none());
}

#[tokio::test]
async fn test_create_delivery_validation() {
    let mut app = helper::setup_test_app().await;

    let mut payload = helper::delivery_payload("   ", "Think Life旭", &[("Towels", 1)]);
    let (status_code, delivery_id, error) = helper::maybe_create_delivery(&mut app, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert!(delivery_id.is_none());
    assert_eq!(Some("From branch can not be empty".to_string()), error);

    payload = helper::delivery_payload("本部", "Think Life旭", &[]);
    let (status_code, _, error) = helper::maybe_create_delivery(&mut app, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(
        Some("A delivery needs at least one item".to_string()),
        error
    );

    payload = helper::delivery_payload("本部", "Think Life旭", &[("Towels", 0)]);
    let (status_code, _, error) = helper::maybe_create_delivery(&mut app, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(
        Some(r#"Quantity of "Towels" must be between 1 and 2147483647"#.to_string()),
        error
    );

    payload = helper::delivery_payload("本部", "Think Life旭", &[(" ", 2)]);
    let (status_code, _, error) = helper::maybe_create_delivery(&mut app, &payload).await;
    assert_eq!(StatusCode::BAD_REQUEST, status_code);
    assert_eq!(Some("Item name can not be empty".to_string()), error);

    // nothing was stored, the next ID is still the first of the day
    let (_, deliveries, _) = helper::list_deliveries(&mut app, &[]).await;
    assert!(deliveries.unwrap().is_empty());

    let delivery_id = helper::create_delivery(&mut app, "本部", "Think Life旭", &[("Towels", 1)]).await;
    assert_eq!(format!("{}-001", today_prefix()), delivery_id);
}

#[tokio::test]
async fn test_delete_delivery() {
    let mut app = helper::setup_test_app().await;

    let delivery_id = helper::create_delivery(&mut app, "本部", "Think Life守山", &[("Soap", 2)]).await;

    let (status_code, message, _) = helper::maybe_delete_delivery(&mut app, &delivery_id).await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some("Deleted successfully".to_string()), message);

    let (status_code, _, error) = helper::single_delivery(&mut app, &delivery_id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Delivery not found".to_string()), error);

    let (status_code, _, error) = helper::maybe_delete_delivery(&mut app, &delivery_id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Delivery not found".to_string()), error);
}

#[tokio::test]
async fn test_delivery_lifecycle() {
    let mut app = helper::setup_test_app().await;

    let delivery_id = helper::create_delivery(&mut app, "HQ", "Site-A", &[("WidgetX", 3)]).await;
    assert!(delivery_id.starts_with(&today_prefix()));

    let (_, delivery, _) = helper::single_delivery(&mut app, &delivery_id).await;
    assert_eq!("sent", delivery.unwrap().status);

    let (status_code, received, _) =
        helper::maybe_receive_delivery(&mut app, Method::PUT, &delivery_id, "Tanaka").await;
    assert_eq!(StatusCode::OK, status_code);
    assert_eq!(Some("Tanaka".to_string()), received.unwrap().received_by);

    let (_, delivery, _) = helper::single_delivery(&mut app, &delivery_id).await;
    let delivery = delivery.unwrap();
    assert_eq!("received", delivery.status);
    assert_eq!(Some("Tanaka".to_string()), delivery.received_by);
    assert!(delivery.received_at.is_some());

    let (_, deliveries, _) = helper::list_deliveries(&mut app, &[("status", "received")]).await;
    assert!(
        deliveries
            .unwrap()
            .iter()
            .any(|delivery| delivery.id == delivery_id)
    );

    let (status_code, _, _) = helper::maybe_delete_delivery(&mut app, &delivery_id).await;
    assert_eq!(StatusCode::OK, status_code);

    let (status_code, delivery, _) = helper::single_delivery(&mut app, &delivery_id).await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert!(delivery.is_none());
}
