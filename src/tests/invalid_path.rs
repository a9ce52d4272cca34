use axum::http::Method;
use axum::http::StatusCode;

use crate::tests::helper;

#[tokio::test]
async fn test_malformed_delivery_id() {
    let mut app = helper::setup_test_app().await;

    helper::create_delivery(&mut app, "本部", "Think Life旭", &[("Towels", 1)]).await;

    // not an ID, so no delivery either
    for delivery_id in ["1", "2024-06-15", "20240615-1", "20240615_001", "2024061A-001"] {
        let (status_code, delivery, error) = helper::single_delivery(&mut app, delivery_id).await;
        assert_eq!(StatusCode::NOT_FOUND, status_code, "{delivery_id}");
        assert!(delivery.is_none());
        assert_eq!(Some("Delivery not found".to_string()), error);

        let (status_code, _, error) =
            helper::maybe_receive_delivery(&mut app, Method::PATCH, delivery_id, "Tanaka").await;
        assert_eq!(StatusCode::NOT_FOUND, status_code, "{delivery_id}");
        assert_eq!(Some("Delivery not found".to_string()), error);

        let (status_code, _, error) = helper::maybe_delete_delivery(&mut app, delivery_id).await;
        assert_eq!(StatusCode::NOT_FOUND, status_code, "{delivery_id}");
        assert_eq!(Some("Delivery not found".to_string()), error);
    }

    // well formed, but not there
    let (status_code, _, error) = helper::single_delivery(&mut app, "20240615-001").await;
    assert_eq!(StatusCode::NOT_FOUND, status_code);
    assert_eq!(Some("Delivery not found".to_string()), error);

    // the existing delivery is untouched
    let (_, deliveries, _) = helper::list_deliveries(&mut app, &[("status", "sent")]).await;
    assert_eq!(1, deliveries.unwrap().len());
}
