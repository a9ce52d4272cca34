use axum::http::StatusCode;
use serde_json::Value;

use crate::branches::BRANCHES;
use crate::tests::helper;

#[tokio::test]
async fn test_branches() {
    let mut app = helper::setup_test_app().await;

    let (status_code, _, body) = helper::get(&mut app, "/api/branches").await;
    assert_eq!(StatusCode::OK, status_code);

    let branches = serde_json::from_slice::<Vec<Value>>(&body[..]).unwrap();
    assert_eq!(BRANCHES.len(), branches.len());
    assert_eq!(Some("本部"), branches[0].as_str());
    assert!(branches.iter().any(|branch| branch == "Think Life旭"));
}
