use crate::branches::BRANCHES;

use super::Success;

/// List all branches
///
/// Request:
/// ```sh
/// curl -v http://localhost:3001/api/branches
/// ```
pub async fn list() -> Success<Vec<&'static str>> {
    Success::ok(BRANCHES.to_vec())
}
