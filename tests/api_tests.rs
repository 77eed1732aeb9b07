//! API integration tests
//!
//! Run against a live server with a fresh database:
//! `cargo test -- --ignored`

use reqwest::Client;
use serde_json::Value;

use alexandria_server::models::user::UserClaims;

const BASE_URL: &str = "http://localhost:8080/api/v1";
const JWT_SECRET: &str = "change-this-secret-in-production";
const FAR_FUTURE: i64 = 4102444800; // 2100-01-01

/// Mint a token the way the external identity service would
fn token_for(user_id: i32, is_admin: bool) -> String {
    let claims = UserClaims {
        sub: format!("user-{user_id}"),
        user_id,
        is_admin,
        exp: FAR_FUTURE,
        iat: 0,
    };
    claims
        .create_token(JWT_SECRET)
        .expect("Failed to create token")
}

async fn create_user(client: &Client, admin: &str, email: &str) -> i32 {
    let response = client
        .post(format!("{}/users", BASE_URL))
        .bearer_auth(admin)
        .json(&serde_json::json!({
            "full_name": "Test Patron",
            "email": email,
            "hashed_password": "$argon2id$opaque-test-hash"
        }))
        .send()
        .await
        .expect("Failed to create user");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse user");
    body["id"].as_i64().expect("No user id") as i32
}

async fn create_book(client: &Client, admin: &str, isbn: &str, copies: i32) -> i32 {
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(admin)
        .json(&serde_json::json!({
            "title": "The Consistency Engine",
            "author": "A. Librarian",
            "isbn": isbn,
            "total_copies": copies
        }))
        .send()
        .await
        .expect("Failed to create book");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse book");
    body["id"].as_i64().expect("No book id") as i32
}

async fn get_book(client: &Client, admin: &str, book_id: i32) -> Value {
    client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(admin)
        .send()
        .await
        .expect("Failed to get book")
        .json()
        .await
        .expect("Failed to parse book")
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_missing_token_is_unauthorized() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_non_admin_cannot_create_books() {
    let client = Client::new();
    let patron = token_for(99999, false);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&patron)
        .json(&serde_json::json!({
            "title": "Nope",
            "author": "Nobody",
            "isbn": "9999999999",
            "total_copies": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

/// Full lifecycle: borrow the last copy, watch the second borrow fail,
/// return, and see the copy come back.
#[tokio::test]
#[ignore]
async fn test_borrow_return_lifecycle() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user_a = create_user(&client, &admin, "lifecycle-a@example.com").await;
    let user_b = create_user(&client, &admin, "lifecycle-b@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000017", 1).await;

    // Borrow the only copy
    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}",
            BASE_URL, user_a, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to create loan");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    let book = get_book(&client, &admin, book_id).await;
    assert_eq!(book["available_copies"], 0);

    // Second borrow must fail immediately, no queueing
    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}",
            BASE_URL, user_b, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send second borrow");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "OutOfStock");

    // Return the first loan
    let response = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to return loan");
    assert!(response.status().is_success());
    let returned: Value = response.json().await.expect("Failed to parse return");
    assert_eq!(returned["status"], "returned");

    let book = get_book(&client, &admin, book_id).await;
    assert_eq!(book["available_copies"], 1);
}

/// Two simultaneous borrows of a single remaining copy: exactly one
/// succeeds and one observes OutOfStock.
#[tokio::test]
#[ignore]
async fn test_concurrent_borrows_one_winner() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user_a = create_user(&client, &admin, "race-a@example.com").await;
    let user_b = create_user(&client, &admin, "race-b@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000024", 1).await;

    let borrow = |user_id: i32| {
        let client = client.clone();
        let admin = admin.clone();
        async move {
            client
                .post(format!(
                    "{}/loans?user_id={}&book_id={}",
                    BASE_URL, user_id, book_id
                ))
                .bearer_auth(&admin)
                .send()
                .await
                .expect("Failed to send borrow")
                .status()
        }
    };

    let (first, second) = tokio::join!(borrow(user_a), borrow(user_b));

    let statuses = [first.as_u16(), second.as_u16()];
    assert!(
        statuses.contains(&201) && statuses.contains(&409),
        "expected one 201 and one 409, got {:?}",
        statuses
    );

    let book = get_book(&client, &admin, book_id).await;
    assert_eq!(book["available_copies"], 0);
}

/// Returning the same loan twice: one success, one AlreadyReturned, and the
/// copy is released exactly once.
#[tokio::test]
#[ignore]
async fn test_double_return_is_rejected() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user = create_user(&client, &admin, "double-return@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000031", 2).await;

    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}",
            BASE_URL, user, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to create loan");
    assert_eq!(response.status(), 201);
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    let first = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed first return");
    assert!(first.status().is_success());

    let second = client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed second return");
    assert_eq!(second.status(), 409);
    let body: Value = second.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "AlreadyReturned");

    // Released exactly once
    let book = get_book(&client, &admin, book_id).await;
    assert_eq!(book["available_copies"], 2);
}

/// Extensions are cumulative: +7 then +3 pushes due_date by 10 days.
#[tokio::test]
#[ignore]
async fn test_extensions_are_cumulative() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user = create_user(&client, &admin, "extend@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000048", 1).await;

    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}&loan_period_days=14",
            BASE_URL, user, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to create loan");
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");
    let original_due = loan["due_date"].as_str().expect("No due date").to_string();

    let response = client
        .post(format!(
            "{}/loans/{}/extend?extension_days=7",
            BASE_URL, loan_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed first extend");
    assert!(response.status().is_success());

    let response = client
        .post(format!(
            "{}/loans/{}/extend?extension_days=3",
            BASE_URL, loan_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed second extend");
    assert!(response.status().is_success());
    let extended: Value = response.json().await.expect("Failed to parse loan");

    let original: chrono::DateTime<chrono::Utc> =
        original_due.parse().expect("Failed to parse due date");
    let new_due: chrono::DateTime<chrono::Utc> = extended["due_date"]
        .as_str()
        .expect("No due date")
        .parse()
        .expect("Failed to parse due date");
    assert_eq!(new_due - original, chrono::Duration::days(10));

    // Zero and negative extensions are rejected before any mutation
    let response = client
        .post(format!(
            "{}/loans/{}/extend?extension_days=0",
            BASE_URL, loan_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed zero extend");
    assert_eq!(response.status(), 400);

    // So is an extension too large for interval arithmetic
    let response = client
        .post(format!(
            "{}/loans/{}/extend?extension_days=2147483648",
            BASE_URL, loan_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed oversized extend");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "InvalidExtension");

    // Neither rejection moved the due date
    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to get loan");
    let details: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(
        details["due_date"].as_str().expect("No due date"),
        extended["due_date"].as_str().expect("No due date")
    );
}

/// A loan period the date arithmetic cannot represent is rejected up
/// front: no loan is created and no copy is reserved.
#[tokio::test]
#[ignore]
async fn test_out_of_range_loan_period_is_rejected() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user = create_user(&client, &admin, "huge-period@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000086", 1).await;

    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}&loan_period_days={}",
            BASE_URL,
            user,
            book_id,
            i64::MAX
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send borrow");
    assert_eq!(response.status(), 400);

    // The copy is still on the shelf and still borrowable
    let book = get_book(&client, &admin, book_id).await;
    assert_eq!(book["available_copies"], 1);

    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}",
            BASE_URL, user, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to borrow");
    assert_eq!(response.status(), 201);
}

/// Extending a returned loan fails and leaves inventory untouched.
#[tokio::test]
#[ignore]
async fn test_extend_returned_loan_is_rejected() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user = create_user(&client, &admin, "extend-closed@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000055", 1).await;

    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}",
            BASE_URL, user, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to create loan");
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to return loan");

    let response = client
        .post(format!(
            "{}/loans/{}/extend?extension_days=7",
            BASE_URL, loan_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed extend");
    assert_eq!(response.status(), 409);

    let book = get_book(&client, &admin, book_id).await;
    assert_eq!(book["available_copies"], 1);
}

/// Shrinking total_copies below the loaned count is InvalidCapacity;
/// growing it adds available copies.
#[tokio::test]
#[ignore]
async fn test_capacity_adjustment_respects_open_loans() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user = create_user(&client, &admin, "capacity@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000062", 2).await;

    client
        .post(format!(
            "{}/loans?user_id={}&book_id={}",
            BASE_URL, user, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to create loan");

    // One copy is on loan; shrinking to zero must be rejected
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "total_copies": 0 }))
        .send()
        .await
        .expect("Failed shrink request");
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse error");
    assert_eq!(body["error"], "InvalidCapacity");

    // Growing to 5 leaves 4 available (1 still on loan)
    let response = client
        .put(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&admin)
        .json(&serde_json::json!({ "total_copies": 5 }))
        .send()
        .await
        .expect("Failed grow request");
    assert!(response.status().is_success());
    let book: Value = response.json().await.expect("Failed to parse book");
    assert_eq!(book["total_copies"], 5);
    assert_eq!(book["available_copies"], 4);
}

/// Absurd pagination values are normalized instead of erroring
#[tokio::test]
#[ignore]
async fn test_huge_page_number_is_served_empty() {
    let client = Client::new();
    let admin = token_for(1, true);

    let response = client
        .get(format!(
            "{}/books?page={}&per_page={}",
            BASE_URL,
            i64::MAX,
            i64::MAX
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to list books");
    assert_eq!(response.status(), 200);
}

/// Overdue status is derived from timestamps on read
#[tokio::test]
#[ignore]
async fn test_overdue_listing() {
    let client = Client::new();
    let admin = token_for(1, true);

    let user = create_user(&client, &admin, "overdue@example.com").await;
    let book_id = create_book(&client, &admin, "9780000000079", 1).await;

    let response = client
        .post(format!(
            "{}/loans?user_id={}&book_id={}&loan_period_days=365",
            BASE_URL, user, book_id
        ))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to create loan");
    let loan: Value = response.json().await.expect("Failed to parse loan");
    let loan_id = loan["id"].as_i64().expect("No loan id");

    // A fresh year-long loan is active, not overdue
    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to get loan");
    let details: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(details["status"], "active");

    let response = client
        .get(format!("{}/loans/overdue/", BASE_URL))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to list overdue");
    let overdue: Value = response.json().await.expect("Failed to parse list");
    assert!(overdue
        .as_array()
        .expect("Expected array")
        .iter()
        .all(|l| l["id"].as_i64() != Some(loan_id)));

    // After returning, status is terminal regardless of dates
    client
        .post(format!("{}/loans/{}/return", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to return loan");

    let response = client
        .get(format!("{}/loans/{}", BASE_URL, loan_id))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to get loan");
    let details: Value = response.json().await.expect("Failed to parse loan");
    assert_eq!(details["status"], "returned");
}
