mod common;

use axum::http::StatusCode;
use common::{body_json, body_text, TestApp};
use roomservice_api::auth::Role;

#[tokio::test]
async fn portal_requires_an_operator_token() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Gate Hotel").await;

    let response = app.get("/portal/live/poll", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "unauthorized");

    let response = app.get("/portal/live/poll", Some("not-a-jwt")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let guest = app.token(Role::Guest, Some(fx.hotel.id));
    let response = app.get("/portal/live/poll", Some(&guest)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let homeless = app.token(Role::Staff, None);
    let response = app.get("/portal/live/poll", Some(&homeless)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "no_hotel");
}

#[tokio::test]
async fn poll_and_actions_drive_the_board() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Live Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;
    let request = app
        .state
        .services
        .requests
        .request_service(&guest, fx.towels.id)
        .await
        .unwrap();
    let token = app.token(Role::Staff, Some(fx.hotel.id));

    let response = app.get("/portal/live/poll", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["new"].as_array().unwrap().len(), 1);
    assert_eq!(snapshot["new"][0]["id"], request.id.to_string());
    assert_eq!(snapshot["new"][0]["room"], "101");
    assert_eq!(snapshot["counts"]["completed_today"], 0);

    let action_path = format!("/portal/live/{}/action", request.id);
    let response = app
        .post_form(&action_path, &[("action", "accept")], Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"], "ACCEPTED");

    let response = app
        .post_form(&action_path, &[("action", "accept")], Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "bad_state");

    let response = app
        .post_form(&action_path, &[("action", "shred")], Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_form(&action_path, &[("action", "complete")], Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let snapshot = body_json(app.get("/portal/live/poll", Some(&token)).await).await;
    assert!(snapshot["new"].as_array().unwrap().is_empty());
    assert!(snapshot["accepted"].as_array().unwrap().is_empty());
    assert_eq!(snapshot["counts"]["completed_today"], 1);
}

#[tokio::test]
async fn detail_is_scoped_to_the_operators_hotel() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Detail Hotel").await;
    let other = app.seed_fixture("Rival Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;

    app.state
        .services
        .cart
        .add_item(&guest, fx.steak.id, 2)
        .await
        .unwrap();
    let order = app
        .state
        .services
        .requests
        .submit_order(&guest)
        .await
        .unwrap();

    let path = format!("/portal/live/{}/detail", order.id);

    let token = app.token(Role::HotelAdmin, Some(fx.hotel.id));
    let response = app.get(&path, Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], true);
    let html = body["html"].as_str().unwrap();
    assert!(html.contains("Steak"));
    assert!(html.contains("240.00"));

    let rival = app.token(Role::HotelAdmin, Some(other.hotel.id));
    let response = app.get(&path, Some(&rival)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let platform = app.token(Role::PlatformAdmin, None);
    let response = app.get(&path, Some(&platform)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn board_page_embeds_the_initial_snapshot() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Page Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;
    let request = app
        .state
        .services
        .requests
        .request_service(&guest, fx.towels.id)
        .await
        .unwrap();
    let token = app.token(Role::Staff, Some(fx.hotel.id));

    let response = app.get("/portal/live", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("initial-snapshot"));
    assert!(html.contains(&request.id.to_string()));
    assert!(html.contains("data-poll-url=\"/portal/live/poll\""));
    assert!(html.contains("data-board-url=\"/portal/live\""));
    assert!(html.contains("data-action=\"accept\""));
    assert!(html.contains("window.setInterval(poll, interval)"));
}

#[tokio::test]
async fn simultaneous_actions_leave_the_loser_with_bad_state() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Rival Desks Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;
    let request = app
        .state
        .services
        .requests
        .request_service(&guest, fx.towels.id)
        .await
        .unwrap();
    let front_desk = app.token(Role::Staff, Some(fx.hotel.id));
    let manager = app.token(Role::HotelAdmin, Some(fx.hotel.id));
    let action_path = format!("/portal/live/{}/action", request.id);

    let (first, second) = tokio::join!(
        app.post_form(&action_path, &[("action", "accept")], Some(&front_desk)),
        app.post_form(&action_path, &[("action", "accept")], Some(&manager)),
    );

    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::CONFLICT]);

    let loser = if first.status() == StatusCode::CONFLICT {
        first
    } else {
        second
    };
    let body = body_json(loser).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"], "bad_state");
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "healthy");
}
