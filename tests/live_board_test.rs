mod common;

use assert_matches::assert_matches;
use common::TestApp;
use roomservice_api::{
    auth::Role,
    entities::request::{RequestKind, RequestStatus},
    errors::ServiceError,
    services::request_status::RequestAction,
};
use rust_decimal_macros::dec;

#[tokio::test]
async fn snapshot_splits_open_requests_and_counts_closed_ones() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Board Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;
    let services = &app.state.services;
    let staff = app.operator(Role::Staff, Some(fx.hotel.id));

    services.cart.add_item(&guest, fx.steak.id, 2).await.unwrap();
    services.cart.add_item(&guest, fx.salad.id, 1).await.unwrap();
    let food = services.requests.submit_order(&guest).await.unwrap();

    let towels = services
        .requests
        .request_service(&guest, fx.towels.id)
        .await
        .unwrap();
    services
        .requests
        .transition(&staff, towels.id, RequestAction::Accept)
        .await
        .unwrap();

    let snapshot = services.live_board.snapshot(&staff).await.unwrap();
    assert_eq!(snapshot.new.len(), 1);
    assert_eq!(snapshot.accepted.len(), 1);

    let card = &snapshot.new[0];
    assert_eq!(card.id, food.id);
    assert_eq!(card.kind, RequestKind::Food);
    assert_eq!(card.room, "101");
    assert_eq!(card.subtotal, dec!(290.50));
    assert_eq!(card.lines.len(), 2);

    let accepted = &snapshot.accepted[0];
    assert_eq!(accepted.id, towels.id);
    assert_eq!(accepted.status, RequestStatus::Accepted);
    assert!(accepted.accepted_at.is_some());
    assert!(accepted.lines.is_empty());

    assert_eq!(snapshot.counts.completed_today, 0);
    assert_eq!(snapshot.counts.cancelled_today, 0);

    // Closing both moves them off the board and into the counters.
    services
        .requests
        .transition(&staff, towels.id, RequestAction::Complete)
        .await
        .unwrap();
    services
        .requests
        .transition(&staff, food.id, RequestAction::Cancel)
        .await
        .unwrap();

    let snapshot = services.live_board.poll(&staff).await.unwrap();
    assert!(snapshot.new.is_empty());
    assert!(snapshot.accepted.is_empty());
    assert_eq!(snapshot.counts.completed_today, 1);
    assert_eq!(snapshot.counts.cancelled_today, 1);
}

#[tokio::test]
async fn preview_is_capped_but_detail_is_complete() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Preview Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;
    let services = &app.state.services;
    let staff = app.operator(Role::Staff, Some(fx.hotel.id));

    for n in 0..6 {
        let dish = app
            .seed_item(&fx.food, &format!("Dish {n}"), dec!(10.00))
            .await;
        services.cart.add_item(&guest, dish.id, 1).await.unwrap();
    }
    let order = services.requests.submit_order(&guest).await.unwrap();

    let snapshot = services.live_board.snapshot(&staff).await.unwrap();
    let limit = app.state.config.board_preview_lines as usize;
    assert_eq!(snapshot.new[0].lines.len(), limit.min(6));

    let detail = services.live_board.detail(&staff, order.id).await.unwrap();
    assert_eq!(detail.lines.len(), 6);
    assert_eq!(detail.subtotal, dec!(60.00));
    assert_eq!(detail.room, "101");
}

#[tokio::test]
async fn hotels_only_see_their_own_requests() {
    let app = TestApp::new().await;
    let mine = app.seed_fixture("North Hotel").await;
    let theirs = app.seed_fixture("South Hotel").await;
    let services = &app.state.services;

    let my_guest = app.guest(mine.hotel.id, mine.room.id).await;
    let their_guest = app.guest(theirs.hotel.id, theirs.room.id).await;
    let my_request = services
        .requests
        .request_service(&my_guest, mine.towels.id)
        .await
        .unwrap();
    let their_request = services
        .requests
        .request_service(&their_guest, theirs.towels.id)
        .await
        .unwrap();

    let staff = app.operator(Role::Staff, Some(mine.hotel.id));
    let snapshot = services.live_board.snapshot(&staff).await.unwrap();
    let ids: Vec<_> = snapshot.new.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![my_request.id]);

    assert_matches!(
        services.live_board.detail(&staff, their_request.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        services
            .live_board
            .action(&staff, their_request.id, "accept")
            .await,
        Err(ServiceError::NotFound(_))
    );

    let platform = app.operator(Role::PlatformAdmin, None);
    let everything = services.live_board.snapshot(&platform).await.unwrap();
    assert_eq!(everything.new.len(), 2);
}

#[tokio::test]
async fn board_actions_are_parsed_before_applying() {
    let app = TestApp::new().await;
    let fx = app.seed_fixture("Action Hotel").await;
    let guest = app.guest(fx.hotel.id, fx.room.id).await;
    let services = &app.state.services;
    let staff = app.operator(Role::Staff, Some(fx.hotel.id));

    let req = services
        .requests
        .request_service(&guest, fx.towels.id)
        .await
        .unwrap();

    assert_matches!(
        services.live_board.action(&staff, req.id, "archive").await,
        Err(ServiceError::ValidationError(_))
    );

    let accepted = services
        .live_board
        .action(&staff, req.id, " accept ")
        .await
        .unwrap();
    assert_eq!(accepted.status, RequestStatus::Accepted);

    assert_matches!(
        services.live_board.action(&staff, req.id, "accept").await,
        Err(ServiceError::InvalidStateTransition(_))
    );
}
