//! Energy quota lifecycle over real sockets.

mod common;

use common::{TestClient, TestServer};
use pinbus_server::protocol::{Command, Status};

const SEEDS: &[(&str, &str, i64)] = &[("app-token", "user@example.com", 1)];

fn button(id: i64) -> String {
    format!(
        r#"{{"id":{id}, "x":2, "y":2, "label":"Some Text", "type":"BUTTON", "pinType":"DIGITAL", "pin":2}}"#
    )
}

#[tokio::test]
async fn fresh_account_starts_with_the_default_balance() {
    let server = TestServer::start(SEEDS).await;
    let mut app = TestClient::connect_app(&server).await;
    app.login(1, "app-token").await;

    assert_eq!(app.energy(2).await, 2000);
}

#[tokio::test]
async fn widget_creation_stops_exactly_at_the_quota() {
    let server = TestServer::start(SEEDS).await;
    let mut app = TestClient::connect_app(&server).await;
    app.login(1, "app-token").await;

    app.send(2, Command::CreateDash, r#"{"id":2, "createdAt":1458856800001, "name":"test board"}"#)
        .await;
    app.expect_response(2, Status::Ok).await;

    // Ten buttons at 200 apiece drain the default 2000.
    for i in 0..10_u32 {
        let body = format!("2\0{}", button(i64::from(i) + 10));
        app.send(3 + i, Command::CreateWidget, &body).await;
        app.expect_response(3 + i, Status::Ok).await;
    }
    assert_eq!(app.energy(20).await, 0);

    let body = format!("2\0{}", button(99));
    app.send(21, Command::CreateWidget, &body).await;
    app.expect_response(21, Status::EnergyLimit).await;

    // The failed attempt must not have debited anything.
    assert_eq!(app.energy(22).await, 0);
}

#[tokio::test]
async fn purchases_are_credited_after_receipt_validation() {
    let server = TestServer::start(SEEDS).await;
    let mut app = TestClient::connect_app(&server).await;
    app.login(1, "app-token").await;

    app.send(2, Command::AddEnergy, "1000\0123").await;
    app.expect_response(2, Status::Ok).await;
    assert_eq!(app.energy(3).await, 3000);

    app.send(4, Command::AddEnergy, "1000\0").await;
    app.expect_response(4, Status::NotAllowed).await;
    assert_eq!(app.energy(5).await, 3000);
}

#[tokio::test]
async fn deleting_a_dash_refunds_every_contained_widget() {
    let server = TestServer::start(SEEDS).await;
    let mut app = TestClient::connect_app(&server).await;
    app.login(1, "app-token").await;

    app.send(2, Command::CreateDash, r#"{"id":5, "name":"refund board"}"#)
        .await;
    app.expect_response(2, Status::Ok).await;

    for i in 0..4_u32 {
        let body = format!("5\0{}", button(i64::from(i) + 1));
        app.send(3 + i, Command::CreateWidget, &body).await;
        app.expect_response(3 + i, Status::Ok).await;
    }
    assert_eq!(app.energy(10).await, 2000 - 800);

    app.send(11, Command::DeleteDash, "5").await;
    app.expect_response(11, Status::Ok).await;
    assert_eq!(app.energy(12).await, 2000);
}

#[tokio::test]
async fn deleting_one_widget_refunds_its_price() {
    let server = TestServer::start(SEEDS).await;
    let mut app = TestClient::connect_app(&server).await;
    app.login(1, "app-token").await;

    app.send(2, Command::CreateDash, r#"{"id":2, "name":"b"}"#).await;
    app.expect_response(2, Status::Ok).await;

    app.send(3, Command::CreateWidget, "2\0{\"id\":7, \"type\":\"LCD\"}")
        .await;
    app.expect_response(3, Status::Ok).await;
    assert_eq!(app.energy(4).await, 1600);

    app.send(5, Command::DeleteWidget, "2 7").await;
    app.expect_response(5, Status::Ok).await;
    assert_eq!(app.energy(6).await, 2000);
}

#[tokio::test]
async fn hardware_may_not_touch_the_quota() {
    let server = TestServer::start(SEEDS).await;
    let mut device = TestClient::connect_hardware(&server).await;
    device.login(1, "app-token").await;

    device.send(2, Command::GetEnergy, "").await;
    device.expect_response(2, Status::NotAllowed).await;

    device.send(3, Command::AddEnergy, "1000\0123").await;
    device.expect_response(3, Status::NotAllowed).await;
}

#[tokio::test]
async fn duplicate_dash_id_is_rejected_without_a_debit() {
    let server = TestServer::start(SEEDS).await;
    let mut app = TestClient::connect_app(&server).await;
    app.login(1, "app-token").await;

    let body = format!(r#"{{"id":2, "name":"b", "widgets":[{}]}}"#, button(1));
    app.send(2, Command::CreateDash, &body).await;
    app.expect_response(2, Status::Ok).await;
    assert_eq!(app.energy(3).await, 1800);

    // Same id again: rejected, and the contained widget is not charged.
    app.send(4, Command::CreateDash, &body).await;
    app.expect_response(4, Status::IllegalCommand).await;
    assert_eq!(app.energy(5).await, 1800);
}
