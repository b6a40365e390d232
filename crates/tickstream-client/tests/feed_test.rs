/*
[INPUT]:  Per-symbol feeds opened over one scripted connection
[OUTPUT]: Interest union, fan-out and unsubscribe-on-drop verification
[POS]:    Integration test layer - symbol feed facade
[UPDATE]: When changing feed accounting or fan-out
*/

mod common;

use std::sync::Arc;

use rust_decimal::Decimal;
use tickstream_adapter::{Direction, SocketEvent, StreamError};
use tickstream_client::{ConnectionManager, SymbolFeedHub};
use tokio_test::assert_ok;

use common::{
    ConnectOutcome, ScriptedConnector, directive, next_command, next_peer, test_config, text,
};

fn tick_frame(symbol: &str, price: u32) -> SocketEvent {
    SocketEvent::Text(format!(r#"{{"symbol":"{symbol}","price":{price}}}"#))
}

#[tokio::test]
async fn test_feeds_share_one_connection() {
    let (connector, mut peers) = ScriptedConnector::new([ConnectOutcome::Accept]);
    let manager = Arc::new(
        ConnectionManager::with_connector(&test_config(&[]), connector.clone()).unwrap(),
    );
    let hub = SymbolFeedHub::new(Arc::clone(&manager), ["vnm"]).unwrap();

    let _fpt = hub.feed("fpt").unwrap();
    let _fpt_again = hub.feed("FPT").unwrap();
    let _hpg = hub.feed("HPG").unwrap();
    assert_eq!(hub.feed_count("fpt"), 2);

    assert_ok!(manager.connect());
    let mut peer = next_peer(&mut peers).await;
    assert_eq!(next_command(&mut peer).await, directive(&["FPT", "HPG", "VNM"]));
    assert_eq!(connector.calls(), 1);
    assert!(peers.try_recv().is_err());
}

#[tokio::test]
async fn test_feed_receives_only_its_symbol() {
    let (connector, mut peers) = ScriptedConnector::new([ConnectOutcome::Accept]);
    let manager =
        Arc::new(ConnectionManager::with_connector(&test_config(&[]), connector).unwrap());
    let hub = SymbolFeedHub::new(Arc::clone(&manager), Vec::<String>::new()).unwrap();
    let mut fpt = hub.feed("FPT").unwrap();
    assert_eq!(fpt.symbol(), "FPT");
    assert_eq!(fpt.latest(), None);

    assert_ok!(manager.connect());
    let peer = next_peer(&mut peers).await;
    peer.events.send(tick_frame("VNM", 70)).unwrap();
    peer.events.send(tick_frame("FPT", 120)).unwrap();
    peer.events.send(tick_frame("FPT", 118)).unwrap();

    let first = assert_ok!(fpt.changed().await).unwrap();
    let tick = if first.price() == Decimal::from(118) {
        first
    } else {
        assert_eq!(first.price(), Decimal::from(120));
        assert_ok!(fpt.changed().await).unwrap()
    };

    assert_eq!(tick.symbol(), "FPT");
    assert_eq!(tick.direction, Direction::Down);
    assert_eq!(tick.previous_price, Some(Decimal::from(120)));
    assert_eq!(fpt.latest(), Some(tick));
}

#[tokio::test]
async fn test_dropping_last_feed_narrows_subscription() {
    let (connector, mut peers) = ScriptedConnector::new([ConnectOutcome::Accept]);
    let manager =
        Arc::new(ConnectionManager::with_connector(&test_config(&[]), connector).unwrap());
    let hub = SymbolFeedHub::new(Arc::clone(&manager), ["VNM"]).unwrap();
    let first = hub.feed("FPT").unwrap();
    let second = hub.feed("FPT").unwrap();

    assert_ok!(manager.connect());
    let mut peer = next_peer(&mut peers).await;
    assert_eq!(next_command(&mut peer).await, directive(&["FPT", "VNM"]));

    drop(first);
    assert_ok!(manager.send("sentinel"));
    assert_eq!(next_command(&mut peer).await, text("sentinel"));

    drop(second);
    assert_eq!(next_command(&mut peer).await, directive(&["VNM"]));
    assert_eq!(hub.feed_count("FPT"), 0);
    assert_eq!(
        hub.symbols().into_iter().collect::<Vec<_>>(),
        vec!["VNM".to_string()]
    );
}

#[tokio::test]
async fn test_blank_symbol_is_rejected() {
    let (connector, _peers) = ScriptedConnector::new([ConnectOutcome::Refuse]);
    let manager =
        Arc::new(ConnectionManager::with_connector(&test_config(&[]), connector).unwrap());
    let hub = SymbolFeedHub::new(manager, ["VNM"]).unwrap();

    let result = hub.feed("   ");
    assert!(matches!(result, Err(StreamError::InvalidSymbol(_))));
}
