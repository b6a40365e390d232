/*
[INPUT]:  Inbound frame samples
[OUTPUT]: Classification results for the frame router
[POS]:    Integration tests - inbound frame routing
[UPDATE]: When frame shapes or discriminators change
*/

use rstest::rstest;
use tickstream_adapter::{FrameRouter, RoutedFrame};

#[rstest]
#[case::market_status(
    r#"{"type":"market_status","is_open":true,"current_time":"10:00:00","timezone":"Asia/Ho_Chi_Minh"}"#,
    "market_status"
)]
#[case::tick(r#"{"symbol":"FPT","price":118.2,"change":0.4}"#, "price_tick")]
#[case::tick_with_nulls(r#"{"symbol":"FPT","price":118.2,"volume":null}"#, "price_tick")]
#[case::truncated_json("{not json", "unrecognized")]
#[case::unknown_object(r#"{"foo":"bar"}"#, "unrecognized")]
#[case::price_without_symbol(r#"{"price":10}"#, "unrecognized")]
#[case::symbol_without_price(r#"{"symbol":"VNM"}"#, "unrecognized")]
#[case::status_missing_fields(r#"{"type":"market_status"}"#, "unrecognized")]
#[case::other_type(r#"{"type":"heartbeat"}"#, "unrecognized")]
#[case::blank_symbol(r#"{"symbol":"  ","price":1}"#, "unrecognized")]
#[case::scalar("42", "unrecognized")]
fn test_frame_classification(#[case] raw: &str, #[case] expected: &str) {
    let mut router = FrameRouter::new();
    assert_eq!(router.route(raw).kind(), expected);
}

#[test]
fn test_route_value_accepts_parsed_frames() {
    let mut router = FrameRouter::new();
    let frame = router.route_value(serde_json::json!({
        "symbol": "hpg",
        "price": 27.45,
        "timestamp": "2026-10-16T02:15:00Z"
    }));
    match frame {
        RoutedFrame::PriceTick(tick) => {
            assert_eq!(tick.symbol, "HPG");
            assert_eq!(tick.timestamp.as_deref(), Some("2026-10-16T02:15:00Z"));
        }
        other => panic!("expected price tick, got {other:?}"),
    }
}
