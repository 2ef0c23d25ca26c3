//! Coverage for the frame pumps bridging the pipe and the relay channels.

use clay_relay::framing::{read_frame, write_frame, DEFAULT_MAX_FRAME_BYTES};
use clay_relay::host::{control_frame, pump_frames_in, pump_frames_out, VIEWER_OPEN};
use tokio::sync::mpsc;

#[tokio::test]
async fn inbound_frames_land_on_the_relay_channel() {
    let (mut chrome_side, mut host_side) = tokio::io::duplex(1024);
    let (tx, mut rx) = mpsc::channel(4);

    let pump = tokio::spawn(async move {
        pump_frames_in(&mut host_side, DEFAULT_MAX_FRAME_BYTES, tx).await
    });

    write_frame(&mut chrome_side, b"{\"cmd\":\"snapshot\"}")
        .await
        .expect("write frame");
    assert_eq!(
        rx.recv().await.as_deref(),
        Some("{\"cmd\":\"snapshot\"}")
    );

    drop(chrome_side);
    pump.await.expect("task").expect("clean EOF");
    assert!(rx.recv().await.is_none(), "channel closes after EOF");
}

#[tokio::test]
async fn inbound_pump_stops_when_relay_is_gone() {
    let (mut chrome_side, mut host_side) = tokio::io::duplex(1024);
    let (tx, rx) = mpsc::channel(4);
    drop(rx);

    let pump = tokio::spawn(async move {
        pump_frames_in(&mut host_side, DEFAULT_MAX_FRAME_BYTES, tx).await
    });

    write_frame(&mut chrome_side, b"{}").await.expect("write frame");
    pump.await.expect("task").expect("closed channel is not an error");
}

#[tokio::test]
async fn outbound_messages_become_frames_in_order() {
    let (mut host_side, mut chrome_side) = tokio::io::duplex(1024);
    let (tx, rx) = mpsc::channel(4);

    let pump = tokio::spawn(async move { pump_frames_out(&mut host_side, rx).await });

    tx.send(control_frame(VIEWER_OPEN)).await.expect("send");
    tx.send("{\"reply\":true}".to_owned()).await.expect("send");
    drop(tx);

    let first = read_frame(&mut chrome_side, DEFAULT_MAX_FRAME_BYTES)
        .await
        .expect("read");
    assert_eq!(first.as_deref(), Some("{\"relayMessage\":\"open\"}"));

    let second = read_frame(&mut chrome_side, DEFAULT_MAX_FRAME_BYTES)
        .await
        .expect("read");
    assert_eq!(second.as_deref(), Some("{\"reply\":true}"));

    pump.await.expect("task").expect("pump ends with channel");
    let eof = read_frame(&mut chrome_side, DEFAULT_MAX_FRAME_BYTES)
        .await
        .expect("read");
    assert!(eof.is_none());
}

#[tokio::test]
async fn oversize_inbound_frame_fails_the_pump() {
    use tokio::io::AsyncWriteExt;

    let (mut chrome_side, mut host_side) = tokio::io::duplex(64);
    let (tx, _rx) = mpsc::channel(4);

    let pump =
        tokio::spawn(async move { pump_frames_in(&mut host_side, 16, tx).await });

    chrome_side
        .write_all(&64u32.to_ne_bytes())
        .await
        .expect("raw write");

    let result = pump.await.expect("task");
    assert!(result.is_err(), "oversize frame must error the pump");
}
