use std::time::Duration;

use amqp091::{
    connection::Blocking,
    frames::{Error as FrameError, FrameBody},
    types::methods::{
        ConnectionBlocked, ConnectionClose, ConnectionStart, ConnectionTune,
        ConnectionUnblocked, ConnectionUpdateSecretOk,
    },
    Builder, Error, Method, OpenError,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

mod common;

use common::{connect, connect_with, default_tune, open_channel, Broker};

#[tokio::test]
async fn handshake_negotiates_tuning() {
    let builder = Builder::new()
        .heartbeat(Duration::from_secs(60))
        .frame_max(8192);
    let tune = ConnectionTune {
        channel_max: 100,
        frame_max: 131_072,
        heartbeat: 30,
    };
    let (connection, mut broker) = connect_with(builder, tune).await;

    let tuning = connection.tuning();
    assert_eq!(tuning.channel_max, 100);
    assert_eq!(tuning.frame_max, 8192);
    assert_eq!(tuning.heartbeat, Duration::from_secs(30));
    assert_eq!(
        connection
            .server_properties()
            .get("product")
            .and_then(|v| v.as_str()),
        Some("scripted")
    );

    let (closed, _) = tokio::join!(connection.close(), broker.accept_close());
    closed.unwrap();
}

#[tokio::test]
async fn server_refusing_protocol_version_is_reported() {
    let (client, mut server) = tokio::io::duplex(1024);
    let broker = async move {
        let mut header = [0u8; 8];
        server.read_exact(&mut header).await.unwrap();
        server.write_all(b"AMQP\x00\x00\x08\x00").await.unwrap();
        server
    };
    let (result, _server) = tokio::join!(Builder::new().open_with_stream(client), broker);
    match result {
        Err(OpenError::ProtocolHeaderMismatch(header)) => {
            assert_eq!((header.major, header.minor), (0, 8))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn missing_sasl_mechanism_fails_open() {
    let (client, mut server) = tokio::io::duplex(4096);
    let broker = async move {
        let mut header = [0u8; 8];
        server.read_exact(&mut header).await.unwrap();
        let mut broker = Broker::from_stream(server);
        let start = ConnectionStart {
            version_major: 0,
            version_minor: 9,
            mechanisms: "EXTERNAL".into(),
            locales: "en_US".into(),
            ..Default::default()
        };
        broker.send(0, start).await;
        broker
    };
    let (result, _broker) = tokio::join!(Builder::new().open_with_stream(client), broker);
    match result {
        Err(OpenError::SaslMechanismNotSupported(offered)) => assert_eq!(offered, "EXTERNAL"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn access_refused_during_handshake() {
    let (client, mut server) = tokio::io::duplex(4096);
    let broker = async move {
        let mut header = [0u8; 8];
        server.read_exact(&mut header).await.unwrap();
        let mut broker = Broker::from_stream(server);
        let start = ConnectionStart {
            version_major: 0,
            version_minor: 9,
            mechanisms: "PLAIN".into(),
            locales: "en_US".into(),
            ..Default::default()
        };
        broker.send(0, start).await;
        assert!(matches!(broker.recv_method(0).await, Method::ConnectionStartOk(_)));

        let close = ConnectionClose {
            reply_code: 403,
            reply_text: "ACCESS_REFUSED - Login was refused".into(),
            class_id: 0,
            method_id: 0,
        };
        broker.send(0, close).await;
        assert!(matches!(broker.recv_method(0).await, Method::ConnectionCloseOk(_)));
        broker
    };
    let (result, _broker) = tokio::join!(Builder::new().open_with_stream(client), broker);
    match result {
        Err(OpenError::Exception(exception)) => {
            assert_eq!(exception.code, 403);
            assert!(exception.server);
            assert!(exception.recover);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn closing_twice_reports_closed() {
    let (connection, mut broker) = connect().await;

    let (closed, _) = tokio::join!(connection.close(), broker.accept_close());
    closed.unwrap();
    assert!(connection.is_closed());
    assert!(matches!(connection.close().await, Err(Error::Closed)));
}

#[tokio::test]
async fn concurrent_close_has_one_winner() {
    let (connection, mut broker) = connect().await;
    let other = connection.clone();

    let (first, second, _) =
        tokio::join!(connection.close(), other.close(), broker.accept_close());
    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(Error::Closed))));
    assert!(broker.is_disconnected().await);
}

#[tokio::test]
async fn open_channel_on_closed_connection_fails() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;

    let (closed, _) = tokio::join!(connection.close(), broker.accept_close());
    closed.unwrap();

    assert!(channel.is_closed());
    assert_eq!(connection.channel_count(), 0);
    assert!(matches!(connection.open_channel().await, Err(Error::Closed)));
    assert_eq!(connection.channel_count(), 0);
}

#[tokio::test]
async fn server_close_is_acknowledged_and_reported() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    let mut closed = connection.notify_close();
    let mut channel_closed = channel.notify_close();

    let close = ConnectionClose {
        reply_code: 320,
        reply_text: "CONNECTION_FORCED - broker forced connection closure".into(),
        class_id: 0,
        method_id: 0,
    };
    broker.send(0, close).await;
    assert!(matches!(broker.recv_method(0).await, Method::ConnectionCloseOk(_)));

    match closed.recv().await {
        Some(Error::Exception(exception)) => {
            assert_eq!(exception.code, 320);
            assert!(!exception.recover);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        channel_closed.recv().await,
        Some(Error::Exception(exception)) if exception.code == 320
    ));
    assert!(connection.is_closed());
    assert!(matches!(
        connection.open_channel().await,
        Err(Error::Exception(_)) | Err(Error::Closed)
    ));
}

#[tokio::test]
async fn dropped_stream_closes_connection() {
    let (connection, broker) = connect().await;
    let mut closed = connection.notify_close();
    drop(broker);

    assert!(matches!(closed.recv().await, Some(Error::Io(_))));
    assert!(connection.is_closed());
}

#[tokio::test]
async fn blocked_notifications_are_broadcast() {
    let (connection, mut broker) = connect().await;
    let mut blocked = connection.notify_blocked();

    broker
        .send(
            0,
            ConnectionBlocked {
                reason: "low on memory".into(),
            },
        )
        .await;
    broker.send(0, ConnectionUnblocked {}).await;

    assert_eq!(
        blocked.recv().await,
        Some(Blocking {
            active: true,
            reason: "low on memory".into()
        })
    );
    assert_eq!(
        blocked.recv().await,
        Some(Blocking {
            active: false,
            reason: String::new()
        })
    );

    let (closed, _) = tokio::join!(connection.close(), broker.accept_close());
    closed.unwrap();
    assert_eq!(blocked.recv().await, None);
}

#[tokio::test]
async fn update_secret_waits_for_reply() {
    let (connection, mut broker) = connect().await;

    let reply = async {
        match broker.recv_method(0).await {
            Method::ConnectionUpdateSecret(update) => {
                assert_eq!(&update.new_secret[..], b"token");
                assert_eq!(update.reason, "refresh");
            }
            other => panic!("unexpected {other:?}"),
        }
        broker.send(0, ConnectionUpdateSecretOk {}).await;
    };
    let (updated, _) = tokio::join!(connection.update_secret("token", "refresh"), reply);
    updated.unwrap();
}

#[tokio::test]
async fn channel_ids_are_limited_by_channel_max() {
    let tune = ConnectionTune {
        channel_max: 1,
        ..default_tune()
    };
    let builder = Builder::new().heartbeat(Duration::ZERO);
    let (connection, mut broker) = connect_with(builder, tune).await;

    let _channel = open_channel(&connection, &mut broker, 1).await;
    assert!(matches!(
        connection.open_channel().await,
        Err(Error::ChannelMaxReached)
    ));
    assert_eq!(connection.channel_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn heartbeats_are_sent_at_half_the_interval() {
    let builder = Builder::new().heartbeat(Duration::from_secs(4));
    let tune = ConnectionTune {
        heartbeat: 4,
        ..default_tune()
    };
    let (_connection, mut broker) = connect_with(builder, tune).await;

    let start = tokio::time::Instant::now();
    let frame = broker.recv_any().await.unwrap();
    assert_eq!(frame.body, FrameBody::Heartbeat);
    assert_eq!(frame.channel, 0);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn silent_server_misses_heartbeats() {
    let builder = Builder::new().heartbeat(Duration::from_secs(2));
    let tune = ConnectionTune {
        heartbeat: 2,
        ..default_tune()
    };
    let (connection, _broker) = connect_with(builder, tune).await;
    let mut closed = connection.notify_close();

    assert!(matches!(closed.recv().await, Some(Error::MissedHeartbeats)));
    assert!(connection.is_closed());
}

#[tokio::test]
async fn unknown_method_on_channel_zero_closes_connection() {
    let (connection, mut broker) = connect().await;
    let mut closed = connection.notify_close();

    broker.send(0, ConnectionStart::default()).await;
    match broker.recv_method(0).await {
        Method::ConnectionClose(close) => assert_eq!(close.reply_code, 503),
        other => panic!("unexpected {other:?}"),
    }

    match closed.recv().await {
        Some(Error::Exception(exception)) => {
            assert_eq!(exception.code, 503);
            assert!(!exception.server);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn dropping_the_last_handle_closes_the_connection() {
    let (connection, mut broker) = connect().await;
    let other = connection.clone();
    drop(connection);
    assert!(!other.is_closed());

    drop(other);
    broker.accept_close().await;
    assert!(broker.is_disconnected().await);
}

#[tokio::test]
async fn oversized_frame_before_tuning_is_refused() {
    let (client, mut server) = tokio::io::duplex(4096);
    let broker = async move {
        let mut header = [0u8; 8];
        server.read_exact(&mut header).await.unwrap();
        // a method frame header announcing a 4 GiB payload
        server
            .write_all(b"\x01\x00\x00\xff\xff\xff\xff")
            .await
            .unwrap();
        server
    };
    let (result, _server) = tokio::join!(Builder::new().open_with_stream(client), broker);
    match result {
        Err(OpenError::Frame(FrameError::FrameTooLarge { max, .. })) => assert_eq!(max, 4096),
        other => panic!("unexpected {other:?}"),
    }
}
