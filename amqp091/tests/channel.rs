use std::{sync::Arc, time::Duration};

use amqp091::{
    channel::{ConsumeOptions, PublishOptions, QueueDeclareOptions},
    frames::{method_frames, FrameBody},
    types::{
        methods::{
            BasicAck, BasicCancel, BasicConsumeOk, BasicDeliver, BasicGetEmpty, BasicGetOk,
            BasicNack, BasicReturn, ChannelClose, ChannelFlow, ConfirmSelectOk, QueueDeclareOk,
        },
        Content,
    },
    observer::Observer,
    BasicProperties, Builder, Delivery, Error, FieldTable, Method,
};
use futures_util::StreamExt;
use parking_lot::Mutex;

mod common;

use common::{connect, connect_with, default_tune, open_channel};

fn deliver(consumer_tag: &str, delivery_tag: u64, body: &'static [u8]) -> BasicDeliver {
    BasicDeliver {
        consumer_tag: consumer_tag.into(),
        delivery_tag,
        redelivered: false,
        exchange: "".into(),
        routing_key: "tasks".into(),
        content: Content::new(
            BasicProperties::default().with_content_type("text/plain"),
            body,
        ),
    }
}

#[tokio::test]
async fn open_and_close_channel() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    assert_eq!(connection.channel_count(), 1);

    let (closed, _) = tokio::join!(channel.close(), broker.accept_channel_close(1));
    closed.unwrap();
    assert!(channel.is_closed());
    assert_eq!(connection.channel_count(), 0);
    assert!(matches!(channel.close().await, Err(Error::Closed)));

    // the id is free again
    let reopened = open_channel(&connection, &mut broker, 1).await;
    assert!(!reopened.is_closed());
}

#[tokio::test]
async fn queue_declare_returns_counts() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;

    let reply = async {
        match broker.recv_method(1).await {
            Method::QueueDeclare(declare) => {
                assert_eq!(declare.queue, "");
                assert!(declare.exclusive);
            }
            other => panic!("unexpected {other:?}"),
        }
        let ok = QueueDeclareOk {
            queue: "amq.gen-JzTY20BRgKO".into(),
            message_count: 3,
            consumer_count: 1,
        };
        broker.send(1, ok).await;
    };
    let options = QueueDeclareOptions {
        exclusive: true,
        ..Default::default()
    };
    let (queue, _) = tokio::join!(channel.queue_declare("", options, FieldTable::new()), reply);
    let queue = queue.unwrap();
    assert_eq!(queue.name, "amq.gen-JzTY20BRgKO");
    assert_eq!(queue.message_count, 3);
    assert_eq!(queue.consumer_count, 1);
}

#[tokio::test]
async fn soft_error_closes_only_the_channel() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    let mut closed = channel.notify_close();

    let reply = async {
        assert!(matches!(broker.recv_method(1).await, Method::QueueDeclare(_)));
        let close = ChannelClose {
            reply_code: 404,
            reply_text: "NOT_FOUND - no queue 'missing' in vhost '/'".into(),
            class_id: 50,
            method_id: 10,
        };
        broker.send(1, close).await;
        assert!(matches!(broker.recv_method(1).await, Method::ChannelCloseOk(_)));
    };
    let (declared, _) = tokio::join!(channel.queue_declare_passive("missing"), reply);
    match declared {
        Err(Error::Exception(exception)) => {
            assert_eq!(exception.code, 404);
            assert!(exception.recover);
            assert!(exception.server);
        }
        other => panic!("unexpected {other:?}"),
    }

    assert!(matches!(
        closed.recv().await,
        Some(Error::Exception(exception)) if exception.code == 404
    ));
    assert!(channel.is_closed());
    assert!(!connection.is_closed());
    assert_eq!(connection.channel_count(), 0);

    // later calls report the reason the channel closed with
    let published = channel
        .basic_publish(
            "",
            "tasks",
            PublishOptions::default(),
            BasicProperties::default(),
            "late",
        )
        .await;
    assert!(matches!(published, Err(Error::Exception(exception)) if exception.code == 404));

    // the connection keeps working
    let _other = open_channel(&connection, &mut broker, 1).await;
}

#[tokio::test]
async fn publisher_confirms_settle_deferred_confirmations() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;

    let reply = async {
        match broker.recv_method(1).await {
            Method::ConfirmSelect(select) => assert!(!select.nowait),
            other => panic!("unexpected {other:?}"),
        }
        broker.send(1, ConfirmSelectOk {}).await;
    };
    let (selected, _) = tokio::join!(channel.confirm_select(false), reply);
    selected.unwrap();
    assert_eq!(channel.next_publish_seq_no(), 1);

    let mut confirmations = Vec::new();
    for body in ["one", "two", "three"] {
        let confirmation = channel
            .basic_publish_with_deferred_confirm(
                "",
                "tasks",
                PublishOptions::default(),
                BasicProperties::default(),
                body,
            )
            .await
            .unwrap()
            .expect("confirm mode is on");
        confirmations.push(confirmation);

        let (method, received) = broker.recv_content(1).await;
        match method {
            Method::BasicPublish(publish) => assert_eq!(publish.routing_key, "tasks"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(received, body.as_bytes());
    }
    let tags: Vec<u64> = confirmations.iter().map(|c| c.delivery_tag()).collect();
    assert_eq!(tags, vec![1, 2, 3]);
    assert_eq!(channel.next_publish_seq_no(), 4);

    broker
        .send(
            1,
            BasicAck {
                delivery_tag: 2,
                multiple: true,
            },
        )
        .await;
    broker
        .send(
            1,
            BasicNack {
                delivery_tag: 3,
                multiple: false,
                requeue: false,
            },
        )
        .await;

    assert!(confirmations[0].wait().await);
    assert!(confirmations[1].wait().await);
    assert!(!confirmations[2].wait().await);
}

#[tokio::test]
async fn large_bodies_are_split_at_frame_max() {
    let builder = Builder::new().heartbeat(Duration::ZERO).frame_max(4096);
    let (connection, mut broker) = connect_with(builder, default_tune()).await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    assert_eq!(connection.tuning().frame_max, 4096);

    let body = vec![7u8; 10_000];
    channel
        .basic_publish(
            "",
            "tasks",
            PublishOptions::default(),
            BasicProperties::default(),
            body.clone(),
        )
        .await
        .unwrap();

    assert!(matches!(broker.recv_method(1).await, Method::BasicPublish(_)));
    assert!(matches!(broker.recv().await.body, FrameBody::Header(h) if h.body_size == 10_000));
    let mut sizes = Vec::new();
    for _ in 0..3 {
        match broker.recv().await.body {
            FrameBody::Body(chunk) => sizes.push(chunk.len()),
            other => panic!("unexpected {other:?}"),
        }
    }
    assert_eq!(sizes, vec![4088, 4088, 1824]);
}

#[tokio::test]
async fn consumer_receives_deliveries_and_acks() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;

    let reply = async {
        match broker.recv_method(1).await {
            Method::BasicConsume(consume) => {
                assert_eq!(consume.queue, "tasks");
                assert_eq!(consume.consumer_tag, "worker");
            }
            other => panic!("unexpected {other:?}"),
        }
        broker
            .send(
                1,
                BasicConsumeOk {
                    consumer_tag: "worker".into(),
                },
            )
            .await;
    };
    let (consumer, _) = tokio::join!(
        channel.basic_consume("tasks", "worker", ConsumeOptions::default(), FieldTable::new()),
        reply
    );
    let mut consumer = consumer.unwrap();
    assert_eq!(consumer.tag(), "worker");

    broker.send(1, deliver("worker", 1, b"hello")).await;
    broker.send(1, deliver("worker", 2, b"")).await;

    let delivery = consumer.next().await.unwrap();
    assert_eq!(delivery.delivery_tag, 1);
    assert_eq!(&delivery.body[..], b"hello");
    assert_eq!(delivery.properties.content_type.as_deref(), Some("text/plain"));
    delivery.ack(false).await.unwrap();
    match broker.recv_method(1).await {
        Method::BasicAck(ack) => assert_eq!((ack.delivery_tag, ack.multiple), (1, false)),
        other => panic!("unexpected {other:?}"),
    }

    let empty = consumer.next().await.unwrap();
    assert_eq!(empty.delivery_tag, 2);
    assert!(empty.body.is_empty());
    empty.reject(true).await.unwrap();
    match broker.recv_method(1).await {
        Method::BasicReject(reject) => assert_eq!((reject.delivery_tag, reject.requeue), (2, true)),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn content_on_different_channels_may_interleave() {
    let (connection, mut broker) = connect().await;
    let first = open_channel(&connection, &mut broker, 1).await;
    let second = open_channel(&connection, &mut broker, 2).await;

    let mut consumers = Vec::new();
    for (channel, id) in [(&first, 1u16), (&second, 2u16)] {
        let reply = async {
            assert!(matches!(broker.recv_method(id).await, Method::BasicConsume(_)));
            broker
                .send(
                    id,
                    BasicConsumeOk {
                        consumer_tag: "c".into(),
                    },
                )
                .await;
        };
        let (consumer, _) = tokio::join!(
            channel.basic_consume("q", "c", ConsumeOptions::default(), FieldTable::new()),
            reply
        );
        consumers.push(consumer.unwrap());
    }

    let one = method_frames(1, deliver("c", 1, b"first").into(), 0);
    let two = method_frames(2, deliver("c", 1, b"second").into(), 0);
    for (a, b) in one.into_iter().zip(two) {
        broker.send_frame(a).await;
        broker.send_frame(b).await;
    }

    assert_eq!(&consumers[0].next().await.unwrap().body[..], b"first");
    assert_eq!(&consumers[1].next().await.unwrap().body[..], b"second");
}

#[tokio::test]
async fn server_cancel_ends_the_consumer() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    let mut cancelled = channel.notify_cancel();

    let reply = async {
        assert!(matches!(broker.recv_method(1).await, Method::BasicConsume(_)));
        broker
            .send(
                1,
                BasicConsumeOk {
                    consumer_tag: "worker".into(),
                },
            )
            .await;
    };
    let (consumer, _) = tokio::join!(
        channel.basic_consume("tasks", "worker", ConsumeOptions::default(), FieldTable::new()),
        reply
    );
    let mut consumer = consumer.unwrap();

    broker
        .send(
            1,
            BasicCancel {
                consumer_tag: "worker".into(),
                no_wait: false,
            },
        )
        .await;
    match broker.recv_method(1).await {
        Method::BasicCancelOk(ok) => assert_eq!(ok.consumer_tag, "worker"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(cancelled.recv().await.as_deref(), Some("worker"));
    assert!(consumer.next().await.is_none());
    assert!(!channel.is_closed());
}

#[tokio::test]
async fn basic_get_returns_message_or_none() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;

    let reply = async {
        assert!(matches!(broker.recv_method(1).await, Method::BasicGet(_)));
        let ok = BasicGetOk {
            delivery_tag: 5,
            redelivered: true,
            exchange: "".into(),
            routing_key: "tasks".into(),
            message_count: 9,
            content: Content::new(BasicProperties::default(), "payload"),
        };
        broker.send(1, ok).await;
    };
    let (message, _) = tokio::join!(channel.basic_get("tasks", false), reply);
    let message = message.unwrap().expect("queue is not empty");
    assert_eq!(message.message_count, 9);
    assert_eq!(message.delivery_tag, 5);
    assert!(message.redelivered);
    assert_eq!(&message.body[..], b"payload");

    let reply = async {
        assert!(matches!(broker.recv_method(1).await, Method::BasicGet(_)));
        broker.send(1, BasicGetEmpty::default()).await;
    };
    let (message, _) = tokio::join!(channel.basic_get("tasks", false), reply);
    assert!(message.unwrap().is_none());
}

#[tokio::test]
async fn unroutable_mandatory_publish_is_returned() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    let mut returns = channel.notify_return();

    let options = PublishOptions {
        mandatory: true,
        ..Default::default()
    };
    channel
        .basic_publish("", "nowhere", options, BasicProperties::default(), "lost")
        .await
        .unwrap();
    match broker.recv_content(1).await {
        (Method::BasicPublish(publish), _) => assert!(publish.mandatory),
        other => panic!("unexpected {other:?}"),
    }

    let returned = BasicReturn {
        reply_code: 312,
        reply_text: "NO_ROUTE".into(),
        exchange: "".into(),
        routing_key: "nowhere".into(),
        content: Content::new(BasicProperties::default(), "lost"),
    };
    broker.send(1, returned).await;

    let returned = returns.recv().await.unwrap();
    assert_eq!(returned.reply_code, 312);
    assert_eq!(returned.routing_key, "nowhere");
    assert_eq!(&returned.body[..], b"lost");
}

#[tokio::test]
async fn server_flow_control_is_acknowledged() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    let mut flow = channel.notify_flow();

    broker.send(1, ChannelFlow { active: false }).await;
    match broker.recv_method(1).await {
        Method::ChannelFlowOk(ok) => assert!(!ok.active),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(flow.recv().await, Some(false));
    assert!(!channel.is_flow_active());
}

async fn select_confirms(channel: &amqp091::Channel, broker: &mut common::Broker) {
    let reply = async {
        assert!(matches!(broker.recv_method(channel.id()).await, Method::ConfirmSelect(_)));
        broker.send(channel.id(), ConfirmSelectOk {}).await;
    };
    let (selected, _) = tokio::join!(channel.confirm_select(false), reply);
    selected.unwrap();
}

#[tokio::test]
async fn abandoned_publish_does_not_take_a_delivery_tag() {
    let builder = Builder::new().heartbeat(Duration::ZERO).buffer_size(1);
    let (connection, mut broker) = connect_with(builder, default_tune()).await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    select_confirms(&channel, &mut broker).await;

    // the broker stops reading until the outgoing queue is full
    let body = vec![0u8; 32 * 1024];
    let mut queued = Vec::new();
    let mut abandoned = false;
    for _ in 0..32 {
        let publish = channel.basic_publish_with_deferred_confirm(
            "",
            "tasks",
            PublishOptions::default(),
            BasicProperties::default(),
            body.clone(),
        );
        match tokio::time::timeout(Duration::from_millis(100), publish).await {
            Ok(confirmation) => queued.push(confirmation.unwrap().unwrap()),
            Err(_) => {
                abandoned = true;
                break;
            }
        }
    }
    assert!(abandoned);
    let count = queued.len() as u64;
    assert_eq!(channel.next_publish_seq_no(), count + 1);

    for _ in 0..count {
        let (method, received) = broker.recv_content(1).await;
        assert!(matches!(method, Method::BasicPublish(_)));
        assert_eq!(received.len(), body.len());
    }
    broker
        .send(
            1,
            BasicAck {
                delivery_tag: count,
                multiple: true,
            },
        )
        .await;

    for confirmation in &queued {
        assert!(confirmation
            .wait_timeout(Duration::from_secs(5))
            .await
            .unwrap());
    }
}

#[tokio::test]
async fn transport_failure_fails_calls_and_nacks_confirms() {
    let (connection, mut broker) = connect().await;
    let channel = open_channel(&connection, &mut broker, 1).await;
    select_confirms(&channel, &mut broker).await;

    let confirmation = channel
        .basic_publish_with_deferred_confirm(
            "",
            "tasks",
            PublishOptions::default(),
            BasicProperties::default(),
            "pending",
        )
        .await
        .unwrap()
        .expect("confirm mode is on");
    broker.recv_content(1).await;

    let disconnect = async move {
        assert!(matches!(broker.recv_method(1).await, Method::QueueDeclare(_)));
        drop(broker);
    };
    let (declared, _) = tokio::join!(
        channel.queue_declare("tasks", QueueDeclareOptions::default(), FieldTable::new()),
        disconnect
    );

    assert!(matches!(declared, Err(Error::Io(_))));
    assert!(!confirmation.wait().await);
    assert!(channel.is_closed());
    assert!(connection.is_closed());
}

#[tokio::test]
async fn refused_channel_open_releases_the_id() {
    let (connection, mut broker) = connect().await;

    let refuse = async {
        assert!(matches!(broker.recv_method(1).await, Method::ChannelOpen(_)));
        let close = ChannelClose {
            reply_code: 403,
            reply_text: "ACCESS_REFUSED - no access to this vhost".into(),
            class_id: 20,
            method_id: 10,
        };
        broker.send(1, close).await;
        assert!(matches!(broker.recv_method(1).await, Method::ChannelCloseOk(_)));
    };
    let (opened, _) = tokio::join!(connection.open_channel(), refuse);
    match opened {
        Err(Error::Exception(exception)) => assert_eq!(exception.code, 403),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(connection.channel_count(), 0);

    let channel = open_channel(&connection, &mut broker, 1).await;
    assert_eq!(channel.id(), 1);
}

#[derive(Debug, Default)]
struct Propagate {
    extracted: Arc<Mutex<Vec<String>>>,
}

impl Observer for Propagate {
    fn on_publish(&self, _: u16, _: &str, _: &str, properties: &mut BasicProperties) {
        properties.set_header("traceparent", "00-trace-span-01");
    }

    fn on_deliver(&self, _: u16, delivery: &Delivery) {
        if let Some(parent) = delivery
            .properties
            .header("traceparent")
            .and_then(|v| v.as_str())
        {
            self.extracted.lock().push(parent.to_string());
        }
    }
}

#[tokio::test]
async fn observer_carries_trace_context_in_headers() {
    let extracted = Arc::new(Mutex::new(Vec::new()));
    let builder = Builder::new()
        .heartbeat(Duration::ZERO)
        .observer(Propagate {
            extracted: extracted.clone(),
        });
    let (connection, mut broker) = connect_with(builder, default_tune()).await;
    let channel = open_channel(&connection, &mut broker, 1).await;

    channel
        .basic_publish(
            "",
            "tasks",
            PublishOptions::default(),
            BasicProperties::default().with_content_type("text/plain"),
            "traced",
        )
        .await
        .unwrap();
    assert!(matches!(broker.recv_method(1).await, Method::BasicPublish(_)));
    let properties = match broker.recv().await.body {
        FrameBody::Header(header) => header.properties,
        other => panic!("expecting a content header, got {other:?}"),
    };
    assert_eq!(properties.content_type.as_deref(), Some("text/plain"));
    assert_eq!(
        properties.header("traceparent").and_then(|v| v.as_str()),
        Some("00-trace-span-01")
    );
    assert!(matches!(broker.recv().await.body, FrameBody::Body(_)));

    let reply = async {
        assert!(matches!(broker.recv_method(1).await, Method::BasicConsume(_)));
        broker
            .send(
                1,
                BasicConsumeOk {
                    consumer_tag: "traced".into(),
                },
            )
            .await;
    };
    let (consumer, _) = tokio::join!(
        channel.basic_consume("tasks", "traced", ConsumeOptions::default(), FieldTable::new()),
        reply
    );
    let mut consumer = consumer.unwrap();

    let mut delivered = deliver("traced", 1, b"traced");
    delivered.content.properties = properties;
    broker.send(1, delivered).await;

    let delivery = consumer.next().await.unwrap();
    assert_eq!(&delivery.body[..], b"traced");
    assert_eq!(*extracted.lock(), vec!["00-trace-span-01".to_string()]);
}
