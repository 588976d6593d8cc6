//! End-to-end tailing against the in-process server.

use msgtail::{
    compare_messages, Batch, LocalChannel, LocalRequestor, MessageId, MessageModel, Notice,
    ReversePhase, Server, ServerEvent, TailCallback, Timestamp,
};
use parking_lot::Mutex;
use std::sync::Arc;

type Seen = Arc<Mutex<Vec<Batch>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn setup(messages: i64) -> (Arc<Server>, Arc<LocalChannel>, MessageModel) {
    init_tracing();
    let server = Arc::new(Server::new());
    for i in 1..=messages {
        server.publish_at(Notice::new("help", "rust", format!("message {}", i)), Timestamp(i));
    }

    let channel = Arc::new(server.connect());
    let model = MessageModel::new(
        channel.clone(),
        Arc::new(LocalRequestor::new(Arc::clone(&server))),
    );
    (server, channel, model)
}

fn collector() -> (TailCallback, Seen) {
    let seen: Seen = Arc::default();
    let sink = Arc::clone(&seen);
    (
        Box::new(move |outcome| sink.lock().push(outcome.expect("delivery failed"))),
        seen,
    )
}

/// Let the server answer everything queued, then dispatch the replies.
fn round_trip(server: &Server, channel: &LocalChannel) {
    server.serve_pending();
    channel.pump().unwrap();
}

fn ids(seen: &Seen) -> Vec<u64> {
    seen.lock()
        .iter()
        .flat_map(|b| b.messages.iter())
        .map(|m| m.id.as_str().parse().unwrap())
        .collect()
}

// --- Forward Tails ---

#[test]
fn test_forward_catch_up_then_live() {
    let (server, channel, model) = setup(5);
    let (callback, seen) = collector();

    let tail = model.new_tail(Some(MessageId::from(2u64)), callback).unwrap();
    tail.expand_to(2).unwrap();
    round_trip(&server, &channel);

    assert_eq!(ids(&seen), vec![3, 4]);
    assert!(!seen.lock()[0].is_done);

    // Ask for more than exists: catch up to the head
    tail.expand_to(10).unwrap();
    round_trip(&server, &channel);
    assert_eq!(ids(&seen), vec![3, 4, 5]);
    assert!(seen.lock().last().unwrap().is_done);

    // The head was reported: nothing more without a fresh extend
    server.publish(Notice::new("help", "rust", "live 1"));
    server.publish(Notice::new("help", "rust", "live 2"));
    channel.pump().unwrap();
    assert_eq!(ids(&seen), vec![3, 4, 5]);

    tail.expand_to(10).unwrap();
    round_trip(&server, &channel);
    assert_eq!(ids(&seen), vec![3, 4, 5, 6, 7]);
    assert!(seen.lock().last().unwrap().is_done);

    let state = tail.state();
    assert_eq!(state.messages_sent_total, 5);
    assert_eq!(state.messages_wanted, 5);
    assert_eq!(state.last_sent, Some(MessageId::from(7u64)));
}

#[test]
fn test_forward_stops_when_window_filled() {
    let (server, channel, model) = setup(0);
    let (callback, seen) = collector();

    let tail = model.new_tail(None, callback).unwrap();
    tail.expand_to(2).unwrap();
    round_trip(&server, &channel);
    assert!(seen.lock().is_empty());

    for i in 0..4 {
        server.publish(Notice::new("help", "", format!("{}", i)));
    }
    channel.pump().unwrap();
    // The first live push reached the head
    assert_eq!(ids(&seen), vec![1]);

    tail.expand_to(2).unwrap();
    round_trip(&server, &channel);
    assert_eq!(ids(&seen), vec![1, 2]);
    assert_eq!(tail.state().messages_wanted, 0);
}

#[test]
fn test_inclusive_tail_redelivers_start() {
    let (server, channel, model) = setup(4);
    let (callback, seen) = collector();

    let tail = model
        .new_tail_inclusive(Some(MessageId::from(2u64)), callback)
        .unwrap();
    tail.expand_to(2).unwrap();
    round_trip(&server, &channel);

    assert_eq!(ids(&seen), vec![2, 3]);
    assert!(!tail.state().inclusive);
}

#[test]
fn test_tails_sharing_a_channel_are_isolated() {
    let (server, channel, model) = setup(6);
    let (first_cb, first) = collector();
    let (second_cb, second) = collector();

    let a = model.new_tail(None, first_cb).unwrap();
    let b = model.new_tail(Some(MessageId::from(4u64)), second_cb).unwrap();
    a.expand_to(3).unwrap();
    b.expand_to(10).unwrap();
    round_trip(&server, &channel);

    assert_eq!(ids(&first), vec![1, 2, 3]);
    assert_eq!(ids(&second), vec![5, 6]);

    a.close();
    server.publish(Notice::default());
    a.expand_to(100).unwrap();
    b.expand_to(10).unwrap();
    round_trip(&server, &channel);

    assert_eq!(ids(&first), vec![1, 2, 3]);
    assert_eq!(ids(&second), vec![5, 6, 7]);
}

#[test]
fn test_reregister_resumes_without_gaps_or_repeats() {
    let (server, channel, model) = setup(8);
    let (callback, seen) = collector();

    let tail = model.new_tail(None, callback).unwrap();
    tail.expand_to(3).unwrap();
    round_trip(&server, &channel);
    assert_eq!(ids(&seen), vec![1, 2, 3]);

    tail.expand_to(6).unwrap();
    tail.reregister().unwrap();
    // Replies to the old registration are discarded on arrival
    round_trip(&server, &channel);

    assert_eq!(ids(&seen), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(tail.state().messages_sent_total, 6);
    assert_eq!(tail.state().messages_sent_recent, 3);
}

#[test]
fn test_callback_that_pumps_sees_every_batch() {
    let (server, channel, model) = setup(6);
    let seen: Seen = Arc::default();

    let sink = Arc::clone(&seen);
    let inner = Arc::clone(&channel);
    let tail = model
        .new_tail(
            None,
            Box::new(move |outcome| {
                sink.lock().push(outcome.expect("delivery failed"));
                let _ = inner.pump();
            }),
        )
        .unwrap();
    tail.expand_to(2).unwrap();
    tail.expand_to(4).unwrap();
    round_trip(&server, &channel);

    assert_eq!(seen.lock().len(), 2);
    assert_eq!(ids(&seen), vec![1, 2, 3, 4]);
    assert_eq!(tail.state().messages_sent_total, 4);
}

#[test]
fn test_live_broadcast_listener() {
    let (server, channel, model) = setup(0);
    let bodies: Arc<Mutex<Vec<String>>> = Arc::default();

    let sink = Arc::clone(&bodies);
    let id = model.on_message(Arc::new(move |event: &ServerEvent| {
        if let ServerEvent::Message { message } = event {
            sink.lock().push(message.notice.body.clone());
        }
    }));

    server.publish(Notice::new("help", "", "hello"));
    channel.pump().unwrap();
    assert!(model.remove_message_listener(id));
    server.publish(Notice::new("help", "", "unheard"));
    channel.pump().unwrap();

    assert_eq!(*bodies.lock(), vec!["hello".to_string()]);
}

// --- Reverse Tails ---

#[test]
fn test_reverse_scrollback_pages_until_exhausted() {
    let (_server, _channel, model) = setup(12);
    let (callback, seen) = collector();

    let tail = model.new_reverse_tail(None, callback);
    tail.expand_to(5);
    assert_eq!(ids(&seen), vec![8, 9, 10, 11, 12]);
    assert_eq!(tail.state().start, Some(MessageId::from(8u64)));
    assert_eq!(tail.phase(), ReversePhase::Idle);

    tail.expand_to(20);
    let pages: Vec<Vec<u64>> = seen
        .lock()
        .iter()
        .map(|b| b.messages.iter().map(|m| m.id.as_str().parse().unwrap()).collect())
        .collect();
    assert_eq!(pages, vec![vec![8, 9, 10, 11, 12], vec![1, 2, 3, 4, 5, 6, 7]]);
    assert!(seen.lock().last().unwrap().is_done);
    assert_eq!(tail.phase(), ReversePhase::Exhausted);

    tail.expand_to(100);
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn test_reverse_from_cursor() {
    let (_server, _channel, model) = setup(10);
    let (callback, seen) = collector();

    let tail = model.new_reverse_tail(Some(MessageId::from(6u64)), callback);
    tail.expand_to(3);

    assert_eq!(ids(&seen), vec![3, 4, 5]);
    assert!(!seen.lock()[0].is_done);
}

#[test]
fn test_both_directions_share_ordering() {
    let (server, channel, model) = setup(10);
    let (rev_cb, history) = collector();
    let (fwd_cb, live) = collector();

    let reverse = model.new_reverse_tail(Some(MessageId::from(6u64)), rev_cb);
    reverse.expand_to(5);

    let forward = model
        .new_tail_inclusive(Some(MessageId::from(6u64)), fwd_cb)
        .unwrap();
    forward.expand_to(5).unwrap();
    round_trip(&server, &channel);

    let mut all: Vec<_> = history
        .lock()
        .iter()
        .chain(live.lock().iter())
        .flat_map(|b| b.messages.clone())
        .collect();
    let ids: Vec<String> = all.iter().map(|m| m.id.to_string()).collect();
    assert_eq!(ids, (1..=10).map(|i| i.to_string()).collect::<Vec<_>>());

    // Already sorted by receive time, too
    let before = all.clone();
    all.sort_by(compare_messages);
    assert_eq!(all, before);
    assert_eq!(
        model.compare_messages(&before[0], &before[9]),
        std::cmp::Ordering::Less
    );
}
