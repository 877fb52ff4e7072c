use std::thread;
use std::time::Duration;

use handmouse::mailbox::{mailbox, Poll};

#[test]
fn slow_consumer_sees_the_newest_frame() {
    let (mut publisher, subscriber) = mailbox::<u32>();

    let producer = thread::spawn(move || {
        for frame in 0..1000 {
            publisher.publish(frame);
        }
        publisher.overwritten()
    });
    let overwritten = producer.join().unwrap();

    // el productor ya terminó: solo queda el último frame
    assert_eq!(subscriber.poll(), Poll::Fresh(999));
    assert_eq!(subscriber.poll(), Poll::Closed);
    assert_eq!(overwritten, 999);
}

#[test]
fn consumer_never_sees_frames_go_backwards() {
    let (mut publisher, subscriber) = mailbox::<u32>();

    let producer = thread::spawn(move || {
        for frame in 0..200 {
            publisher.publish(frame);
            thread::sleep(Duration::from_micros(200));
        }
    });

    let mut seen = Vec::new();
    loop {
        match subscriber.poll_timeout(Duration::from_millis(500)) {
            Poll::Fresh(frame) => {
                seen.push(frame);
                thread::sleep(Duration::from_millis(2));
            }
            Poll::Stale => continue,
            Poll::Closed => break,
        }
    }
    producer.join().unwrap();

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(seen.last(), Some(&199));
}

#[test]
fn idle_producer_reads_as_stale() {
    let (_publisher, subscriber) = mailbox::<u32>();
    assert_eq!(
        subscriber.poll_timeout(Duration::from_millis(5)),
        Poll::Stale
    );
}
