use peerseq_crdt::VectorClock;
use peerseq_sync::{ChangeCause, Observers, StateChanged, Subscription};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn event(version: u64) -> StateChanged {
    StateChanged {
        version,
        len: 0,
        clock: VectorClock::new(),
        cause: ChangeCause::Local,
    }
}

fn counter(observers: &Observers<char>) -> (Arc<AtomicUsize>, Subscription) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let subscription = observers.subscribe(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (count, subscription)
}

#[test]
fn every_listener_is_called() {
    let observers = Observers::<char>::new();
    let (first, _a) = counter(&observers);
    let (second, _b) = counter(&observers);

    observers.notify(&event(1), &[]);
    observers.notify(&event(2), &[]);

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 2);
    assert_eq!(observers.len(), 2);
}

#[test]
fn listeners_see_the_value_they_are_notified_about() {
    let observers = Observers::<char>::new();
    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let _subscription = observers.subscribe(move |_, value| {
        sink.lock().unwrap().push(value.iter().collect());
    });

    observers.notify(&event(1), &['h', 'i']);
    observers.notify(&event(2), &[]);
    assert_eq!(*seen.lock().unwrap(), vec!["hi".to_string(), String::new()]);
}

#[test]
fn unsubscribe_and_drop() {
    let observers = Observers::<char>::new();
    let (count, subscription) = counter(&observers);
    assert!(subscription.is_active());

    subscription.unsubscribe();
    observers.notify(&event(1), &[]);
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(observers.is_empty());
}

#[test]
fn detached_listeners_stay_registered() {
    let observers = Observers::<char>::new();
    let (count, subscription) = counter(&observers);
    subscription.detach();

    observers.notify(&event(1), &[]);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(observers.len(), 1);
}

#[test]
fn listener_can_unsubscribe_itself_while_notified() {
    let observers = Observers::<char>::new();
    let count = Arc::new(AtomicUsize::new(0));
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let seen = Arc::clone(&count);
    let own = Arc::clone(&slot);
    let subscription = observers.subscribe(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
        drop(own.lock().unwrap().take());
    });
    *slot.lock().unwrap() = Some(subscription);

    observers.notify(&event(1), &[]);
    observers.notify(&event(2), &[]);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(observers.is_empty());
}

#[test]
fn listener_can_subscribe_others_while_notified() {
    let observers = Observers::<char>::new();
    let added = Arc::new(AtomicUsize::new(0));

    let registry = observers.clone();
    let late = Arc::clone(&added);
    observers
        .subscribe(move |event, _| {
            if event.version == 1 {
                let late = Arc::clone(&late);
                registry
                    .subscribe(move |_, _| {
                        late.fetch_add(1, Ordering::SeqCst);
                    })
                    .detach();
            }
        })
        .detach();

    // The new listener joins from the next notification on.
    observers.notify(&event(1), &[]);
    assert_eq!(added.load(Ordering::SeqCst), 0);
    observers.notify(&event(2), &[]);
    assert_eq!(added.load(Ordering::SeqCst), 1);
}

#[test]
fn subscriptions_outliving_the_observers_are_inert() {
    let observers = Observers::<char>::new();
    let (_count, subscription) = counter(&observers);
    drop(observers);

    assert!(!subscription.is_active());
    drop(subscription);
}

#[test]
fn listeners_run_on_other_threads() {
    let observers = Observers::<char>::new();
    let (count, _subscription) = counter(&observers);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let observers = observers.clone();
            std::thread::spawn(move || observers.notify(&event(i), &[]))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(count.load(Ordering::SeqCst), 4);
}
