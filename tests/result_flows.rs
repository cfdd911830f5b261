//! End-to-end result correlation flows: prepare/observe/complete through the
//! public facade, including forwarding, silent closes, and delivery timing.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{root_container, ConfirmKey, PickerKey, PromptKey, ScreenKey};
use waypoint::{
    ContainerKey, Error, Instance, NavigationController, Operation, SilencePolicy,
};

#[test]
fn test_complete_delivers_to_requesting_channel() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<String>();
    let answers = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let prompt = Instance::new(PromptKey { question: "name?" });
    channel.prepare(&prompt, "ask-name");

    let answers_in = Arc::clone(&answers);
    let _subscription = channel
        .observe(
            "ask-name",
            move |answer: String| answers_in.lock().push(answer),
            || {},
        )
        .unwrap();

    container.execute(Operation::open(prompt.clone())).unwrap();
    container
        .execute(Operation::complete_with(prompt, "hello".to_string()).unwrap())
        .unwrap();

    assert_eq!(*answers.lock(), vec!["hello".to_string()]);
}

#[test]
fn test_plain_close_invokes_on_closed() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<String>();
    let dismissals = Arc::new(AtomicUsize::new(0));

    let prompt = Instance::new(PromptKey { question: "name?" });
    channel.prepare(&prompt, "ask-name");

    let dismissals_in = Arc::clone(&dismissals);
    let _subscription = channel
        .observe("ask-name", |_: String| panic!("no completion expected"), move || {
            dismissals_in.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    container.execute(Operation::open(prompt.clone())).unwrap();
    container.execute(Operation::close(prompt)).unwrap();

    assert_eq!(dismissals.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unit_expectation_satisfied_by_close() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<()>();
    let confirmations = Arc::new(AtomicUsize::new(0));

    let sheet = Instance::new(ConfirmKey);
    channel.prepare(&sheet, "confirm");

    let confirmations_in = Arc::clone(&confirmations);
    let _subscription = channel
        .observe(
            "confirm",
            move |()| {
                confirmations_in.fetch_add(1, Ordering::SeqCst);
            },
            || panic!("unit channels treat close as completion"),
        )
        .unwrap();

    container.execute(Operation::open(sheet.clone())).unwrap();
    container.execute(Operation::close(sheet)).unwrap();

    assert_eq!(confirmations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_late_observer_still_receives_result() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<i64>();

    let picker = Instance::new(PickerKey);
    channel.prepare(&picker, "pick");

    container.execute(Operation::open(picker.clone())).unwrap();
    container
        .execute(Operation::complete_with(picker, 7i64).unwrap())
        .unwrap();
    assert_eq!(controller.result_registry().pending_count(), 1);

    let picks = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let picks_in = Arc::clone(&picks);
    let _subscription = channel
        .observe("pick", move |pick: i64| picks_in.lock().push(pick), || {})
        .unwrap();

    assert_eq!(*picks.lock(), vec![7]);
    assert_eq!(controller.result_registry().pending_count(), 0);
}

#[test]
fn test_pending_result_recorded_before_publication() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<String>();

    let prompt = Instance::new(PromptKey { question: "name?" });
    channel.prepare(&prompt, "ask-name");
    container.execute(Operation::open(prompt.clone())).unwrap();

    // Backstack subscribers run against the freshly published stack; the
    // completion must already be sitting in the registry by then.
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let registry = Arc::clone(controller.result_registry());
    let _subscription = container.subscribe(move |stack| {
        seen_in.lock().push((stack.len(), registry.pending_count()));
    });

    container
        .execute(Operation::complete_with(prompt, "hello".to_string()).unwrap())
        .unwrap();

    assert_eq!(*seen.lock(), vec![(0, 1)]);
}

#[test]
fn test_uncorrelated_close_produces_no_result() {
    let (controller, container) = root_container();

    let prompt = Instance::new(PromptKey { question: "name?" });
    container.execute(Operation::open(prompt.clone())).unwrap();
    container
        .execute(Operation::complete_with(prompt, "ignored".to_string()).unwrap())
        .unwrap();

    assert_eq!(controller.result_registry().pending_count(), 0);
}

#[test]
fn test_silent_close_suppresses_delivery() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<String>();
    let dismissals = Arc::new(AtomicUsize::new(0));

    let prompt = Instance::new(PromptKey { question: "name?" });
    channel.prepare(&prompt, "ask-name");

    let dismissals_in = Arc::clone(&dismissals);
    let _subscription = channel
        .observe("ask-name", |_: String| {}, move || {
            dismissals_in.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    container.execute(Operation::open(prompt.clone())).unwrap();
    container
        .execute(Operation::close_silently(prompt))
        .unwrap();

    assert_eq!(dismissals.load(Ordering::SeqCst), 0);
    assert_eq!(controller.result_registry().pending_count(), 0);
}

#[test]
fn test_complete_from_forwards_to_original_observer() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<String>();
    let answers = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let original = Instance::new(PromptKey { question: "short form" });
    channel.prepare(&original, "ask-name");

    let answers_in = Arc::clone(&answers);
    let _subscription = channel
        .observe(
            "ask-name",
            move |answer: String| answers_in.lock().push(answer),
            || {},
        )
        .unwrap();

    container.execute(Operation::open(original.clone())).unwrap();

    // The short form hands off to a long form: its own close is silent, and
    // the long form inherits the correlation id.
    let replacement = Instance::new(PromptKey { question: "long form" });
    container
        .execute(Operation::aggregate(vec![
            Operation::close_silently(original.clone()),
            Operation::complete_from(&original, replacement.clone()).unwrap(),
        ]))
        .unwrap();
    assert_eq!(replacement.correlation_id(), original.correlation_id());
    assert!(answers.lock().is_empty());

    container
        .execute(Operation::complete_with(replacement, "forwarded".to_string()).unwrap())
        .unwrap();

    assert_eq!(*answers.lock(), vec!["forwarded".to_string()]);
}

#[test]
fn test_duplicate_observer_rejected_until_released() {
    let (controller, _container) = root_container();
    let channel = controller.result_channel::<String>();

    let first = channel.observe("ask", |_: String| {}, || {}).unwrap();
    let err = channel.observe("ask", |_: String| {}, || {}).unwrap_err();
    assert!(matches!(err, Error::DuplicateObserver { .. }));

    drop(first);
    let _second = channel.observe("ask", |_: String| {}, || {}).unwrap();
}

#[test]
fn test_channels_are_isolated_by_owner() {
    let (controller, container) = root_container();
    let mine = controller.result_channel::<String>();
    let theirs = controller.result_channel::<String>();

    let my_answers = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let their_answers = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mine_in = Arc::clone(&my_answers);
    let _mine_sub = mine
        .observe("ask", move |a: String| mine_in.lock().push(a), || {})
        .unwrap();
    let theirs_in = Arc::clone(&their_answers);
    let _theirs_sub = theirs
        .observe("ask", move |a: String| theirs_in.lock().push(a), || {})
        .unwrap();

    let prompt = Instance::new(PromptKey { question: "name?" });
    mine.prepare(&prompt, "ask");
    container.execute(Operation::open(prompt.clone())).unwrap();
    container
        .execute(Operation::complete_with(prompt, "for me".to_string()).unwrap())
        .unwrap();

    assert_eq!(*my_answers.lock(), vec!["for me".to_string()]);
    assert!(their_answers.lock().is_empty());
}

#[test]
fn test_result_callback_may_navigate() {
    let (controller, container) = root_container();
    let channel = controller.result_channel::<i64>();

    let picker = Instance::new(PickerKey);
    channel.prepare(&picker, "pick");

    // Delivery happens after the guard releases, so navigating from the
    // callback is legal.
    let container_in = Arc::clone(&container);
    let _subscription = channel
        .observe(
            "pick",
            move |_pick: i64| {
                container_in
                    .execute(Operation::open(Instance::new(ScreenKey("detail"))))
                    .unwrap();
            },
            || {},
        )
        .unwrap();

    container.execute(Operation::open(picker.clone())).unwrap();
    container
        .execute(Operation::complete_with(picker, 3i64).unwrap())
        .unwrap();

    let stack = container.backstack();
    assert_eq!(stack.len(), 1);
    assert!(stack[0].key_as::<ScreenKey>().is_some());
}

#[test]
fn test_racing_complete_can_be_suppressed_by_policy() {
    common::init_tracing();
    let controller = NavigationController::builder()
        .with_silence_policy(SilencePolicy {
            suppress_racing_complete: true,
            silence_forwarded: true,
        })
        .build();
    let container = controller.new_container(ContainerKey::new("root"), None);
    let channel = controller.result_channel::<String>();

    // Complete lands in the pending set with nobody observing yet, then a
    // silent close of a second instance on the same correlation purges it.
    let first = Instance::new(PromptKey { question: "name?" });
    channel.prepare(&first, "ask");
    container.execute(Operation::open(first.clone())).unwrap();
    container
        .execute(Operation::complete_with(first, "stale".to_string()).unwrap())
        .unwrap();
    assert_eq!(controller.result_registry().pending_count(), 1);

    let second = Instance::new(PromptKey { question: "name?" });
    channel.prepare(&second, "ask");
    container.execute(Operation::open(second.clone())).unwrap();
    container.execute(Operation::close_silently(second)).unwrap();

    assert_eq!(controller.result_registry().pending_count(), 0);
}
