use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use reveal_core::page::{ElementSnapshot, MemoryDocument};
use reveal_core::{ListenerShape, RevealConfig, RevealConfigDraft, RevealReason, TimerQueue};
use services::watch::{ControllerPhase, PERSISTED_TRUE};
use services::{Collaborators, SimulatedPlayer, SimulatedPlayerHost, WatchRevealController};
use storage::repository::{InMemoryRepository, KeyValueStore, StorageError};

struct Page {
    queue: TimerQueue,
    host: Rc<SimulatedPlayerHost>,
    document: MemoryDocument,
    store: InMemoryRepository,
}

impl Page {
    fn new() -> Self {
        let document = MemoryDocument::new();
        document.insert(ElementSnapshot::new("div").with_id("delayed-anchor"));
        document.insert(
            ElementSnapshot::new("section")
                .with_id("delayed-content")
                .with_class("atomicat-delay")
                .with_attribute("aria-hidden", "true"),
        );
        document.insert(
            ElementSnapshot::new("footer")
                .with_class("atomicat-delay")
                .with_text("Offer ends soon"),
        );
        document.insert(ElementSnapshot::new("div").with_id("offer"));
        Self {
            queue: TimerQueue::new(),
            host: Rc::new(SimulatedPlayerHost::new()),
            document,
            store: InMemoryRepository::new(),
        }
    }

    fn deps(&self) -> Collaborators {
        self.deps_with_store(Arc::new(self.store.clone()))
    }

    fn deps_with_store(&self, store: Arc<dyn KeyValueStore>) -> Collaborators {
        Collaborators {
            player_host: self.host.clone(),
            document: Rc::new(self.document.clone()),
            store,
            scheduler: Rc::new(self.queue.clone()),
        }
    }

    fn load_player(&self, player: SimulatedPlayer) -> Rc<SimulatedPlayer> {
        let player = Rc::new(player);
        self.host.load(Rc::clone(&player));
        player
    }

    /// Advance the player and the timers together in 50ms steps.
    fn play_for(&self, player: &SimulatedPlayer, millis: u64) {
        for _ in 0..millis / 50 {
            player.advance(Duration::from_millis(50));
            self.queue.advance_ms(50);
        }
    }

    fn content_shown(&self) -> bool {
        let content = self.document.find_by_id("delayed-content").unwrap();
        content.has_class("show")
            && !content.has_class("atomicat-delay")
            && content.attribute("aria-hidden") == Some("false")
    }

    fn delay_classes_left(&self) -> usize {
        self.document
            .snapshot()
            .iter()
            .filter(|el| el.has_class("atomicat-delay"))
            .count()
    }
}

fn config(draft: RevealConfigDraft) -> RevealConfig {
    draft.validate().unwrap()
}

struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Connection("storage disabled".into()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Closed)
    }
}

#[test]
fn exhausted_discovery_reveals_after_retries() {
    let page = Page::new();
    let controller = WatchRevealController::start(
        config(
            RevealConfigDraft::new()
                .with_seconds_to_display(5.0)
                .with_max_attempts(3)
                .with_retry_delay_ms(100.0),
        ),
        page.deps(),
    );

    page.queue.advance_ms(299);
    assert!(!controller.is_displayed());
    assert_eq!(page.delay_classes_left(), 2);

    page.queue.advance_ms(1);
    assert!(controller.is_displayed());
    assert_eq!(
        controller.reveal_reason(),
        Some(RevealReason::DiscoveryExhausted { attempts: 3 })
    );
    assert_eq!(controller.attempts(), 3);
    assert_eq!(page.host.lookups(), 4);
    assert!(page.content_shown());
    assert_eq!(page.delay_classes_left(), 0);
    assert_eq!(page.store.write_count().unwrap(), 0);
}

#[test]
fn zero_attempts_falls_back_immediately() {
    let page = Page::new();
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_max_attempts(0)),
        page.deps(),
    );

    assert!(controller.is_displayed());
    assert_eq!(page.queue.now(), Duration::ZERO);
    assert_eq!(page.host.lookups(), 1);
    assert!(page.content_shown());
}

#[test]
fn late_player_is_picked_up_on_retry() {
    let page = Page::new();
    let controller = WatchRevealController::start(
        config(
            RevealConfigDraft::new()
                .with_seconds_to_display(5.0)
                .with_retry_delay_ms(250.0),
        ),
        page.deps(),
    );
    page.queue.advance_ms(250);
    let player = page.load_player(SimulatedPlayer::new());
    page.queue.advance_ms(250);

    assert_eq!(controller.status().phase, ControllerPhase::Watching);
    assert_eq!(controller.attempts(), 2);
    assert_eq!(player.listener_count(), 1);

    page.queue.advance_ms(10_000);
    assert!(!controller.is_displayed());
    assert_eq!(page.host.lookups(), 3);
}

#[test]
fn player_already_past_threshold_reveals_on_discovery() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    player.seek(10.0);

    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(5.0)),
        page.deps(),
    );

    assert!(controller.is_displayed());
    assert_eq!(
        controller.reveal_reason(),
        Some(RevealReason::ThresholdReached { at: 10.0 })
    );
    assert_eq!(player.listener_count(), 0);
    assert_eq!(page.queue.now(), Duration::ZERO);
}

#[test]
fn progress_reveals_and_persists_then_next_visit_skips_discovery() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    let draft = RevealConfigDraft::new()
        .with_seconds_to_display(5.0)
        .with_storage_key("x");

    let first = WatchRevealController::start(config(draft.clone()), page.deps());
    assert_eq!(page.store.get("x").unwrap(), None);

    player.play();
    page.play_for(&player, 4_000);
    assert!(!first.is_displayed());

    page.play_for(&player, 2_000);
    assert!(first.is_displayed());
    assert!(matches!(
        first.reveal_reason(),
        Some(RevealReason::ThresholdReached { at }) if at >= 5.0
    ));
    assert_eq!(page.store.get("x").unwrap().as_deref(), Some(PERSISTED_TRUE));
    assert_eq!(page.store.write_count().unwrap(), 1);
    assert_eq!(player.listener_count(), 0);

    let revisit = Page {
        store: page.store.clone(),
        ..Page::new()
    };
    let second = WatchRevealController::start(config(draft), revisit.deps());
    assert!(!second.is_displayed());

    revisit.queue.advance_ms(99);
    assert!(!second.is_displayed());
    revisit.queue.advance_ms(1);
    assert!(second.is_displayed());
    assert_eq!(second.reveal_reason(), Some(RevealReason::PersistedFlag));
    assert_eq!(revisit.host.lookups(), 0);
    assert!(revisit.content_shown());
    assert_eq!(revisit.store.write_count().unwrap(), 2);
}

#[test]
fn stalled_autoplay_never_reveals_at_zero_threshold() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    player.start_muted_autoplay();

    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(0.0)),
        page.deps(),
    );
    for _ in 0..5 {
        player.emit();
    }
    page.queue.advance_ms(5_000);

    assert!(!controller.is_displayed());
    assert_eq!(page.delay_classes_left(), 2);

    assert!(controller.force_reveal());
    assert_eq!(controller.reveal_reason(), Some(RevealReason::Manual));
}

#[test]
fn autoplay_ending_lets_the_next_sample_reveal() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    player.start_muted_autoplay();
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(0.0)),
        page.deps(),
    );
    assert!(!controller.is_displayed());

    player.play();
    player.emit();
    assert!(controller.is_displayed());
}

#[test]
fn repeated_reveals_mutate_once() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    let controller = WatchRevealController::start(
        config(
            RevealConfigDraft::new()
                .with_seconds_to_display(1.0)
                .with_storage_key("once"),
        ),
        page.deps(),
    );

    player.seek(2.0);
    assert!(controller.is_displayed());
    let mutations = page.document.mutation_count();
    let scrolls = page.document.scrolled_ids().len();

    assert!(!controller.force_reveal());
    assert!(!controller.reveal(RevealReason::DiscoveryExhausted { attempts: 0 }));
    controller.discover();
    player.seek(3.0);

    assert_eq!(page.document.mutation_count(), mutations);
    assert_eq!(page.document.scrolled_ids().len(), scrolls);
    assert_eq!(page.store.write_count().unwrap(), 1);
    assert_eq!(
        controller.reveal_reason(),
        Some(RevealReason::ThresholdReached { at: 2.0 })
    );
}

#[test]
fn reveal_scrolls_target_then_anchor() {
    let page = Page::new();
    let controller = WatchRevealController::start(
        config(
            RevealConfigDraft::new()
                .with_max_attempts(0)
                .with_scroll_to_id("offer"),
        ),
        page.deps(),
    );
    assert!(controller.is_displayed());
    assert_eq!(page.document.scrolled_ids(), vec![Some("offer".to_string())]);

    page.queue.advance_ms(300);
    assert_eq!(
        page.document.scrolled_ids(),
        vec![Some("offer".to_string()), Some("delayed-anchor".to_string())]
    );
}

#[test]
fn scroll_target_equal_to_container_is_skipped() {
    let page = Page::new();
    let _controller = WatchRevealController::start(
        config(
            RevealConfigDraft::new()
                .with_max_attempts(0)
                .with_scroll_to_id("delayed-content"),
        ),
        page.deps(),
    );
    page.queue.advance_ms(1_000);
    assert_eq!(
        page.document.scrolled_ids(),
        vec![Some("delayed-anchor".to_string())]
    );
}

#[test]
fn storage_failure_does_not_block_other_steps() {
    let page = Page::new();
    let controller = WatchRevealController::start(
        config(
            RevealConfigDraft::new()
                .with_max_attempts(0)
                .with_storage_key("x")
                .with_scroll_to_id("offer"),
        ),
        page.deps_with_store(Arc::new(BrokenStore)),
    );

    assert!(controller.is_displayed());
    assert!(page.content_shown());
    assert_eq!(page.document.scrolled_ids(), vec![Some("offer".to_string())]);
    assert_eq!(controller.status().failed_steps, vec!["persist-flag"]);
}

#[test]
fn unreadable_flag_falls_back_to_discovery() {
    let page = Page::new();
    page.load_player(SimulatedPlayer::new());
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_storage_key("x")),
        page.deps_with_store(Arc::new(BrokenStore)),
    );
    assert_eq!(page.host.lookups(), 1);
    assert_eq!(controller.status().phase, ControllerPhase::Watching);
}

#[test]
fn unsupported_selector_only_skips_the_container() {
    let page = Page::new();
    let mut draft = RevealConfigDraft::new().with_max_attempts(0);
    draft.delayed_content_selector = Some("main > section".into());
    let controller = WatchRevealController::start(config(draft), page.deps());

    assert!(controller.is_displayed());
    assert_eq!(page.delay_classes_left(), 0);
    let content = page.document.find_by_id("delayed-content").unwrap();
    assert!(!content.has_class("show"));
    assert_eq!(controller.status().failed_steps, vec!["show-container"]);
}

#[test]
fn destroy_during_discovery_stops_retries() {
    let page = Page::new();
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_max_attempts(3)),
        page.deps(),
    );
    controller.destroy();
    page.queue.advance_ms(60_000);

    assert!(!controller.is_displayed());
    assert_eq!(page.host.lookups(), 1);
    assert_eq!(page.queue.pending(), 0);

    assert!(controller.force_reveal());
    assert!(page.content_shown());
}

#[test]
fn destroy_while_watching_detaches() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(5.0)),
        page.deps(),
    );
    assert_eq!(player.listener_count(), 1);

    controller.destroy();
    assert_eq!(player.listener_count(), 0);
    assert_eq!(page.queue.pending(), 0);

    player.seek(30.0);
    assert!(!controller.is_displayed());
}

#[test]
fn destroy_cancels_persisted_fast_path() {
    let page = Page::new();
    page.store.set("x", PERSISTED_TRUE).unwrap();
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_storage_key("x")),
        page.deps(),
    );
    controller.destroy();
    page.queue.advance_ms(1_000);
    assert!(!controller.is_displayed());
}

#[test]
fn detach_falls_back_to_the_next_shape() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(5.0)),
        page.deps(),
    );
    assert_eq!(controller.status().listener, Some("named-event"));

    player.set_rejecting(ListenerShape::NamedEvent, true);
    controller.force_reveal();

    assert_eq!(player.listener_count(), 0);
    assert!(controller.status().failed_steps.is_empty());
}

#[test]
fn detach_failure_is_logged_not_fatal() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::with_shapes(&[ListenerShape::NamedEvent]));
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(5.0)),
        page.deps(),
    );
    player.set_rejecting(ListenerShape::NamedEvent, true);
    controller.force_reveal();

    assert!(page.content_shown());
    assert_eq!(controller.status().failed_steps, vec!["unsubscribe"]);
}

#[test]
fn nested_media_element_drives_the_trigger() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::with_shapes(&[
        ListenerShape::NestedElement,
    ]));
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(1.0)),
        page.deps(),
    );
    assert_eq!(controller.status().listener, Some("nested-element"));

    player.play();
    page.play_for(&player, 1_500);
    assert!(controller.is_displayed());
    assert_eq!(player.listener_count(), 0);
}

#[test]
fn player_without_listener_shapes_still_allows_manual_reveal() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::with_shapes(&[]));
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(1.0)),
        page.deps(),
    );
    let status = controller.status();
    assert_eq!(status.phase, ControllerPhase::Watching);
    assert_eq!(status.listener, None);

    player.play();
    page.play_for(&player, 3_000);
    assert!(!controller.is_displayed());

    assert!(controller.force_reveal());
    assert!(controller.status().failed_steps.is_empty());
}

#[test]
fn rediscovery_while_watching_keeps_a_single_listener_and_sampler() {
    let page = Page::new();
    let player = page.load_player(SimulatedPlayer::new());
    let controller = WatchRevealController::start(
        config(RevealConfigDraft::new().with_seconds_to_display(30.0)),
        page.deps(),
    );
    assert_eq!(player.listener_count(), 1);
    assert_eq!(page.queue.pending(), 1);

    controller.discover();
    assert_eq!(player.listener_count(), 1);
    assert_eq!(page.queue.pending(), 1);
    assert_eq!(page.host.lookups(), 1);

    assert!(controller.force_reveal());
    page.queue.advance_ms(60_000);
    assert_eq!(player.listener_count(), 0);
    assert_eq!(page.queue.pending(), 0);
}

#[test]
fn reveal_requested_from_inside_a_side_effect_is_ignored() {
    let draft = RevealConfigDraft::new()
        .with_seconds_to_display(5.0)
        .with_storage_key("nested");

    let reference = Page::new();
    let plain = WatchRevealController::start(config(draft.clone()), reference.deps());
    assert!(plain.force_reveal());
    reference.queue.advance_ms(300);

    let page = Page::new();
    let slot: Rc<RefCell<Option<WatchRevealController>>> = Rc::default();
    let nested = Rc::new(RefCell::new(Vec::new()));
    {
        let slot = Rc::clone(&slot);
        let nested = Rc::clone(&nested);
        page.document.subscribe(move |_event| {
            if let Some(controller) = slot.borrow().as_ref() {
                nested.borrow_mut().push(controller.force_reveal());
            }
        });
    }
    let controller = WatchRevealController::start(config(draft), page.deps());
    *slot.borrow_mut() = Some(controller.clone());

    assert!(controller.force_reveal());
    page.queue.advance_ms(300);

    let nested = nested.borrow();
    assert!(!nested.is_empty());
    assert!(nested.iter().all(|revealed| !revealed));
    assert_eq!(
        page.document.mutation_count(),
        reference.document.mutation_count()
    );
    assert_eq!(
        page.document.scrolled_ids(),
        reference.document.scrolled_ids()
    );
    assert_eq!(page.store.write_count().unwrap(), 1);
    assert_eq!(controller.reveal_reason(), Some(RevealReason::Manual));
}
