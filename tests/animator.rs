use std::collections::HashSet;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use amp2_control::memory::MemoryChannel;
use amp2_control::{Channel, ConfigError, PulseAnimator};

const STEP: Duration = Duration::from_millis(5);

fn board(count: usize) -> (PulseAnimator, Vec<Arc<MemoryChannel>>) {
    let leds: Vec<Arc<MemoryChannel>> = (0..count).map(|_| Arc::new(MemoryChannel::new())).collect();
    let channels = leds
        .iter()
        .map(|led| Arc::clone(led) as Arc<dyn Channel>)
        .collect();
    (PulseAnimator::new(channels).with_interval(STEP), leds)
}

fn threads(led: &MemoryChannel) -> HashSet<ThreadId> {
    led.writes().iter().map(|w| w.thread).collect()
}

fn config_error(err: &anyhow::Error) -> Option<&ConfigError> {
    err.downcast_ref::<ConfigError>()
}

#[test]
fn staggers_channel_starts() {
    let (animator, leds) = board(3);
    let started = Instant::now();
    animator.pulse(Duration::from_millis(300)).unwrap();
    // Blocks for the whole stagger.
    assert!(started.elapsed() >= Duration::from_millis(300));

    let first: Vec<Instant> = leds.iter().map(|led| led.writes()[0].at).collect();
    let gap_2 = first[1] - first[0];
    let gap_3 = first[2] - first[0];
    assert!(gap_2 >= Duration::from_millis(80) && gap_2 <= Duration::from_millis(180), "{gap_2:?}");
    assert!(gap_3 >= Duration::from_millis(180) && gap_3 <= Duration::from_millis(300), "{gap_3:?}");
    assert_eq!(animator.running_workers(), 3);
    animator.stop();
    assert_eq!(animator.running_workers(), 0);
}

#[test]
fn every_channel_starts_dark() {
    let (animator, leds) = board(2);
    animator.pulse(Duration::from_millis(100)).unwrap();
    animator.stop();
    for led in &leds {
        assert_eq!(led.values()[0], 0.0);
        assert!(led.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn new_pulse_replaces_old_workers() {
    let (animator, leds) = board(3);
    animator.pulse(Duration::from_millis(60)).unwrap();
    let old: Vec<HashSet<ThreadId>> = leds.iter().map(|led| threads(led)).collect();

    animator.pulse(Duration::from_millis(300)).unwrap();
    thread::sleep(STEP * 3);
    let settled = Instant::now();
    thread::sleep(Duration::from_millis(60));
    animator.stop();

    for (led, old) in leds.iter().zip(&old) {
        assert!(!old.is_empty());
        let late = led
            .writes()
            .iter()
            .filter(|w| w.at > settled && old.contains(&w.thread))
            .count();
        assert_eq!(late, 0);
        assert_eq!(threads(led).difference(old).count(), 1);
    }
}

#[test]
fn superseded_worker_writes_at_most_one_stale_frame() {
    let (animator, leds) = board(2);
    animator.pulse(Duration::from_millis(100)).unwrap();
    let old: Vec<HashSet<ThreadId>> = leds.iter().map(|led| threads(led)).collect();
    animator.pulse(Duration::from_millis(100)).unwrap();
    thread::sleep(STEP * 3);
    animator.stop();

    for (led, old) in leds.iter().zip(&old) {
        let writes = led.writes();
        let handover = writes
            .iter()
            .find(|w| !old.contains(&w.thread))
            .map(|w| w.at)
            .unwrap();
        let stale = writes
            .iter()
            .filter(|w| w.at > handover && old.contains(&w.thread))
            .count();
        assert!(stale <= 1, "{stale} stale frames");
    }
}

#[test]
fn set_static_freezes_all_channels() {
    let (animator, leds) = board(3);
    animator.pulse(Duration::from_millis(90)).unwrap();
    animator.set_static(0.0).unwrap();
    assert_eq!(animator.running_workers(), 0);

    let counts: Vec<usize> = leds.iter().map(|led| led.len()).collect();
    thread::sleep(Duration::from_millis(50));
    for (led, count) in leds.iter().zip(counts) {
        assert_eq!(led.len(), count);
        assert_eq!(led.last().unwrap().value, 0.0);
    }
}

#[test]
fn set_levels_and_on() {
    let (animator, leds) = board(3);
    animator.set_levels(&[0.01, 1.0, 0.1]).unwrap();
    assert_eq!(leds[0].values(), [0.01]);
    assert_eq!(leds[1].values(), [1.0]);
    assert_eq!(leds[2].values(), [0.1]);

    animator.on(3).unwrap();
    assert_eq!(leds[2].last().unwrap().value, 1.0);
    assert_eq!(leds[0].len(), 1);

    let err = animator.set_levels(&[0.5]).unwrap_err();
    assert_eq!(
        config_error(&err),
        Some(&ConfigError::LevelCount {
            expected: 3,
            got: 1
        })
    );
    let err = animator.on(0).unwrap_err();
    assert!(matches!(config_error(&err), Some(ConfigError::LedIndex { .. })));
    assert!(animator.on(4).is_err());
}

#[test]
fn rejects_invalid_requests() {
    let (animator, leds) = board(2);
    let err = animator.pulse(Duration::ZERO).unwrap_err();
    assert_eq!(config_error(&err), Some(&ConfigError::ZeroCycle));

    let err = animator.set_static(1.5).unwrap_err();
    assert_eq!(config_error(&err), Some(&ConfigError::Brightness(1.5)));
    assert!(animator.set_static(f64::NAN).is_err());
    assert!(animator.set_levels(&[0.5, -0.1]).is_err());

    let bad_curve = PulseAnimator::new(vec![Arc::clone(&leds[0]) as Arc<dyn Channel>])
        .with_exponent(0.0);
    let err = bad_curve.pulse(Duration::from_millis(100)).unwrap_err();
    assert_eq!(config_error(&err), Some(&ConfigError::Exponent(0.0)));

    assert!(leds.iter().all(|led| led.is_empty()));
}

#[test]
fn empty_board_is_a_no_op() {
    let animator = PulseAnimator::new(Vec::new());
    let started = Instant::now();
    animator.pulse(Duration::from_secs(4)).unwrap();
    assert!(started.elapsed() < Duration::from_millis(100));
    animator.set_static(0.5).unwrap();
    assert_eq!(animator.running_workers(), 0);
}

#[test]
fn failing_channel_does_not_stop_the_others() {
    let broken = Arc::new(MemoryChannel::failing_after(2));
    let healthy = Arc::new(MemoryChannel::new());
    let animator = PulseAnimator::new(vec![
        Arc::clone(&broken) as Arc<dyn Channel>,
        Arc::clone(&healthy) as Arc<dyn Channel>,
    ])
    .with_interval(STEP);

    animator.pulse(Duration::from_millis(100)).unwrap();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(broken.len(), 2);
    assert_eq!(animator.running_workers(), 1);
    let before = healthy.len();
    thread::sleep(Duration::from_millis(30));
    assert!(healthy.len() > before);
    animator.stop();
}

#[test]
fn dropping_the_animator_stops_workers() {
    let (animator, leds) = board(2);
    animator.pulse(Duration::from_millis(40)).unwrap();
    drop(animator);
    let counts: Vec<usize> = leds.iter().map(|led| led.len()).collect();
    thread::sleep(Duration::from_millis(30));
    for (led, count) in leds.iter().zip(counts) {
        assert_eq!(led.len(), count);
    }
}

#[test]
fn on_stops_only_its_own_led() {
    let (animator, leds) = board(3);
    animator.pulse(Duration::from_millis(90)).unwrap();
    animator.on(2).unwrap();
    assert_eq!(animator.running_workers(), 2);

    let lit = leds[1].len();
    assert_eq!(leds[1].last().unwrap().value, 1.0);
    let others: Vec<usize> = [0, 2].iter().map(|&i| leds[i].len()).collect();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(leds[1].len(), lit);
    assert!(leds[0].len() > others[0]);
    assert!(leds[2].len() > others[1]);
    animator.stop();
}
