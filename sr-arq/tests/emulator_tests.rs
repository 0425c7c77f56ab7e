//! End-to-end runs over the discrete-event channel emulator.
//!
//! Every run must finish with the generated payloads delivered exactly once,
//! in order, whatever the loss and corruption rates.

use sr_arq::simulator::{Report, Simulator, SimulatorConfig};
use sr_arq::{Config, RetransmitPolicy};

fn run(engine: &Config, sim: SimulatorConfig) -> Report {
    Simulator::new(engine, sim).expect("valid emulator config").run()
}

fn assert_clean(report: &Report, label: &str) {
    assert!(report.completed, "{label}: run did not complete\n{report}");
    assert!(report.in_order(), "{label}: delivery out of order\n{report}");
}

// ---------------------------------------------------------------------------
// Fault grid
// ---------------------------------------------------------------------------

#[test]
fn delivers_in_order_across_fault_grid() {
    let engine = Config::default();
    for loss in [0.0, 0.1, 0.3] {
        for corrupt in [0.0, 0.1, 0.3] {
            for seed in 0..4 {
                let report = run(
                    &engine,
                    SimulatorConfig {
                        messages: 50,
                        loss,
                        corrupt,
                        seed,
                        ..SimulatorConfig::default()
                    },
                );
                assert_clean(&report, &format!("loss={loss} corrupt={corrupt} seed={seed}"));
            }
        }
    }
}

#[test]
fn oldest_only_policy_also_converges() {
    let engine = Config::default().with_policy(RetransmitPolicy::OldestOnly);
    for seed in 0..6 {
        let report = run(
            &engine,
            SimulatorConfig {
                messages: 40,
                loss: 0.2,
                corrupt: 0.2,
                seed,
                ..SimulatorConfig::default()
            },
        );
        assert_clean(&report, &format!("oldest-only seed={seed}"));
    }
}

#[test]
fn minimal_sequence_space_survives_heavy_loss() {
    // seq space exactly twice the window
    let engine = Config::new(4, 8, 16.0).unwrap();
    for seed in 10..16 {
        let report = run(
            &engine,
            SimulatorConfig {
                messages: 60,
                loss: 0.4,
                corrupt: 0.1,
                mean_interval: 3.0,
                seed,
                ..SimulatorConfig::default()
            },
        );
        assert_clean(&report, &format!("tight space seed={seed}"));
    }
}

#[test]
fn stop_and_wait_window_of_one() {
    let engine = Config::new(1, 2, 16.0).unwrap();
    let report = run(
        &engine,
        SimulatorConfig {
            messages: 25,
            loss: 0.2,
            corrupt: 0.2,
            seed: 7,
            ..SimulatorConfig::default()
        },
    );
    assert_clean(&report, "window 1");
}

// ---------------------------------------------------------------------------
// Faults are actually exercised
// ---------------------------------------------------------------------------

#[test]
fn faults_trigger_recovery_paths() {
    let report = run(
        &Config::default(),
        SimulatorConfig {
            messages: 100,
            loss: 0.3,
            corrupt: 0.3,
            seed: 3,
            ..SimulatorConfig::default()
        },
    );
    assert_clean(&report, "recovery paths");
    assert!(report.channel.data.lost > 0);
    assert!(report.channel.data.corrupted > 0);
    assert!(report.channel.acks.corrupted > 0);
    assert!(report.sender.packets_resent > 0);
    assert!(report.receiver.corrupted > 0);
    assert!(report.sender.corrupted_acks > 0);
    assert_eq!(report.receiver.delivered, 100);
}

// ---------------------------------------------------------------------------
// Step-wise invariants
// ---------------------------------------------------------------------------

#[test]
fn invariants_hold_at_every_event() {
    let engine = Config::default();
    let space = engine.seq_space();
    let mut sim = Simulator::new(
        &engine,
        SimulatorConfig {
            messages: 80,
            loss: 0.25,
            corrupt: 0.15,
            mean_interval: 2.0,
            seed: 99,
            ..SimulatorConfig::default()
        },
    )
    .unwrap();

    let max_time = SimulatorConfig::default().max_time;
    let mut last_delivered = 0;
    let mut last_now = sim.now();
    assert_eq!(last_now, 0.0);
    while sim.step() {
        let now = sim.now();
        assert!(now >= last_now, "clock went back from {last_now} to {now}");
        assert!(now <= max_time);
        last_now = now;

        let sender = sim.sender();
        assert!(sender.window_count() <= engine.window_size());
        assert_eq!(sender.is_idle(), !sim.sender_timer_running());
        assert_eq!(
            space.distance(sender.base(), sender.next_seq()) as usize,
            sender.window_count()
        );

        let delivered = sim.delivered().len();
        assert!(delivered >= last_delivered);
        assert_eq!(
            sim.receiver().expected(),
            (delivered % space.size() as usize) as u32
        );
        last_delivered = delivered;
    }

    let report = sim.into_report();
    assert_clean(&report, "stepwise");
    assert_eq!(report.end_time, last_now);
}
