//! Scheduler loop tests driven by a manual clock.
//!
//! `run_tick` is called directly with virtual time, so no test sleeps to
//! simulate elapsed scheduling periods.

use chorewheel::clock::{Clock, ManualClock};
use chorewheel::db::Database;
use chorewheel::scheduler::{OverdueNotifier, Scheduler, SchedulerConfig, TickReport};
use chorewheel::types::{CompletedTask, NewRecurringTask, RecurringTask};
use std::sync::{Arc, Mutex};

const DAY: i64 = 86_400_000;
const HOUR: i64 = 3_600_000;
/// Occurrence anchor date for the standard fixture task.
const D: i64 = 1_700_000_000_000 + 30 * DAY;
const T0: i64 = 1_700_000_000_000;

struct Fixture {
    db: Database,
    clock: Arc<ManualClock>,
    scheduler: Arc<Scheduler>,
    house_id: String,
    group_id: String,
    alice: String,
    bob: String,
}

fn setup() -> Fixture {
    let db = Database::open_in_memory().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let scheduler = Arc::new(Scheduler::new(
        db.clone(),
        clock.clone(),
        SchedulerConfig::default(),
    ));

    let house = db.create_house("Baker Street", T0).unwrap();
    let alice = db.create_person(&house.id, "Alice", T0).unwrap();
    let bob = db.create_person(&house.id, "Bob", T0).unwrap();
    let group = db.create_group(&house.id, "kitchen", T0).unwrap();
    db.add_group_member(&group.id, &alice.id, T0).unwrap();
    db.add_group_member(&group.id, &bob.id, T0).unwrap();

    Fixture {
        db,
        clock,
        scheduler,
        house_id: house.id,
        group_id: group.id,
        alice: alice.id,
        bob: bob.id,
    }
}

/// freq_base = D, schedule_offset = 1d, time_limit = 2h, freq_offset = 7d.
fn standard_task(f: &Fixture) -> RecurringTask {
    f.db.create_recurring_task(
        NewRecurringTask {
            house_id: f.house_id.clone(),
            name: "Trash".to_string(),
            description: None,
            freq_base: D,
            freq_offset: 7 * DAY,
            time_limit: 2 * HOUR,
            schedule_offset: DAY,
            points: 10,
            penalty: 5,
            responsible_group_id: f.group_id.clone(),
        },
        T0,
    )
    .unwrap()
}

fn tick(f: &Fixture) -> TickReport {
    f.scheduler.run_tick(f.clock.now_ms())
}

mod materialization {
    use super::*;

    #[test]
    fn nothing_due_means_empty_tick() {
        let f = setup();
        standard_task(&f);

        f.clock.set(D - DAY - 1); // one tick before the marker
        assert_eq!(tick(&f), TickReport::default());
    }

    #[test]
    fn due_task_materializes_once() {
        let f = setup();
        let task = standard_task(&f);

        f.clock.set(D - DAY + 1);
        let report = tick(&f);
        assert_eq!(report.materialized, 1);

        let instance = f.db.open_instance_for_task(&task.id).unwrap().unwrap();
        assert_eq!(instance.start_date, D - DAY + 1);
        assert_eq!(instance.due_date, D - DAY + 1 + 2 * HOUR);

        // Deterministic tie-break: both members at load 0, lower id wins.
        let expected = std::cmp::min(f.alice.clone(), f.bob.clone());
        assert_eq!(instance.responsible_person_id, expected);
    }

    #[test]
    fn no_double_materialization_across_ticks() {
        let f = setup();
        standard_task(&f);

        f.clock.set(D - DAY + 1);
        assert_eq!(tick(&f).materialized, 1);

        // However many more ticks run while the instance stays open, no
        // second instance appears.
        for _ in 0..5 {
            f.clock.advance(HOUR / 4);
            let report = tick(&f);
            assert_eq!(report.materialized, 0);
        }
        let open = f.db.list_house_scheduled(&f.house_id).unwrap();
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn marker_advances_by_period_not_to_now() {
        let f = setup();
        let task = standard_task(&f);

        // Tick runs 3 hours late.
        f.clock.set(D - DAY + 3 * HOUR);
        assert_eq!(tick(&f).materialized, 1);

        let loaded = f.db.get_recurring_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.next_scheduler_date, (D - DAY) + 7 * DAY);
    }

    #[test]
    fn empty_group_skips_and_retries() {
        let f = setup();
        let task = standard_task(&f);
        f.db.remove_group_member(&f.group_id, &f.alice).unwrap();
        f.db.remove_group_member(&f.group_id, &f.bob).unwrap();

        f.clock.set(D - DAY + 1);
        let report = tick(&f);
        assert_eq!(report.skipped_no_candidates, 1);
        assert_eq!(report.materialized, 0);

        // Marker unchanged, so the task stays due.
        let loaded = f.db.get_recurring_task(&task.id).unwrap().unwrap();
        assert_eq!(loaded.next_scheduler_date, D - DAY);

        // Member returns: next tick succeeds.
        f.db.add_group_member(&f.group_id, &f.bob, f.clock.now_ms())
            .unwrap();
        f.clock.advance(1);
        assert_eq!(tick(&f).materialized, 1);
    }

    #[test]
    fn one_bad_task_does_not_block_the_batch() {
        let f = setup();
        standard_task(&f);

        // Second task with an empty group fails with NoCandidates; the
        // healthy task must still materialize in the same tick.
        let empty_group = f.db.create_group(&f.house_id, "nobody", T0).unwrap();
        f.db.create_recurring_task(
            NewRecurringTask {
                house_id: f.house_id.clone(),
                name: "Doomed".to_string(),
                description: None,
                freq_base: D,
                freq_offset: 7 * DAY,
                time_limit: HOUR,
                schedule_offset: DAY,
                points: 1,
                penalty: 1,
                responsible_group_id: empty_group.id,
            },
            T0,
        )
        .unwrap();

        f.clock.set(D - DAY + 1);
        let report = tick(&f);
        assert_eq!(report.materialized, 1);
        assert_eq!(report.skipped_no_candidates, 1);
    }

    #[test]
    fn rotation_alternates_between_equal_members() {
        let f = setup();
        let task = standard_task(&f);

        // Round 1.
        f.clock.set(D - DAY + 1);
        tick(&f);
        let first = f.db.open_instance_for_task(&task.id).unwrap().unwrap();
        f.db.close_scheduled_as_completed(&first.id, f.clock.now_ms() + HOUR, false)
            .unwrap();

        // Round 2, one period later: the other member is now behind on
        // points and takes the next instance.
        f.clock.set(D - DAY + 7 * DAY + 1);
        tick(&f);
        let second = f.db.open_instance_for_task(&task.id).unwrap().unwrap();
        assert_ne!(
            second.responsible_person_id,
            first.responsible_person_id
        );
    }
}

mod overdue {
    use super::*;

    #[test]
    fn overdue_instance_is_closed_penalised() {
        let f = setup();
        let task = standard_task(&f);

        f.clock.set(D - DAY + 1);
        tick(&f);
        let instance = f.db.open_instance_for_task(&task.id).unwrap().unwrap();

        // Just past due.
        f.clock.set(instance.due_date + 1);
        let report = tick(&f);
        assert_eq!(report.penalised, 1);

        assert!(f.db.get_scheduled_task(&instance.id).unwrap().is_none());
        let history = f.db.list_house_history(&f.house_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        let record = &history[0];
        assert!(record.penalised);
        assert_eq!(record.completion_date, instance.due_date + 1);
        assert_eq!(record.responsible_person_id, instance.responsible_person_id);
    }

    #[test]
    fn penalty_uses_snapshot_not_edited_task() {
        let f = setup();
        let task = standard_task(&f);

        f.clock.set(D - DAY + 1);
        tick(&f);
        let instance = f.db.open_instance_for_task(&task.id).unwrap().unwrap();

        // Task edited while the instance is open.
        f.db.update_recurring_task(
            &task.id,
            None,
            None,
            Some(1000),
            Some(999),
            None,
            f.clock.now_ms(),
        )
        .unwrap();

        f.clock.set(instance.due_date + 1);
        tick(&f);

        let record = &f.db.list_house_history(&f.house_id, 1).unwrap()[0];
        assert_eq!(record.points, 10);
        assert_eq!(record.penalty, 5);
    }

    #[test]
    fn not_yet_due_instance_survives_the_sweep() {
        let f = setup();
        let task = standard_task(&f);

        f.clock.set(D - DAY + 1);
        tick(&f);
        let instance = f.db.open_instance_for_task(&task.id).unwrap().unwrap();

        // Exactly at due date: not strictly past, not swept.
        f.clock.set(instance.due_date);
        let report = tick(&f);
        assert_eq!(report.penalised, 0);
        assert!(f.db.get_scheduled_task(&instance.id).unwrap().is_some());
    }

    #[test]
    fn notifier_fires_after_successful_conversion() {
        struct Recorder(Mutex<Vec<CompletedTask>>);
        impl OverdueNotifier for Recorder {
            fn overdue_closed(&self, record: &CompletedTask) {
                self.0.lock().unwrap().push(record.clone());
            }
        }

        let f = setup();
        let task = standard_task(&f);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let scheduler = Arc::new(Scheduler::with_notifier(
            f.db.clone(),
            f.clock.clone(),
            SchedulerConfig::default(),
            recorder.clone(),
        ));

        f.clock.set(D - DAY + 1);
        scheduler.run_tick(f.clock.now_ms());
        let instance = f.db.open_instance_for_task(&task.id).unwrap().unwrap();

        f.clock.set(instance.due_date + 1);
        scheduler.run_tick(f.clock.now_ms());

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].penalised);
        assert_eq!(seen[0].task_id, task.id);
    }
}

mod scenario {
    use super::*;

    /// The full walkthrough: materialize one tick before the occurrence,
    /// then sweep it penalised just past its two-hour window.
    #[test]
    fn schedule_then_miss_then_penalise() {
        let f = setup();
        standard_task(&f);

        f.clock.set(D - DAY);
        assert_eq!(tick(&f), TickReport::default()); // marker not strictly past

        f.clock.advance(1);
        let report = tick(&f);
        assert_eq!(report.materialized, 1);

        let open = f.db.list_house_scheduled(&f.house_id).unwrap();
        assert_eq!(open.len(), 1);
        let instance = &open[0];
        assert_eq!(instance.due_date, D - DAY + 1 + 2 * HOUR);
        let expected = std::cmp::min(f.alice.clone(), f.bob.clone());
        assert_eq!(instance.responsible_person_id, expected);

        f.clock.set(instance.due_date + 1);
        let report = tick(&f);
        assert_eq!(report.penalised, 1);

        let history = f.db.list_house_history(&f.house_id, 10).unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].penalised);
    }
}

mod loop_control {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn start_is_idempotent_and_stop_completes() {
        let f = setup();
        let scheduler = Arc::new(Scheduler::new(
            f.db.clone(),
            f.clock.clone(),
            SchedulerConfig {
                tick_interval: Duration::from_millis(10),
                ..SchedulerConfig::default()
            },
        ));

        let handle = scheduler.start().expect("first start runs the loop");
        assert!(scheduler.is_running());

        // Second start is a no-op.
        assert!(scheduler.start().is_none());

        scheduler.stop();
        handle.await.unwrap();
        assert!(!scheduler.is_running());

        // Restart after stop works.
        let handle = scheduler.start().expect("restart after stop");
        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_any_tick_elapses_quickly() {
        let f = setup();
        let scheduler = Arc::new(Scheduler::new(
            f.db.clone(),
            f.clock.clone(),
            SchedulerConfig {
                tick_interval: Duration::from_secs(3600),
                ..SchedulerConfig::default()
            },
        ));

        let handle = scheduler.start().unwrap();
        // The loop is asleep for an hour; stop must wake it.
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.stop();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop exits promptly on stop")
            .unwrap();
    }
}
