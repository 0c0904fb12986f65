use futures::future::join_all;
use tracing::{error, info, warn};

use nightcharge_common::{
    report::{existing_jobs_message, outcome_message, switch_message},
    ChargePlan, ReconcileOutcome, SwitchOutcome,
};

use crate::traits::{ActionStore, Notifier};

/// Delivery failures are logged and otherwise ignored.
pub async fn notify(notifier: &dyn Notifier, message: &str) {
    if let Err(err) = notifier.notify(message).await {
        warn!("notification failed: {err:#}");
    }
}

/// Replaces every stored job on the device with one job per switch for `plan`.
///
/// Listing and deleting gate everything after them; once the old jobs are gone
/// each switch is created independently and a failure stays with that switch.
pub async fn reconcile(
    store: &dyn ActionStore,
    notifier: &dyn Notifier,
    plan: &ChargePlan,
    switch_ids: &[u32],
) -> ReconcileOutcome {
    let existing = match store.list_jobs().await {
        Ok(jobs) => jobs,
        Err(err) => {
            error!("listing jobs on {} failed: {err:#}", store.name());
            return finish(
                notifier,
                ReconcileOutcome::ListFailed {
                    error: format!("{err:#}"),
                },
            )
            .await;
        }
    };
    info!("{} stored job(s) on {}", existing.len(), store.name());
    notify(notifier, &existing_jobs_message(&existing)).await;

    if let Err(err) = store.delete_all_jobs().await {
        error!("deleting jobs on {} failed: {err:#}", store.name());
        return finish(
            notifier,
            ReconcileOutcome::DeleteFailed {
                error: format!("{err:#}"),
            },
        )
        .await;
    }
    let removed = existing.len();

    if plan.is_idle() {
        info!("no charge required; leaving switches unscheduled");
        return finish(notifier, ReconcileOutcome::NothingToSchedule { removed }).await;
    }

    let creations = plan.actions(switch_ids).into_iter().map(|action| async move {
        let outcome = match store.create_job(&action).await {
            Ok(job_id) => {
                info!(
                    "switch {} scheduled at {} for {}s (job {job_id})",
                    action.switch_id, action.start, action.duration_secs
                );
                SwitchOutcome::created(action.switch_id, job_id)
            }
            Err(err) => {
                error!("scheduling switch {} failed: {err:#}", action.switch_id);
                SwitchOutcome::failed(action.switch_id, format!("{err:#}"))
            }
        };
        notify(notifier, &switch_message(&outcome, plan)).await;
        outcome
    });
    let switches = join_all(creations).await;

    finish(notifier, ReconcileOutcome::Applied { removed, switches }).await
}

async fn finish(notifier: &dyn Notifier, outcome: ReconcileOutcome) -> ReconcileOutcome {
    notify(notifier, &outcome_message(&outcome)).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeStore, RecordingNotifier};
    use nightcharge_common::{StoredJob, TimeOfDay};
    use pretty_assertions::assert_eq;

    fn plan(hours: u32) -> ChargePlan {
        ChargePlan {
            start: TimeOfDay::from_hm(6 - hours, 0),
            duration_secs: hours * 3600,
            clamped: false,
        }
    }

    fn stored(id: u32) -> StoredJob {
        StoredJob {
            id,
            enable: true,
            timespec: "0 0 1 * * SUN,MON,TUE,WED,THU,FRI,SAT".to_string(),
        }
    }

    #[tokio::test]
    async fn replaces_jobs_on_every_switch() {
        let store = FakeStore::with_jobs(vec![stored(1), stored(2)]);
        let notifier = RecordingNotifier::default();

        let outcome = reconcile(&store, &notifier, &plan(5), &[0, 1]).await;

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied {
                removed: 2,
                switches: vec![SwitchOutcome::created(0, 1), SwitchOutcome::created(1, 2)],
            }
        );
        assert_eq!(
            store.calls(),
            vec!["list", "delete", "create 0 01:00 18000", "create 1 01:00 18000"]
        );
        let messages = notifier.messages();
        assert!(messages[0].starts_with("Replacing 2 stored schedule(s)"));
        assert_eq!(
            messages.last().map(String::as_str),
            Some("Removed 2 schedule(s); 2/2 switch(es) scheduled")
        );
    }

    #[tokio::test]
    async fn list_failure_aborts_before_delete() {
        let store = FakeStore {
            fail_list: true,
            ..FakeStore::default()
        };
        let notifier = RecordingNotifier::default();

        let outcome = reconcile(&store, &notifier, &plan(5), &[0]).await;

        assert!(outcome.is_aborted());
        assert_eq!(store.calls(), vec!["list"]);
        assert_eq!(notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn delete_failure_prevents_any_creation() {
        let store = FakeStore {
            fail_delete: true,
            ..FakeStore::with_jobs(vec![stored(4)])
        };
        let notifier = RecordingNotifier::default();

        let outcome = reconcile(&store, &notifier, &plan(5), &[0, 1, 2]).await;

        assert_eq!(
            outcome,
            ReconcileOutcome::DeleteFailed {
                error: "delete rejected".to_string()
            }
        );
        assert!(store.created().is_empty());
        assert_eq!(
            notifier.messages().last().map(String::as_str),
            Some("Cycle aborted: could not delete stored schedules: delete rejected")
        );
    }

    #[tokio::test]
    async fn zero_duration_deletes_but_creates_nothing() {
        let store = FakeStore::with_jobs(vec![stored(9)]);
        let notifier = RecordingNotifier::default();
        let idle = ChargePlan {
            start: TimeOfDay::from_hm(6, 0),
            duration_secs: 0,
            clamped: false,
        };

        let outcome = reconcile(&store, &notifier, &idle, &[0, 1]).await;

        assert_eq!(outcome, ReconcileOutcome::NothingToSchedule { removed: 1 });
        assert_eq!(store.calls(), vec!["list", "delete"]);
    }

    #[tokio::test]
    async fn one_failing_switch_leaves_others_scheduled() {
        let store = FakeStore {
            failing_switches: vec![1],
            ..FakeStore::default()
        };
        let notifier = RecordingNotifier::default();

        let outcome = reconcile(&store, &notifier, &plan(3), &[0, 1, 2]).await;

        assert_eq!(outcome.failed_switches(), 1);
        assert_eq!(store.created().len(), 3);
        let ReconcileOutcome::Applied { switches, .. } = outcome else {
            panic!("expected applied outcome");
        };
        assert!(switches[0].is_ok());
        assert_eq!(switches[1].error.as_deref(), Some("switch 1 offline"));
        assert!(switches[2].is_ok());

        let messages = notifier.messages();
        assert!(messages
            .iter()
            .any(|m| m == "Switch 1: schedule creation failed: switch 1 offline"));
        assert!(messages.iter().any(|m| m.starts_with("Switch 2: on at 03:00")));
    }

    #[tokio::test]
    async fn notification_failures_do_not_stop_reconcile() {
        let store = FakeStore::default();
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };

        let outcome = reconcile(&store, &notifier, &plan(2), &[0]).await;

        assert_eq!(outcome.failed_switches(), 0);
        assert_eq!(store.created(), vec!["create 0 04:00 7200"]);
    }
}
