use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, sleep, MissedTickBehavior};

pub type Job = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type JobFactory = Box<dyn Fn() -> Job + Send + Sync>;

// firing is best-effort and in-process; jobs that must survive late or
// duplicate firing guard themselves
pub trait JobScheduler: Send + Sync {
    fn schedule_once(&self, run_at: DateTime<Utc>, job: Job);

    fn schedule_repeating(&self, every: Duration, factory: JobFactory);
}

pub struct TokioScheduler;

impl JobScheduler for TokioScheduler {
    fn schedule_once(&self, run_at: DateTime<Utc>, job: Job) {
        let delay = (run_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);

        tokio::spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }
            job.await;
        });
    }

    fn schedule_repeating(&self, every: Duration, factory: JobFactory) {
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick of tokio's interval completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                factory().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::sync::{mpsc, oneshot};
    use tokio::time::timeout;

    use super::{Job, JobFactory, JobScheduler, TokioScheduler};

    #[tokio::test]
    async fn past_due_job_fires_immediately() {
        let (tx, rx) = oneshot::channel();
        let run_at = Utc::now() - chrono::Duration::seconds(30);

        TokioScheduler.schedule_once(
            run_at,
            Box::pin(async move {
                let _ = tx.send(());
            }),
        );

        timeout(Duration::from_secs(1), rx)
            .await
            .expect("job did not fire")
            .expect("job sender dropped");
    }

    #[tokio::test]
    async fn future_job_fires_after_its_delay() {
        let (tx, rx) = oneshot::channel();
        let run_at = Utc::now() + chrono::Duration::milliseconds(20);

        TokioScheduler.schedule_once(
            run_at,
            Box::pin(async move {
                let _ = tx.send(());
            }),
        );

        timeout(Duration::from_secs(1), rx)
            .await
            .expect("job did not fire")
            .expect("job sender dropped");
    }

    #[tokio::test]
    async fn repeating_job_keeps_firing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let factory: JobFactory = Box::new(move || {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(());
            }) as Job
        });

        TokioScheduler.schedule_repeating(Duration::from_millis(10), factory);

        for _ in 0..2 {
            timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("repeating job stopped firing")
                .expect("job sender dropped");
        }
    }
}
