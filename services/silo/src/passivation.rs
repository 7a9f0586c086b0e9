//! Periodic deactivation of idle actors.

use std::time::Duration;

use chronicle_engine::Ingress;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

pub struct PassivationWorker {
    ingress: Ingress,
    interval: Duration,
}

impl PassivationWorker {
    pub fn new(ingress: Ingress, interval: Duration) -> Self {
        Self { ingress, interval }
    }

    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting passivation worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let passivated = self.ingress.passivate_idle().await;
                    debug!(passivated, "passivation pass complete");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Passivation worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chronicle_engine::{ActorHost, HostConfig};
    use chronicle_testing::Fixture;
    use serde_json::json;

    use crate::actors::Calculator;

    #[tokio::test]
    async fn test_worker_passivates_and_stops() {
        let fixture = Fixture::new();
        let host = Arc::new(ActorHost::<Calculator>::new(
            fixture.journals.clone(),
            fixture.snapshots.clone(),
            HostConfig {
                idle_timeout: Duration::ZERO,
            },
        ));
        let ingress = Ingress::new().with_gateway(host.clone());

        let address = chronicle_id::Address::random("calculator").unwrap();
        host.execute(&address, &Default::default(), "set", vec![json!(2)])
            .await
            .unwrap();
        assert_eq!(host.active_count().await, 1);

        let (tx, rx) = watch::channel(false);
        let worker = PassivationWorker::new(ingress, Duration::from_millis(10));
        let handle = tokio::spawn(async move { worker.run(rx).await });

        tokio::time::timeout(Duration::from_secs(5), async {
            while host.active_count().await > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(fixture.snapshot(&address).await.is_some());

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
