//! Fixed-interval metrics broadcast.

use rand::rngs::StdRng;
use rand::Rng;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, trace};

use crate::error::Result;
use crate::hub::Hub;
use crate::metrics;

/// Reference broadcast period.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);

/// Generate one sample and push it to every open connection.
///
/// Returns the number of connections the sample was queued for.
pub fn tick<R: Rng>(hub: &Hub, rng: &mut R) -> Result<usize> {
    let delivered = hub.publish(metrics::generate(rng))?;
    if delivered == 0 {
        trace!("tick with no connected clients");
    }
    Ok(delivered)
}

/// Spawn the broadcast loop. The first tick fires one full `period` after
/// the call; the loop runs until the returned handle is aborted.
pub fn spawn(hub: Hub, period: Duration, mut rng: StdRng) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(first) = Instant::now().checked_add(period) else {
            error!(period_ms = %period.as_millis(), "broadcast period out of range, loop not started");
            return;
        };
        let mut interval = interval_at(first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = tick(&hub, &mut rng) {
                error!(error = %e, "metrics broadcast failed");
            }
        }
    })
}
