use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle, time};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Emits one tick per period while running. Stopping (or dropping) the
/// clock aborts the ticking task; no tick can be observed afterwards.
/// Pause/resume at the recorder level is stop + fresh clock, so a resumed
/// second counts as one unit regardless of wall-clock drift during the
/// pause.
#[derive(Debug)]
pub struct SampleClock {
    ticks: mpsc::Receiver<()>,
    ticker: JoinHandle<()>,
}

impl SampleClock {
    pub fn start(period: Duration) -> Self {
        let (tx, rx) = mpsc::channel(8);
        let ticker = tokio::spawn(async move {
            // First tick one full period after start.
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if tx.send(()).await.is_err() {
                    break;
                }
            }
        });
        Self { ticks: rx, ticker }
    }

    pub async fn tick(&mut self) -> Option<()> {
        self.ticks.recv().await
    }

    pub fn stop(mut self) {
        self.ticker.abort();
        self.ticks.close();
    }
}

impl Drop for SampleClock {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}
