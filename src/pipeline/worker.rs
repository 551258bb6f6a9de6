//! Bounded channel between validation and aggregation. Validation is a pure
//! per-line function, so producers can fan out freely; the drain task is the
//! single writer for every device mutation. The channel bound provides
//! back-pressure when validation runs ahead of aggregation.

use tokio::sync::mpsc;
use tokio::task;

use super::PipelineConfig;
use crate::device::DeviceAggregator;
use crate::record::ProbeRecord;

pub struct AggregatorWorker {
    pub sender: mpsc::Sender<ProbeRecord>,
    handle: task::JoinHandle<DeviceAggregator>,
}

impl AggregatorWorker {
    /// Queue bound comes from the pipeline configuration.
    pub fn from_config(aggregator: DeviceAggregator, config: &PipelineConfig) -> Self {
        Self::spawn(aggregator, config.channel_buffer)
    }

    pub fn spawn(mut aggregator: DeviceAggregator, buffer: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<ProbeRecord>(buffer.max(1));
        let handle = task::spawn_blocking(move || {
            while let Some(record) = receiver.blocking_recv() {
                aggregator.ingest(&record);
            }
            aggregator
        });
        Self { sender, handle }
    }

    /// Close the channel and hand the aggregator back once the queue drains.
    pub async fn finish(self) -> DeviceAggregator {
        drop(self.sender);
        self.handle.await.expect("aggregation task panicked")
    }
}
