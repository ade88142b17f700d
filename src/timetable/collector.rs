//! Scrape-time publication of the schedule state.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeLabelSet, EncodeMetric};
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::metrics::MetricType;

use super::schedule::ScheduleItem;
use crate::state::StateHolder;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct EventLabels {
    id: String,
    name: String,
    location: String,
}

impl EventLabels {
    fn for_item(item: &ScheduleItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            location: item.location.clone(),
        }
    }
}

/// Publishes one series per event per metric name.
///
/// Activity is evaluated against the wall clock at scrape time using
/// closed-interval semantics. With no schedule loaded the metric
/// descriptors are still emitted, just with no series, so the absence
/// of data is visible to the scraper.
#[derive(Debug)]
pub struct EventCollector {
    state: Arc<StateHolder<Vec<ScheduleItem>>>,
}

impl EventCollector {
    pub fn new(state: Arc<StateHolder<Vec<ScheduleItem>>>) -> Self {
        Self { state }
    }

    fn encode_at(
        &self,
        encoder: &mut DescriptorEncoder<'_>,
        now: DateTime<Utc>,
    ) -> Result<(), fmt::Error> {
        let view = self.state.read();
        let events = view.record.unwrap_or_default();

        encode_event_family(
            encoder,
            "event_start_seconds",
            "Event start time as Unix seconds",
            &events,
            |event| event.start.timestamp() as f64,
        )?;
        encode_event_family(
            encoder,
            "event_end_seconds",
            "Event end time as Unix seconds",
            &events,
            |event| event.end.timestamp() as f64,
        )?;
        encode_event_family(
            encoder,
            "event_duration_seconds",
            "Event length in seconds, clamped to be non-negative",
            &events,
            |event| event.duration_seconds(),
        )?;
        encode_event_family(
            encoder,
            "event_active",
            "1 if the event is in progress at scrape time, 0 otherwise",
            &events,
            |event| {
                if event.is_active_at(now) {
                    1.0
                } else {
                    0.0
                }
            },
        )?;

        Ok(())
    }
}

impl Collector for EventCollector {
    fn encode(&self, mut encoder: DescriptorEncoder<'_>) -> Result<(), fmt::Error> {
        self.encode_at(&mut encoder, Utc::now())
    }
}

fn encode_event_family(
    encoder: &mut DescriptorEncoder<'_>,
    name: &str,
    help: &str,
    events: &[ScheduleItem],
    value: impl Fn(&ScheduleItem) -> f64,
) -> Result<(), fmt::Error> {
    let mut family_encoder = encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
    for event in events {
        let gauge = ConstGauge::new(value(event));
        let labels = EventLabels::for_item(event);
        let metric_encoder = family_encoder.encode_family(&labels)?;
        gauge.encode(metric_encoder)?;
    }
    Ok(())
}
