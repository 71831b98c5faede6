// Unless explicitly stated otherwise all files in this repository are licensed
// under the Apache License Version 2.0.
// This product includes software developed at Datadog (https://www.datadoghq.com/).
// Copyright 2026-present Datadog, Inc.

use super::scheduled::ScheduledMeasurementInstance;
use crate::ids::ID;
use crate::location::Location;
use crate::measurement::MeasurementInstance;
use crate::resource::Resource;
use log::debug;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;
use tokio::time::Instant;

/// Time-ordered collections of one endpoint. The head is the next collection due.
#[derive(Debug)]
pub struct ScheduledCollectionsQueue<L> {
    queue: Mutex<BTreeSet<ScheduledMeasurementInstance<L>>>,
    scheduled: Notify,
}

impl<L: Location> Default for ScheduledCollectionsQueue<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: Location> ScheduledCollectionsQueue<L> {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(BTreeSet::new()),
            scheduled: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<ScheduledMeasurementInstance<L>>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn schedule<I>(&self, schedules: I)
    where
        I: IntoIterator<Item = ScheduledMeasurementInstance<L>>,
    {
        self.lock().extend(schedules);
        self.scheduled.notify_one();
    }

    /// Drop every collection of the given resources.
    pub fn unschedule(&self, resources: &[Arc<Resource<L>>]) {
        let ids: HashSet<&ID> = resources.iter().map(|r| r.id()).collect();
        self.lock().retain(|s| !ids.contains(s.resource().id()));
    }

    /// Peek at the head. `None` when nothing is scheduled.
    pub fn next_expected_collection_time(&self) -> Option<Instant> {
        self.lock().first().map(ScheduledMeasurementInstance::next_collection_time)
    }

    pub fn pop_next_scheduled_set(&self) -> Vec<Arc<MeasurementInstance<L>>> {
        self.pop_next_scheduled_set_at(Instant::now())
    }

    /// Pop every collection due at `now`, reschedule each one `now` plus its
    /// interval later, and return the distinct instances. Empty if the head
    /// is still in the future.
    pub fn pop_next_scheduled_set_at(&self, now: Instant) -> Vec<Arc<MeasurementInstance<L>>> {
        let mut queue = self.lock();
        let mut due = Vec::new();
        let mut seen = HashSet::new();
        let mut rescheduled = Vec::new();

        // Take everything already due rather than only the entries sharing the
        // head's timestamp: each popped entry is rescheduled from `now`, so
        // instances with commensurate intervals stay aligned (1s and 5s both
        // fire at +5s) instead of drifting apart by one round each.
        while queue
            .first()
            .is_some_and(|head| head.next_collection_time() <= now)
        {
            let Some(mut item) = queue.pop_first() else {
                break;
            };
            if seen.insert(item.instance().id().clone()) {
                due.push(Arc::clone(item.instance()));
            }
            item.reschedule(now);
            debug!("popped measurement off queue and rescheduled: {item}");
            rescheduled.push(item);
        }
        queue.extend(rescheduled);
        due
    }

    /// Resolves after the next call to [`Self::schedule`].
    pub(crate) async fn scheduled(&self) {
        self.scheduled.notified().await;
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
