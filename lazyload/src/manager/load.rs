//! Fetch tasks and completion handling.

use std::sync::atomic::Ordering;

use super::Manager;
use crate::error::FetchError;
use crate::fetch::FetchedResource;
use crate::host::RenderState;
use crate::listener::FetchJob;

impl Manager {
    pub(super) fn spawn_fetches(&self, jobs: Vec<FetchJob>) {
        if jobs.is_empty() {
            return;
        }

        let mut tasks = self.shared.tasks.lock();
        tasks.retain(|handle| !handle.is_finished());

        for job in jobs {
            self.shared.fetches_started.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(listener = %job.id, source = %job.source, "Fetch started");

            let manager = self.clone();
            tasks.push(self.shared.runtime.spawn(async move {
                manager.run_fetch(job).await;
            }));
        }
    }

    /// Placeholder first (best effort), then the primary resource.
    async fn run_fetch(self, job: FetchJob) {
        match self.shared.fetcher.fetch(&job.placeholder).await {
            Ok(_) => self.placeholder_ready(&job),
            Err(e) => {
                if self.is_silent() {
                    tracing::debug!(placeholder = %job.placeholder, error = %e, "Placeholder failed to load");
                } else {
                    tracing::warn!(placeholder = %job.placeholder, error = %e, "Placeholder failed to load");
                }
            }
        }

        self.notify_before_load(&job);
        if !self.begin_primary(&job) {
            return;
        }

        let result = self.shared.fetcher.fetch(&job.source).await;
        self.finish_fetch(&job, result);
    }

    fn is_silent(&self) -> bool {
        self.shared.state.lock().config.silent
    }

    fn placeholder_ready(&self, job: &FetchJob) {
        let notice = {
            let state = self.shared.state.lock();
            state
                .position_of(job.id)
                .map(|idx| &state.listeners[idx])
                .filter(|listener| listener.accepts(job))
                .map(|listener| state.notice(listener, RenderState::Loading, false))
        };
        if let Some(notice) = notice {
            self.deliver(vec![notice]);
        }
    }

    /// Run the adapters' `before_load` hooks for a job that still applies.
    fn notify_before_load(&self, job: &FetchJob) {
        if self.shared.adapters.is_empty() {
            return;
        }
        let snapshot = {
            let state = self.shared.state.lock();
            state
                .position_of(job.id)
                .map(|idx| &state.listeners[idx])
                .filter(|listener| listener.accepts(job))
                .map(|listener| (listener.info(), state.config.clone()))
        };
        if let Some((info, config)) = snapshot {
            self.shared.adapters.before_load(&info, &config);
        }
    }

    /// Record the load start; `false` when the job has been orphaned.
    fn begin_primary(&self, job: &FetchJob) -> bool {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        match state.position_of(job.id) {
            Some(idx) if state.listeners[idx].accepts(job) => {
                state.listeners[idx].record_load_start(now);
                true
            }
            _ => {
                tracing::trace!(listener = %job.id, "Listener gone before primary fetch");
                false
            }
        }
    }

    /// Apply a fetch outcome if the listener still wants it.
    fn finish_fetch(&self, job: &FetchJob, result: Result<FetchedResource, FetchError>) {
        let now = self.shared.clock.now();
        let notice = {
            let mut guard = self.shared.state.lock();
            let state = &mut *guard;

            let Some(idx) = state
                .position_of(job.id)
                .filter(|&idx| state.listeners[idx].accepts(job))
            else {
                tracing::trace!(
                    listener = %job.id,
                    source = %job.source,
                    "Discarding late fetch completion"
                );
                return;
            };

            match result {
                Ok(resource) => {
                    state.listeners[idx].complete_success(now);
                    state.cache.add(&job.source);
                    tracing::debug!(
                        listener = %job.id,
                        source = %job.source,
                        bytes = resource.bytes.len(),
                        "Loaded"
                    );
                    state.notice(&state.listeners[idx], RenderState::Loaded, false)
                }
                Err(e) => {
                    let listener = &mut state.listeners[idx];
                    let next = listener.complete_failure();
                    let attempts = listener.attempt_count();
                    let max_attempts = listener.max_attempts();
                    if state.config.silent {
                        tracing::debug!(
                            listener = %job.id,
                            source = %job.source,
                            attempts,
                            max_attempts,
                            state = ?next,
                            error = %e,
                            "Fetch failed"
                        );
                    } else {
                        tracing::warn!(
                            listener = %job.id,
                            source = %job.source,
                            attempts,
                            max_attempts,
                            state = ?next,
                            error = %e,
                            "Fetch failed"
                        );
                    }
                    state.notice(&state.listeners[idx], RenderState::Error, false)
                }
            }
        };

        self.deliver(vec![notice]);
    }
}
