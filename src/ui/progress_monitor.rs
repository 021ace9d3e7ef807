// std imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// 3rd party imports
use anyhow::Result;
use indicatif::ProgressStyle;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{error, info_span, Instrument, Span};
use tracing_indicatif::span_ext::IndicatifSpanExt;

// local imports
use crate::orchestration::progress::ProgressCounter;

/// update interval for the progress bar in ms
///
const UPDATE_INTERVAL: u64 = 1000;

/// Progress bar style
///
const PROGRESS_BAR_STYLE: &str = "        {msg} {wide_bar} {pos}/{len} {per_sec} ";

/// Labels
const LABELS: [&str; 2] = ["Finished databases", "Failed databases"];

/// Creates a tracing span with progress bars for the screened databases
///
pub struct ProgressMonitor {
    thread_handle: Option<JoinHandle<()>>, // Wrapped in Option to be able to take it when await join
    stop_flag: Arc<AtomicBool>,
}

impl ProgressMonitor {
    /// Creates a progress view for the given counter
    ///
    /// # Arguments
    /// * `title` - Title of the progress bar
    /// * `progress` - Counter updated by the orchestrator
    /// * `update_interval_override` - Override for the update interval (default: [UPDATE_INTERVAL])
    ///
    pub fn new(
        title: &str,
        progress: Arc<ProgressCounter>,
        update_interval_override: Option<u64>,
    ) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let progress_span = info_span!("");
        progress_span.pb_set_message(title);
        let thread_handle = Some(tokio::spawn(
            Self::view(progress, stop_flag.clone(), update_interval_override)
                .instrument(progress_span),
        ));

        Self {
            thread_handle,
            stop_flag,
        }
    }

    async fn view(
        progress: Arc<ProgressCounter>,
        stop_flag: Arc<AtomicBool>,
        update_interval_override: Option<u64>,
    ) {
        let _ = Span::current().enter();
        let update_interval = update_interval_override.unwrap_or(UPDATE_INTERVAL);

        let style = match ProgressStyle::with_template(PROGRESS_BAR_STYLE) {
            Ok(style) => style,
            Err(err) => {
                error!("Invalid progress bar template: {}", err);
                return;
            }
        };
        let finished_span = info_span!("");
        finished_span.pb_set_message(LABELS[0]);
        finished_span.pb_set_style(&style);
        let failed_span = info_span!("");
        failed_span.pb_set_message(LABELS[1]);
        failed_span.pb_set_style(&style);

        loop {
            let next_deadline =
                tokio::time::Instant::now() + Duration::from_millis(update_interval);
            Self::update(&progress, &finished_span, &failed_span);
            // last update before leaving, so the bar shows the final state
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            tokio::time::sleep_until(next_deadline).await;
        }
    }

    fn update(progress: &ProgressCounter, finished_span: &Span, failed_span: &Span) {
        let total = progress.total() as u64;
        finished_span.pb_set_length(total);
        finished_span.pb_set_position(progress.finished() as u64);
        failed_span.pb_set_length(total);
        failed_span.pb_set_position(progress.failed() as u64);
    }

    /// Stops the progress bar
    ///
    pub async fn stop(&mut self) -> Result<()> {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            handle.await?
        }
        Ok(())
    }
}
