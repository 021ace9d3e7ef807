/// Progress bars for the screening
pub mod progress_monitor;
