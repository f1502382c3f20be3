#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the site lookup tools.
//!
//! Provides an `indicatif` [`Spinner`] shown while network lookups run,
//! `dialoguer` prompt helpers, and [`init_logger`] which sets up
//! `indicatif-log-bridge` so that `log::info!` and friends are suspended
//! while spinners redraw.

use std::future::Future;
use std::time::Duration;

use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// A spinner for one in-flight lookup.
pub struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    /// Adds a ticking spinner to `multi`.
    #[must_use]
    pub fn start(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }

    /// Replaces the spinner with a done line.
    pub fn succeed(&self) {
        let message = self.bar.message();
        self.bar.finish_with_message(format!("{message} ... done"));
    }

    /// Replaces the spinner with a failure line.
    pub fn fail(&self) {
        let message = self.bar.message();
        self.bar.finish_with_message(format!("{message} ... failed"));
    }

    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}

/// Awaits `future` behind a spinner, finishing it as done or failed to
/// match the result.
///
/// # Errors
///
/// Returns the future's error unchanged.
pub async fn with_spinner<T, E, F>(multi: &MultiProgress, message: &str, future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let spinner = Spinner::start(multi, message);
    let result = future.await;
    if result.is_ok() {
        spinner.succeed();
    } else {
        spinner.fail();
    }
    result
}

/// Prompts until a non-blank value is entered. `default` pre-fills the
/// answer.
///
/// # Errors
///
/// Returns a [`dialoguer::Error`] if the terminal cannot be read.
pub fn prompt_required(prompt: &str, default: Option<&str>) -> Result<String, dialoguer::Error> {
    let mut input = Input::<String>::new()
        .with_prompt(prompt)
        .validate_with(|value: &String| -> Result<(), &str> {
            if value.trim().is_empty() {
                Err("a value is required")
            } else {
                Ok(())
            }
        });
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    Ok(input.interact_text()?.trim().to_string())
}

/// Prompts for a value that may be left blank.
///
/// # Errors
///
/// Returns a [`dialoguer::Error`] if the terminal cannot be read.
pub fn prompt_optional(prompt: &str) -> Result<Option<String>, dialoguer::Error> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while spinners redraw.
///
/// Returns the [`MultiProgress`] that all spinners must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set in tests

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[tokio::test]
    async fn with_spinner_passes_result_through() {
        let multi = hidden();
        let ok: Result<u32, String> = with_spinner(&multi, "Looking up", async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> =
            with_spinner(&multi, "Looking up", async { Err("timed out".to_string()) }).await;
        assert_eq!(err, Err("timed out".to_string()));
    }

    #[test]
    fn spinner_finishes() {
        let spinner = Spinner::start(&hidden(), "Discovering");
        assert!(!spinner.is_finished());
        spinner.succeed();
        assert!(spinner.is_finished());
    }
}
