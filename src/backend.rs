use std::time::Duration;

use image::{Rgba, RgbaImage};
use log::{debug, warn};
use tokio::sync::OnceCell;

use crate::{
    analysis::{denoise::Denoiser, ela::JpegRecompressor},
    error::{Result, SuspicionError},
};

const PROBE_ATTEMPTS: u32 = 3;
const PROBE_BACKOFF: Duration = Duration::from_millis(20);

/// Capabilities of the imaging back-end, probed once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend {
    pub nl_means: bool,
}

static BACKEND: OnceCell<Backend> = OnceCell::const_new();

/// Readiness gate awaited before every run.
///
/// The first caller probes the codecs; concurrent callers wait on the same
/// probe. A failed probe leaves the gate closed so a later call retries.
pub async fn ready() -> Result<&'static Backend> {
    BACKEND.get_or_try_init(probe).await
}

async fn probe() -> Result<Backend> {
    let mut delay = PROBE_BACKOFF;
    let mut last_error = String::new();

    for attempt in 1..=PROBE_ATTEMPTS {
        match tokio::task::spawn_blocking(probe_codec).await? {
            Ok(()) => {
                let backend = Backend {
                    nl_means: Denoiser::nl_means_available(),
                };
                debug!("Imaging backend ready: {backend:?}");
                return Ok(backend);
            }
            Err(err) => {
                warn!("Imaging backend probe {attempt}/{PROBE_ATTEMPTS} failed: {err}");
                last_error = err.to_string();
            }
        }

        if attempt < PROBE_ATTEMPTS {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(SuspicionError::BackendUnavailable(last_error))
}

fn probe_codec() -> Result<()> {
    let frame = RgbaImage::from_pixel(8, 8, Rgba([128, 128, 128, 255]));
    JpegRecompressor::default().recompress(&frame).map(|_| ())
}
