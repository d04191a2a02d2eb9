use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage, Luma};
use tokio::{process::Command, time::Instant};

use crate::settings::{AppSettings, OcrSettings, Region, OUTPUT_PLACEHOLDER};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Screen region to recognised text. Implementations may block or time out; callers treat
/// every error as a failed cycle.
#[async_trait]
pub trait TextSource: Send + Sync {
    async fn recognize(&self, region: &Region) -> Result<String>;
}

/// Screenshot through an external command, crop with `image`, OCR with the tesseract CLI.
///
/// Child processes are killed when a capture times out.
#[derive(Debug, Clone)]
pub struct CommandCapture {
    command: Vec<String>,
    ocr: OcrSettings,
    timeout: Duration,
    work_dir: PathBuf,
}

impl CommandCapture {
    pub fn new(settings: &AppSettings, work_dir: PathBuf) -> Self {
        Self {
            command: settings.capture_command.clone(),
            ocr: settings.ocr.clone(),
            timeout: Duration::from_secs(settings.capture_timeout_secs.max(1)),
            work_dir,
        }
    }
}

#[async_trait]
impl TextSource for CommandCapture {
    async fn recognize(&self, region: &Region) -> Result<String> {
        let started = Instant::now();

        let text = match tokio::time::timeout(self.timeout, self.capture(*region)).await {
            Ok(result) => result?,
            Err(_) => bail!("capture timed out after {}s", self.timeout.as_secs()),
        };

        log_debug!(
            "captured {} chars of OCR text in {}ms",
            text.chars().count(),
            started.elapsed().as_millis()
        );
        Ok(text)
    }
}

impl CommandCapture {
    async fn capture(&self, region: Region) -> Result<String> {
        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| {
                format!("failed to create capture directory {}", self.work_dir.display())
            })?;

        let screenshot = TempFile::new(&self.work_dir, "screen");
        self.take_screenshot(screenshot.path()).await?;

        let crop = TempFile::new(&self.work_dir, "crop");
        let screenshot_path = screenshot.path().to_path_buf();
        let crop_path = crop.path().to_path_buf();
        let ocr = self.ocr.clone();
        tokio::task::spawn_blocking(move || {
            write_crop(&screenshot_path, &crop_path, &region, &ocr)
        })
        .await
        .context("crop worker join failed")??;

        run_tesseract(crop.path(), &self.ocr).await
    }

    async fn take_screenshot(&self, output: &Path) -> Result<()> {
        let output_str = output.to_string_lossy();
        let mut args = self
            .command
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, &output_str));
        let program = args.next().ok_or_else(|| anyhow!("capture command is empty"))?;

        let result = Command::new(&program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run capture command {program}"))?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!("capture command {program} failed ({}): {}", result.status, stderr.trim());
        }
        if !output.exists() {
            bail!("capture command {program} did not write {}", output.display());
        }
        Ok(())
    }
}

fn write_crop(screenshot: &Path, crop: &Path, region: &Region, ocr: &OcrSettings) -> Result<()> {
    let frame = image::open(screenshot)
        .with_context(|| format!("failed to load screenshot {}", screenshot.display()))?;
    let mut cropped = crop_region(&frame, region)?;
    if ocr.preprocess {
        cropped = DynamicImage::ImageLuma8(preprocess(&cropped, ocr.scale, ocr.threshold));
    }
    cropped
        .save(crop)
        .with_context(|| format!("failed to write crop {}", crop.display()))
}

/// OCR a still image as-is.
pub async fn ocr_image_file(path: &Path, ocr: &OcrSettings) -> Result<String> {
    if !path.exists() {
        bail!("image {} does not exist", path.display());
    }
    run_tesseract(path, ocr).await
}

async fn run_tesseract(image_path: &Path, ocr: &OcrSettings) -> Result<String> {
    let mut command = Command::new(&ocr.tesseract_path);
    command
        .arg(image_path)
        .arg("stdout")
        .arg("-l")
        .arg(&ocr.lang)
        .arg("--psm")
        .arg(ocr.psm.to_string())
        .kill_on_drop(true);
    if let Some(oem) = ocr.oem {
        command.arg("--oem").arg(oem.to_string());
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("failed to invoke {}", ocr.tesseract_path))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("tesseract failed ({}): {}", output.status, stderr.trim());
    }

    String::from_utf8(output.stdout).context("tesseract produced non-UTF-8 output")
}

pub fn crop_region(frame: &DynamicImage, region: &Region) -> Result<DynamicImage> {
    let (width, height) = frame.dimensions();
    let fits_x = region.x.checked_add(region.width).is_some_and(|end| end <= width);
    let fits_y = region.y.checked_add(region.height).is_some_and(|end| end <= height);
    if !fits_x || !fits_y {
        bail!("capture region {region} lies outside the {width}x{height} screenshot");
    }
    Ok(frame.crop_imm(region.x, region.y, region.width, region.height))
}

/// Grayscale, upscale, and optionally binarize.
pub fn preprocess(image: &DynamicImage, scale: f32, threshold: Option<u8>) -> GrayImage {
    let mut gray = image.to_luma8();

    if scale > 0.0 && (scale - 1.0).abs() > f32::EPSILON {
        let width = ((gray.width() as f32 * scale) as u32).max(1);
        let height = ((gray.height() as f32 * scale) as u32).max(1);
        gray = image::imageops::resize(&gray, width, height, FilterType::Triangle);
    }

    if let Some(cutoff) = threshold {
        for pixel in gray.pixels_mut() {
            *pixel = Luma([if pixel[0] >= cutoff { 255 } else { 0 }]);
        }
    }

    gray
}

/// Scratch PNG removed on drop.
struct TempFile {
    path: PathBuf,
}

impl TempFile {
    fn new(dir: &Path, stem: &str) -> Self {
        Self {
            path: dir.join(format!("{stem}-{}.png", uuid::Uuid::new_v4())),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
