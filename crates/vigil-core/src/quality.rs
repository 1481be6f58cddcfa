//! Frame quality gate: dark-surroundings and low-texture checks.
//!
//! A frame that is too dark or has almost no high-frequency detail (a blurred
//! print or a screen held too close) cannot be trusted for liveness, so such
//! frames are treated like frames without a face.

/// Thresholds for [`assess`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityConfig {
    /// Disable to let every frame through.
    pub enabled: bool,
    /// Mean luma (0–255) below which the scene is considered dark.
    pub min_mean_luma: f32,
    /// Variance of the Laplacian below which the frame is considered blurry.
    pub min_sharpness: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_mean_luma: 40.0,
            min_sharpness: 25.0,
        }
    }
}

/// Quality measurements for one grayscale frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameQuality {
    pub mean_luma: f32,
    /// Variance of the 4-neighbour Laplacian response.
    pub sharpness: f32,
    pub dark: bool,
    pub blurry: bool,
}

impl FrameQuality {
    /// Quality for frames that bypass the gate.
    pub fn unchecked() -> Self {
        Self {
            mean_luma: 0.0,
            sharpness: 0.0,
            dark: false,
            blurry: false,
        }
    }

    pub fn acceptable(&self) -> bool {
        !self.dark && !self.blurry
    }
}

/// Measure a grayscale frame against `config`.
///
/// With the gate disabled the measurements are skipped and the frame is
/// always acceptable.
pub fn assess(gray: &[u8], width: u32, height: u32, config: &QualityConfig) -> FrameQuality {
    if !config.enabled {
        return FrameQuality::unchecked();
    }

    let mean_luma = mean_luma(gray);
    let sharpness = laplacian_variance(gray, width as usize, height as usize);

    FrameQuality {
        mean_luma,
        sharpness,
        dark: mean_luma < config.min_mean_luma,
        blurry: sharpness < config.min_sharpness,
    }
}

/// Average pixel value (0.0–255.0).
pub fn mean_luma(gray: &[u8]) -> f32 {
    if gray.is_empty() {
        return 0.0;
    }
    gray.iter().map(|&b| b as f32).sum::<f32>() / gray.len() as f32
}

/// Variance of the Laplacian over the frame interior.
///
/// Kernel `[0 1 0; 1 -4 1; 0 1 0]`. Frames smaller than 3×3 (or with a short
/// buffer) report zero.
pub fn laplacian_variance(gray: &[u8], width: usize, height: usize) -> f32 {
    if width < 3 || height < 3 || gray.len() < width * height {
        return 0.0;
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut n = 0usize;

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let c = gray[y * width + x] as f64;
            let lap = gray[(y - 1) * width + x] as f64
                + gray[(y + 1) * width + x] as f64
                + gray[y * width + x - 1] as f64
                + gray[y * width + x + 1] as f64
                - 4.0 * c;
            sum += lap;
            sum_sq += lap * lap;
            n += 1;
        }
    }

    let mean = sum / n as f64;
    (sum_sq / n as f64 - mean * mean).max(0.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(w: usize, h: usize, lo: u8, hi: u8) -> Vec<u8> {
        (0..w * h)
            .map(|i| if ((i % w) + (i / w)) % 2 == 0 { lo } else { hi })
            .collect()
    }

    #[test]
    fn test_uniform_frame_is_blurry() {
        let gray = vec![128u8; 32 * 32];
        let q = assess(&gray, 32, 32, &QualityConfig::default());
        assert_eq!(q.sharpness, 0.0);
        assert!(q.blurry);
        assert!(!q.dark);
        assert!(!q.acceptable());
    }

    #[test]
    fn test_dark_frame_flagged() {
        let gray = checkerboard(32, 32, 0, 30);
        let q = assess(&gray, 32, 32, &QualityConfig::default());
        assert!(q.mean_luma < 40.0, "mean = {}", q.mean_luma);
        assert!(q.dark);
    }

    #[test]
    fn test_textured_bright_frame_acceptable() {
        let gray = checkerboard(32, 32, 60, 200);
        let q = assess(&gray, 32, 32, &QualityConfig::default());
        assert!(q.sharpness > 25.0, "sharpness = {}", q.sharpness);
        assert!(q.acceptable());
    }

    #[test]
    fn test_disabled_gate_accepts_everything() {
        let gray = vec![0u8; 16];
        let config = QualityConfig {
            enabled: false,
            ..QualityConfig::default()
        };
        assert!(assess(&gray, 4, 4, &config).acceptable());
    }

    #[test]
    fn test_laplacian_tiny_frame() {
        assert_eq!(laplacian_variance(&[1, 2, 3, 4], 2, 2), 0.0);
        assert_eq!(laplacian_variance(&[], 10, 10), 0.0);
    }

    #[test]
    fn test_mean_luma_empty() {
        assert_eq!(mean_luma(&[]), 0.0);
    }
}
