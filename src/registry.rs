//! Codec registry: the closed set of available encoders, their metadata and
//! their invocation. Options are a tagged enum so a selection can never pair
//! one encoder's options with another encoder.

use std::io::Cursor;
use std::num::NonZeroU8;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use oxipng::{Deflaters, Interlacing, Options};

use crate::error::{PipelineError, Result};
use crate::pixel::PixelData;

pub const DEFAULT_JPEG_QUALITY: u8 = 75;
pub const DEFAULT_PNG_LEVEL: u8 = 2;
pub const DEFAULT_AVIF_QUALITY: u8 = 50;
pub const DEFAULT_AVIF_SPEED: u8 = 6;
pub const ZOPFLI_ITERATIONS: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderType {
    MozJpeg,
    OxiPng,
    WebP,
    Avif,
}

impl EncoderType {
    pub fn all() -> &'static [EncoderType] {
        &[
            EncoderType::MozJpeg,
            EncoderType::OxiPng,
            EncoderType::WebP,
            EncoderType::Avif,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            EncoderType::MozJpeg => "MozJPEG",
            EncoderType::OxiPng => "OxiPNG",
            EncoderType::WebP => "WebP",
            EncoderType::Avif => "AVIF",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            EncoderType::MozJpeg => "image/jpeg",
            EncoderType::OxiPng => "image/png",
            EncoderType::WebP => "image/webp",
            EncoderType::Avif => "image/avif",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            EncoderType::MozJpeg => "jpg",
            EncoderType::OxiPng => "png",
            EncoderType::WebP => "webp",
            EncoderType::Avif => "avif",
        }
    }

    pub fn default_options(&self) -> EncoderOptions {
        match self {
            EncoderType::MozJpeg => EncoderOptions::MozJpeg(JpegOptions::default()),
            EncoderType::OxiPng => EncoderOptions::OxiPng(PngOptions::default()),
            EncoderType::WebP => EncoderOptions::WebP(WebPOptions::default()),
            EncoderType::Avif => EncoderOptions::Avif(AvifOptions::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegOptions {
    /// 1..=100
    pub quality: u8,
}

impl Default for JpegOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PngOptions {
    /// oxipng preset, 0..=6. Higher is slower and smaller; a high preset
    /// additionally switches the deflater to Zopfli.
    pub level: u8,
    pub interlace: bool,
}

impl Default for PngOptions {
    fn default() -> Self {
        Self {
            level: DEFAULT_PNG_LEVEL,
            interlace: false,
        }
    }
}

/// The bundled WebP codec is lossless-only, so there is no quality knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WebPOptions {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvifOptions {
    /// 1..=100
    pub quality: u8,
    /// 1..=10, higher is faster
    pub speed: u8,
}

impl Default for AvifOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_AVIF_QUALITY,
            speed: DEFAULT_AVIF_SPEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderOptions {
    MozJpeg(JpegOptions),
    OxiPng(PngOptions),
    WebP(WebPOptions),
    Avif(AvifOptions),
}

impl EncoderOptions {
    pub fn matches(&self, encoder: EncoderType) -> bool {
        matches!(
            (self, encoder),
            (EncoderOptions::MozJpeg(_), EncoderType::MozJpeg)
                | (EncoderOptions::OxiPng(_), EncoderType::OxiPng)
                | (EncoderOptions::WebP(_), EncoderType::WebP)
                | (EncoderOptions::Avif(_), EncoderType::Avif)
        )
    }
}

/// An encoder choice plus its options. The pairing invariant is enforced at
/// construction and on every mutation: switching encoder resets the options
/// to that encoder's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSelection {
    encoder: EncoderType,
    options: EncoderOptions,
}

impl EncoderSelection {
    pub fn new(encoder: EncoderType) -> Self {
        Self {
            encoder,
            options: encoder.default_options(),
        }
    }

    pub fn with_options(encoder: EncoderType, options: EncoderOptions) -> Result<Self> {
        if !options.matches(encoder) {
            return Err(PipelineError::Encode(format!(
                "options do not match encoder {}",
                encoder.label()
            )));
        }
        Ok(Self { encoder, options })
    }

    pub fn encoder(&self) -> EncoderType {
        self.encoder
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn set_encoder(&mut self, encoder: EncoderType) {
        if self.encoder != encoder {
            self.encoder = encoder;
            self.options = encoder.default_options();
        }
    }

    pub fn set_options(&mut self, options: EncoderOptions) -> Result<()> {
        if !options.matches(self.encoder) {
            return Err(PipelineError::Encode(format!(
                "options do not match encoder {}",
                self.encoder.label()
            )));
        }
        self.options = options;
        Ok(())
    }
}

impl Default for EncoderSelection {
    fn default() -> Self {
        Self::new(EncoderType::MozJpeg)
    }
}

/// Runs the codec for `options` over the pixel buffer. Synchronous; the
/// encode dispatcher wraps this between cancellation checks.
pub fn encode_pixels(pixels: &PixelData, options: &EncoderOptions) -> Result<Vec<u8>> {
    match options {
        EncoderOptions::MozJpeg(opts) => encode_jpeg(pixels, opts),
        EncoderOptions::OxiPng(opts) => encode_png(pixels, opts),
        EncoderOptions::WebP(_) => encode_webp(pixels),
        EncoderOptions::Avif(opts) => encode_avif(pixels, opts),
    }
}

fn encode_jpeg(pixels: &PixelData, opts: &JpegOptions) -> Result<Vec<u8>> {
    // JPEG has no alpha channel; flatten to RGB first.
    let rgb = DynamicImage::ImageRgba8(pixels.to_rgba_image()).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buf, opts.quality)
        .write_image(
            rgb.as_raw(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn encode_png(pixels: &PixelData, opts: &PngOptions) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    PngEncoder::new(&mut buf)
        .write_image(
            pixels.data(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| PipelineError::Encode(e.to_string()))?;

    let mut oxipng_options = Options::from_preset(opts.level.min(6));
    if opts.interlace {
        oxipng_options.interlace = Some(Interlacing::Adam7);
    }
    if opts.level >= 6 {
        oxipng_options.deflate = Deflaters::Zopfli {
            iterations: NonZeroU8::new(ZOPFLI_ITERATIONS).unwrap(),
        };
    }

    oxipng::optimize_from_memory(buf.get_ref(), &oxipng_options)
        .map_err(|e| PipelineError::Encode(e.to_string()))
}

fn encode_webp(pixels: &PixelData) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    WebPEncoder::new_lossless(&mut buf)
        .write_image(
            pixels.data(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn encode_avif(pixels: &PixelData, opts: &AvifOptions) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    AvifEncoder::new_with_speed_quality(&mut buf, opts.speed.clamp(1, 10), opts.quality)
        .write_image(
            pixels.data(),
            pixels.width(),
            pixels.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}
