use anyhow::Result;
use image::RgbaImage;

/// Text recognition over a captured image
pub trait OcrEngine {
    /// Recognize all text in `image`. Lines are joined with spaces.
    fn recognize(&self, image: &RgbaImage) -> Result<String>;
}

/// Create the platform OCR engine for a BCP-47 language tag (e.g. "en")
pub fn create_engine(language: &str) -> Result<Box<dyn OcrEngine>> {
    #[cfg(target_os = "windows")]
    {
        Ok(Box::new(windows_ocr::WindowsOcr::new(language)?))
    }

    #[cfg(not(target_os = "windows"))]
    {
        Err(anyhow::anyhow!(
            "No OCR engine available on this platform (language `{}`)",
            language
        ))
    }
}

#[cfg(target_os = "windows")]
mod windows_ocr {
    use std::io::Cursor;

    use anyhow::{Context, Result};
    use image::{ImageFormat, RgbaImage};
    use windows::{
        core::HSTRING,
        Globalization::Language,
        Graphics::Imaging::BitmapDecoder,
        Media::Ocr::OcrEngine as WinOcrEngine,
        Storage::Streams::{DataWriter, InMemoryRandomAccessStream},
    };

    use super::OcrEngine;

    /// Windows.Media.Ocr backed recognizer
    pub struct WindowsOcr {
        engine: WinOcrEngine,
    }

    impl WindowsOcr {
        pub fn new(language: &str) -> Result<Self> {
            let language = Language::CreateLanguage(&HSTRING::from(language))
                .context("Failed to create language")?;
            let engine = WinOcrEngine::TryCreateFromLanguage(&language)
                .context("Failed to create OCR engine for language")?;
            Ok(Self { engine })
        }

        fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
            let mut bytes = Vec::new();
            image
                .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .context("Failed to encode capture as PNG")?;
            Ok(bytes)
        }
    }

    impl OcrEngine for WindowsOcr {
        fn recognize(&self, image: &RgbaImage) -> Result<String> {
            let png = Self::encode_png(image)?;

            let stream = InMemoryRandomAccessStream::new().context("Failed to create stream")?;
            let writer = DataWriter::CreateDataWriter(&stream).context("Failed to create writer")?;
            writer.WriteBytes(&png).context("Failed to write image bytes")?;
            writer
                .StoreAsync()
                .context("Failed to store async")?
                .get()
                .context("Failed to store data")?;
            writer.FlushAsync().context("Failed to flush")?.get()?;
            stream.Seek(0).context("Failed to seek")?;

            let decoder = BitmapDecoder::CreateAsync(&stream)
                .context("Failed to create decoder async")?
                .get()
                .context("Failed to get decoder")?;
            let bitmap = decoder
                .GetSoftwareBitmapAsync()
                .context("Failed to get bitmap async")?
                .get()
                .context("Failed to get software bitmap")?;

            let result = self
                .engine
                .RecognizeAsync(&bitmap)
                .context("Failed to recognize async")?
                .get()
                .context("Failed to get OCR result")?;

            Ok(result.Text().context("Failed to get text")?.to_string())
        }
    }
}
