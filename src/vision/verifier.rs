use super::fuzzy::{fuzzy_match, MatchResult};
use super::region::Region;
use crate::desktop::ocr::OcrEngine;
use crate::error::Result;

/// How many accent-colored regions an on-screen check considers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// The whole accent-colored area is one block of text
    Single,
    /// Each connected accent-colored blob is read separately and the best wins
    Multi,
}

/// OCR plus fuzzy comparison against an expected string
pub struct TextVerifier {
    engine: Box<dyn OcrEngine>,
}

impl TextVerifier {
    pub fn new(engine: Box<dyn OcrEngine>) -> Self {
        Self { engine }
    }

    pub fn recognize(&self, region: &Region) -> Result<String> {
        let text = self.engine.recognize(region.image())?;
        Ok(text.trim().to_string())
    }

    /// Text of each region, in input order
    pub fn recognize_many<'r>(&self, regions: &'r [Region]) -> Result<Vec<(&'r Region, String)>> {
        regions
            .iter()
            .map(|r| Ok((r, self.recognize(r)?)))
            .collect()
    }

    /// Read `region` and compare it to `target`
    pub fn verify(&self, region: &Region, target: &str, threshold: f64) -> Result<MatchResult> {
        let text = self.recognize(region)?;
        Ok(fuzzy_match(&text, target, threshold))
    }

    /// Best match among `regions`. Stops reading at the first perfect score.
    /// `None` only when `regions` is empty.
    pub fn best_of(&self, regions: &[Region], target: &str, threshold: f64) -> Result<Option<MatchResult>> {
        let mut best: Option<MatchResult> = None;
        for region in regions {
            let candidate = self.verify(region, target, threshold)?;
            tracing::debug!(
                "OCR candidate `{}` scored {:.1} against `{}`",
                candidate.observed_text,
                candidate.confidence,
                target
            );
            let perfect = candidate.confidence >= 100.0;
            if best.as_ref().map_or(true, |b| candidate.confidence > b.confidence) {
                best = Some(candidate);
            }
            if perfect {
                break;
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use image::{Rgba, RgbaImage};

    use super::*;

    /// Reads the red channel of the top-left pixel as an index into `texts`
    struct IndexedOcr {
        texts: Vec<&'static str>,
        calls: Rc<Cell<usize>>,
    }

    impl OcrEngine for IndexedOcr {
        fn recognize(&self, image: &RgbaImage) -> anyhow::Result<String> {
            self.calls.set(self.calls.get() + 1);
            let idx = image.get_pixel(0, 0).0[0] as usize;
            Ok(self.texts[idx].to_string())
        }
    }

    fn tagged(idx: u8) -> Region {
        Region::synthetic(RgbaImage::from_pixel(2, 2, Rgba([idx, 0, 0, 255])))
    }

    #[test]
    fn test_best_of_picks_highest_confidence() {
        let verifier = TextVerifier::new(Box::new(IndexedOcr {
            texts: vec!["Balance Sheet", "Sales by Itm", "Payroll"],
            calls: Rc::default(),
        }));
        let regions = [tagged(0), tagged(1), tagged(2)];
        let best = verifier.best_of(&regions, "Sales by Item", 90.0).unwrap().unwrap();
        assert_eq!(best.observed_text, "Sales by Itm");
        assert!(best.matched);
    }

    #[test]
    fn test_best_of_stops_at_perfect_match() {
        let calls = Rc::new(Cell::new(0));
        let verifier = TextVerifier::new(Box::new(IndexedOcr {
            texts: vec!["Payroll", "Sales by Item", "Sales by Item"],
            calls: Rc::clone(&calls),
        }));
        let regions = [tagged(0), tagged(1), tagged(2)];
        let best = verifier.best_of(&regions, "Sales by Item", 90.0).unwrap().unwrap();
        assert_eq!(best.confidence, 100.0);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_best_of_empty() {
        let verifier = TextVerifier::new(Box::new(IndexedOcr {
            texts: vec![],
            calls: Rc::default(),
        }));
        assert!(verifier.best_of(&[], "x", 50.0).unwrap().is_none());
    }
}
