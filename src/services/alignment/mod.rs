// Word-level alignment of translated regions
//
// Source and translation are split on whitespace and paired position by
// position. Pairs are truncated to the shorter token list.

use tracing::{debug, instrument};

use crate::core::types::{AlignedWordRecord, Position, TranslatedRegion};

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAligner;

impl ResultAligner {
    pub fn new() -> Self {
        Self
    }

    /// Flatten regions into word records, in region order.
    #[instrument(skip(self, regions), fields(regions = regions.len()))]
    pub fn align(&self, regions: &[TranslatedRegion]) -> Vec<AlignedWordRecord> {
        let records: Vec<AlignedWordRecord> = regions.iter().flat_map(align_region).collect();
        debug!("Aligned {} words from {} regions", records.len(), regions.len());
        records
    }
}

fn align_region(translated: &TranslatedRegion) -> impl Iterator<Item = AlignedWordRecord> + '_ {
    let region = &translated.region;
    let top_left = region.bbox.top_left();
    let position = Position {
        x: top_left.x,
        y: top_left.y,
    };

    region
        .text
        .split_whitespace()
        .zip(translated.translation.split_whitespace())
        .map(move |(word, translation)| AlignedWordRecord {
            word: word.to_string(),
            context: region.text.clone(),
            translation: translation.to_string(),
            confidence: region.confidence,
            position,
        })
}
