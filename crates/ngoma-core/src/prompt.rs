//! Prompt palette and weighted-prompt state.
//!
//! The store owns the full prompt map for the life of the process. The
//! session controller only ever works from snapshots taken at submission
//! time, never from a live reference.

use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of palette entries that start with a non-zero weight.
const INITIAL_ACTIVE_PROMPTS: usize = 3;

/// MIDI CC indices are 7-bit, which bounds the palette size.
const MAX_PALETTE_LEN: usize = 128;

/// A palette entry: a timbre description plus a display color hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PalettePrompt {
    pub text: String,
    pub color: String,
}

impl PalettePrompt {
    pub fn new(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: color.into(),
        }
    }
}

/// A weighted prompt as submitted to the generative backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub prompt_id: String,
    pub text: String,
    pub weight: f64,
    pub cc: u8,
    pub color: String,
}

/// The full collection of prompts and their current weights.
///
/// A set where all weights are zero is valid and means "silence intent".
pub type WeightedPromptSet = HashMap<String, Prompt>;

/// Default orchestral palette, grouped by instrument family.
pub fn default_palette() -> Vec<PalettePrompt> {
    const ENTRIES: &[(&str, &str)] = &[
        // Strings (purples/blues)
        ("#d9b2ff", "Lyrical Violins"),
        ("#9900ff", "Staccato Violas"),
        ("#5200ff", "Warm Cellos"),
        ("#3f00a1", "Deep Double Bass"),
        // Woodwinds (greens)
        ("#3dffab", "Soaring Flute"),
        ("#2af6de", "Mellow Clarinet"),
        ("#00b894", "Rich Oboe"),
        ("#00876c", "Playful Bassoon"),
        // Brass (yellows/oranges)
        ("#ffdd28", "Blaring Trumpets"),
        ("#feca57", "Majestic French Horns"),
        ("#ff9f43", "Powerful Trombones"),
        ("#e17055", "Rumbling Tuba"),
        // Percussion & other (reds/pinks/white)
        ("#d63031", "Rolling Timpani"),
        ("#ff7675", "Crisp Snare Drum"),
        ("#ff25f6", "Plucking Harp"),
        ("#E0E0E0", "Angelic Choir"),
    ];

    ENTRIES
        .iter()
        .map(|(color, text)| PalettePrompt::new(*text, *color))
        .collect()
}

/// Build the startup prompt set from a palette.
///
/// A uniformly shuffled copy of the palette picks which `min(3, N)` entries
/// start at weight 1; ids and CC assignments follow the original palette
/// order so they are stable across runs regardless of the draw.
pub fn build_initial_prompts<R: Rng + ?Sized>(
    palette: &[PalettePrompt],
    rng: &mut R,
) -> Result<WeightedPromptSet> {
    if palette.len() > MAX_PALETTE_LEN {
        return Err(Error::InvalidInput(format!(
            "Palette has {} entries, maximum is {}",
            palette.len(),
            MAX_PALETTE_LEN
        )));
    }

    let mut order: Vec<usize> = (0..palette.len()).collect();
    order.shuffle(rng);
    let active: HashSet<usize> = order
        .into_iter()
        .take(INITIAL_ACTIVE_PROMPTS)
        .collect();

    let mut prompts = WeightedPromptSet::with_capacity(palette.len());
    for (index, entry) in palette.iter().enumerate() {
        let prompt_id = format!("prompt-{index}");
        prompts.insert(
            prompt_id.clone(),
            Prompt {
                prompt_id,
                text: entry.text.clone(),
                weight: if active.contains(&index) { 1.0 } else { 0.0 },
                cc: index as u8,
                color: entry.color.clone(),
            },
        );
    }

    Ok(prompts)
}

/// Owns the weighted-prompt set and the initial-selection algorithm.
#[derive(Debug, Clone, Default)]
pub struct PromptStore {
    prompts: WeightedPromptSet,
}

impl PromptStore {
    pub fn new(prompts: WeightedPromptSet) -> Self {
        Self { prompts }
    }

    /// Build a store from a palette using the startup selection algorithm.
    pub fn from_palette<R: Rng + ?Sized>(palette: &[PalettePrompt], rng: &mut R) -> Result<Self> {
        Ok(Self {
            prompts: build_initial_prompts(palette, rng)?,
        })
    }

    /// Build a store from the default palette with a thread-local RNG.
    pub fn with_default_palette() -> Self {
        let palette = default_palette();
        Self {
            // The default palette is within the CC range, so this cannot fail.
            prompts: build_initial_prompts(&palette, &mut rand::thread_rng())
                .unwrap_or_default(),
        }
    }

    /// Update a prompt weight in place.
    ///
    /// Returns whether the stored value actually changed, so callers can
    /// skip redundant downstream updates. The set is left untouched when
    /// the id is unknown or the weight is negative.
    pub fn set_weight(&mut self, prompt_id: &str, weight: f64) -> Result<bool> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Weight for {prompt_id} must be a non-negative number, got {weight}"
            )));
        }
        let prompt = self
            .prompts
            .get_mut(prompt_id)
            .ok_or_else(|| Error::UnknownPrompt(prompt_id.to_string()))?;
        if prompt.weight == weight {
            return Ok(false);
        }
        prompt.weight = weight;
        Ok(true)
    }

    pub fn get(&self, prompt_id: &str) -> Option<&Prompt> {
        self.prompts.get(prompt_id)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// A read snapshot of the current set, taken at submission time.
    pub fn snapshot(&self) -> WeightedPromptSet {
        self.prompts.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn palette(n: usize) -> Vec<PalettePrompt> {
        (0..n)
            .map(|i| PalettePrompt::new(format!("Instrument {i}"), format!("#{i:06x}")))
            .collect()
    }

    #[test]
    fn initial_build_activates_exactly_three() {
        let palette = palette(16);
        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let prompts = build_initial_prompts(&palette, &mut rng).expect("build");
            assert_eq!(prompts.len(), 16);
            let active = prompts.values().filter(|p| p.weight == 1.0).count();
            assert_eq!(active, 3, "seed {seed}");
            assert!(prompts.values().all(|p| p.weight == 1.0 || p.weight == 0.0));
        }
    }

    #[test]
    fn cc_assignment_is_a_bijection_on_palette_index() {
        let palette = palette(16);
        let mut rng = StdRng::seed_from_u64(7);
        let prompts = build_initial_prompts(&palette, &mut rng).expect("build");

        let mut ccs: Vec<u8> = prompts.values().map(|p| p.cc).collect();
        ccs.sort_unstable();
        let expected: Vec<u8> = (0..16).collect();
        assert_eq!(ccs, expected);

        for (id, prompt) in &prompts {
            assert_eq!(id, &prompt.prompt_id);
            assert_eq!(format!("prompt-{}", prompt.cc), prompt.prompt_id);
            assert_eq!(prompt.text, format!("Instrument {}", prompt.cc));
        }
    }

    #[test]
    fn cc_assignment_ignores_the_random_draw() {
        let palette = palette(12);
        let mut a = StdRng::seed_from_u64(1);
        let mut b = StdRng::seed_from_u64(999);
        let first = build_initial_prompts(&palette, &mut a).expect("build");
        let second = build_initial_prompts(&palette, &mut b).expect("build");

        for (id, prompt) in &first {
            let other = second.get(id).expect("same ids across draws");
            assert_eq!(prompt.cc, other.cc);
            assert_eq!(prompt.text, other.text);
            assert_eq!(prompt.color, other.color);
        }
    }

    #[test]
    fn small_palettes_activate_everything() {
        for n in 0..3 {
            let palette = palette(n);
            let mut rng = StdRng::seed_from_u64(3);
            let prompts = build_initial_prompts(&palette, &mut rng).expect("build");
            assert_eq!(prompts.len(), n);
            assert!(prompts.values().all(|p| p.weight == 1.0));
        }
    }

    #[test]
    fn oversized_palette_is_rejected() {
        let palette = palette(129);
        let mut rng = StdRng::seed_from_u64(0);
        let err = build_initial_prompts(&palette, &mut rng).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn set_weight_on_unknown_id_leaves_store_untouched() {
        let mut store =
            PromptStore::from_palette(&palette(4), &mut StdRng::seed_from_u64(5)).expect("store");
        let before = store.snapshot();

        let err = store.set_weight("prompt-99", 0.5).unwrap_err();
        assert!(matches!(err, Error::UnknownPrompt(_)));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn set_weight_rejects_negative_values() {
        let mut store =
            PromptStore::from_palette(&palette(4), &mut StdRng::seed_from_u64(5)).expect("store");
        let err = store.set_weight("prompt-0", -0.1).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn repeated_identical_writes_report_no_change() {
        let mut store =
            PromptStore::from_palette(&palette(4), &mut StdRng::seed_from_u64(5)).expect("store");

        assert!(store.set_weight("prompt-1", 0.7).expect("set"));
        assert!(!store.set_weight("prompt-1", 0.7).expect("set again"));
        assert_eq!(store.get("prompt-1").expect("present").weight, 0.7);
    }

    #[test]
    fn four_entry_palette_end_to_end() {
        let palette = vec![
            PalettePrompt::new("A", "#111111"),
            PalettePrompt::new("B", "#222222"),
            PalettePrompt::new("C", "#333333"),
            PalettePrompt::new("D", "#444444"),
        ];
        let mut store =
            PromptStore::from_palette(&palette, &mut StdRng::seed_from_u64(11)).expect("store");

        let total: f64 = store.snapshot().values().map(|p| p.weight).sum();
        assert_eq!(total, 3.0);

        let before = store.snapshot();
        store.set_weight("prompt-0", 0.5).expect("set");
        let after = store.snapshot();
        assert_eq!(after.get("prompt-0").expect("p0").weight, 0.5);
        for id in ["prompt-1", "prompt-2", "prompt-3"] {
            assert_eq!(after.get(id), before.get(id), "{id} should be untouched");
        }
    }

    #[test]
    fn default_palette_covers_four_families() {
        let palette = default_palette();
        assert_eq!(palette.len(), 16);
        assert!(palette.iter().any(|p| p.text == "Warm Cellos"));
        assert!(palette.iter().any(|p| p.text == "Angelic Choir"));
    }

    #[test]
    fn prompt_serializes_with_camel_case_keys() {
        let prompt = Prompt {
            prompt_id: "prompt-0".to_string(),
            text: "Warm Cellos".to_string(),
            weight: 1.0,
            cc: 0,
            color: "#5200ff".to_string(),
        };
        let json = serde_json::to_value(&prompt).expect("serialize");
        assert_eq!(json["promptId"], "prompt-0");
        assert_eq!(json["cc"], 0);
    }
}
