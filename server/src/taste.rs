//! Taste-profile arithmetic: turns top artists/tracks into a compact vector
//! and maps the vector onto prompt words and canvas parameters. Everything in
//! here is pure and seed-stable so the same listener gets the same art.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::spotify::{Artist, Track};

/// Styles the generate endpoint accepts; anything else falls back to the first
pub const THEMES: &[&str] = &[
    "oil painting",
    "watercolor",
    "neon cyberpunk",
    "ghibli",
    "vaporwave",
    "pixel art",
    "low-poly 3d",
    "origami paper",
    "charcoal sketch",
    "ink wash",
    "stained glass",
    "clay stop-motion",
    "ukiyo-e",
    "synthwave",
    "bauhaus minimal",
    "steampunk",
];

const GEOMETRIES: &[&str] = &["lines", "blobs", "polys", "nebula"];

/// Map an untrusted theme name onto a known theme
pub fn normalize_theme(name: &str) -> &'static str {
    let wanted = name.trim().to_lowercase();
    THEMES
        .iter()
        .find(|theme| **theme == wanted)
        .copied()
        .unwrap_or(THEMES[0])
}

/// Collapse Spotify's fine-grained genre labels into broader buckets
fn bucket_genre(genre: &str) -> String {
    match genre.to_lowercase().as_str() {
        "dream pop" | "shoegaze" => "dream-pop".to_string(),
        "indie rock" | "folk" => "indie".to_string(),
        "house" | "techno" => "electronic".to_string(),
        other => other.to_string(),
    }
}

/// Four-color palette for a genre bucket
pub fn palette_for(genre: &str) -> &'static [&'static str; 4] {
    match genre {
        "dream-pop" => &["#f8e1f4", "#c9d6ff", "#b8c6db", "#fdfbfb"],
        "electronic" => &["#0d0d0d", "#2a2a72", "#009ffd", "#2a9d8f"],
        "indie" => &["#264653", "#e9c46a", "#2a9d8f", "#f4a261"],
        "classical" => &["#eae2b7", "#003049", "#d62828", "#f77f00"],
        "jazz" => &["#001219", "#005f73", "#0a9396", "#94d2bd"],
        "metal" => &["#111111", "#444444", "#dddddd", "#e63946"],
        _ => &["#101010", "#444444", "#999999", "#f1faee"],
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DurationStats {
    pub mean: f64,
    pub std: f64,
}

/// A listener's taste, compressed to what the art mapping needs. Counts live
/// in ordered maps so every derivation from them is deterministic.
#[derive(Debug, Clone)]
pub struct TasteVector {
    pub genre_counts: BTreeMap<String, u32>,
    pub popularity_avg: f64,
    pub explicit_ratio: f64,
    pub duration_ms: DurationStats,
    pub eras: BTreeMap<String, u32>,
}

/// Aggregate top artists and tracks into a taste vector
pub fn build_taste_vector(artists: &[Artist], tracks: &[Track]) -> TasteVector {
    let mut genre_counts: BTreeMap<String, u32> = BTreeMap::new();
    for artist in artists {
        for genre in &artist.genres {
            *genre_counts.entry(bucket_genre(genre)).or_insert(0) += 1;
        }
    }

    let pops: Vec<f64> = artists
        .iter()
        .filter_map(|a| a.popularity)
        .chain(tracks.iter().filter_map(|t| t.popularity))
        .map(f64::from)
        .collect();
    let popularity_avg = if pops.is_empty() {
        50.0
    } else {
        pops.iter().sum::<f64>() / pops.len() as f64
    };

    let mut eras: BTreeMap<String, u32> = BTreeMap::new();
    let mut explicit = 0usize;
    let mut durations: Vec<f64> = Vec::new();
    for track in tracks {
        if track.explicit {
            explicit += 1;
        }
        if let Some(ms) = track.duration_ms {
            durations.push(ms as f64);
        }
        if let Some(era) = era_of(&track.album.release_date) {
            *eras.entry(era).or_insert(0) += 1;
        }
    }

    let explicit_ratio = if tracks.is_empty() {
        0.0
    } else {
        explicit as f64 / tracks.len() as f64
    };

    let mean = if durations.is_empty() {
        180_000.0
    } else {
        durations.iter().sum::<f64>() / durations.len() as f64
    };
    let std = if durations.is_empty() {
        0.0
    } else {
        (durations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / durations.len() as f64)
            .sqrt()
    };

    TasteVector {
        genre_counts,
        popularity_avg,
        explicit_ratio,
        duration_ms: DurationStats { mean, std },
        eras,
    }
}

/// Decade bucket ("1990s") from an album release date like "1994-06-21"
fn era_of(release_date: &str) -> Option<String> {
    let year = release_date.get(..4)?;
    if year.len() == 4 && year.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{}0s", &year[..3]))
    } else {
        None
    }
}

/// Normalized Shannon entropy of a count distribution, capped at 1.0
pub fn entropy(counts: &[u32]) -> f64 {
    let total: u32 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = f64::from(total);

    let mut h = 0.0;
    for &count in counts {
        if count > 0 {
            let p = f64::from(count) / total;
            h -= p * (p + 1e-12).log2();
        }
    }
    (h / 5.0).min(1.0)
}

/// Stable 32-bit seed for a string, so art parameters survive restarts
pub fn stable_seed(s: &str) -> u32 {
    let digest = Sha256::digest(s.as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Small deterministic xorshift generator; `rand` stays reserved for
/// cryptographic material, this one exists to be replayable from a seed
pub struct StableRng(u64);

impl StableRng {
    pub fn new(seed: u32) -> Self {
        // Widen and force nonzero; xorshift sticks at zero forever
        Self((u64::from(seed) << 1) | 1)
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform value in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    pub fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    pub fn choice<'a>(&mut self, options: &[&'a str]) -> &'a str {
        let index = ((self.next_f64() * options.len() as f64) as usize).min(options.len() - 1);
        options[index]
    }
}

/// Pick a key with probability proportional to its count
fn weighted_choice(counts: &BTreeMap<String, u32>, rng: &mut StableRng) -> Option<String> {
    let total: u32 = counts.values().sum();
    if total == 0 {
        return None;
    }

    let r = rng.uniform(0.0, f64::from(total));
    let mut acc = 0.0;
    for (key, count) in counts {
        acc += f64::from(*count);
        if r <= acc {
            return Some(key.clone());
        }
    }
    counts.keys().next_back().cloned()
}

pub fn popularity_word(popularity_avg: f64) -> &'static str {
    if popularity_avg >= 60.0 {
        "mainstream"
    } else {
        "indie"
    }
}

/// The three prompt words: a genre, a popularity word, and an era
pub fn three_words(taste: &TasteVector, rng: &mut StableRng) -> (String, String, String) {
    let genre = weighted_choice(&taste.genre_counts, rng)
        .map(|g| g.replace('-', " "))
        .unwrap_or_else(|| "abstract".to_string());
    let era = weighted_choice(&taste.eras, rng).unwrap_or_else(|| "2000s".to_string());
    let pop = popularity_word(taste.popularity_avg).to_string();

    (genre, pop, era)
}

/// Parameters the browser canvas renders from; field names are the JS contract
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualParams {
    pub seed: String,
    pub palette: Vec<String>,
    pub density: f64,
    pub blur: f64,
    pub motion: f64,
    pub geometry_bias: String,
    pub symmetry: f64,
    pub noise_scale: f64,
}

/// Map a taste vector onto canvas parameters. `fingerprint` identifies the
/// listener without exposing anything (a one-way hash upstream), and seeds
/// the generator together with the dominant genre and era.
pub fn map_to_visuals(taste: &TasteVector, fingerprint: &str) -> VisualParams {
    let top_genre = dominant(&taste.genre_counts).unwrap_or("default");
    let era = dominant(&taste.eras).unwrap_or("2000s");

    let seed = format!("{fingerprint}|{top_genre}|{era}");
    let mut rng = StableRng::new(stable_seed(&seed));

    let density = (0.2 + (100.0 - taste.popularity_avg) / 100.0 * 0.8).clamp(0.2, 1.0);
    let counts: Vec<u32> = taste.genre_counts.values().copied().collect();
    let symmetry = (1.0 - entropy(&counts)).clamp(0.0, 1.0);

    VisualParams {
        palette: palette_for(top_genre).iter().map(|c| c.to_string()).collect(),
        density,
        blur: (0.1 + taste.explicit_ratio * 0.5).min(0.7),
        motion: rng.uniform(0.3, 1.0),
        geometry_bias: rng.choice(GEOMETRIES).to_string(),
        symmetry,
        noise_scale: rng.uniform(0.2, 0.8),
        seed,
    }
}

/// Key with the highest count; ties break toward the lexically first key
fn dominant(counts: &BTreeMap<String, u32>) -> Option<&str> {
    let mut best: Option<(&str, u32)> = None;
    for (key, &count) in counts {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}
