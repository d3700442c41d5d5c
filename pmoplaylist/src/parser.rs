//! Analyse du texte d'une playlist en une suite de (métadonnées, chemin)

use crate::item::Metadata;
use crate::{Error, Result};

/// Types MIME reconnus par [`M3uParser`]
pub const M3U_MIME_TYPES: &[&str] = &[
    "audio/x-mpegurl",
    "audio/mpegurl",
    "application/x-mpegurl",
    "application/vnd.apple.mpegurl",
    "text/plain",
];

/// Analyseur de texte de playlist
pub trait PlaylistParser: Send + Sync {
    /// Analyse `text` ; `mime` à `None` signifie détection automatique
    fn parse(&self, mime: Option<&str>, text: &str) -> Result<Vec<(Metadata, String)>>;
}

/// Analyseur M3U / M3U étendu, accepte aussi les listes d'URI brutes
#[derive(Debug, Default, Clone, Copy)]
pub struct M3uParser;

impl M3uParser {
    pub fn new() -> Self {
        Self
    }
}

/// Lit `#EXTINF:<durée>,<titre>`
fn parse_extinf(line: &str) -> Metadata {
    let mut metadata = Metadata::new();
    let Some(info) = line.strip_prefix("#EXTINF:") else {
        return metadata;
    };

    let (duration, title) = match info.split_once(',') {
        Some((d, t)) => (d, t.trim()),
        None => (info, ""),
    };

    // Les attributs éventuels (tvg-id="..." etc.) suivent la durée
    let duration = duration.split_whitespace().next().unwrap_or("");
    if let Ok(secs) = duration.parse::<f64>() {
        if secs > 0.0 {
            metadata.insert("duration".to_string(), duration.to_string());
        }
    }
    if !title.is_empty() {
        metadata.insert("title".to_string(), title.to_string());
    }
    metadata
}

impl PlaylistParser for M3uParser {
    fn parse(&self, mime: Option<&str>, text: &str) -> Result<Vec<(Metadata, String)>> {
        if let Some(mime) = mime {
            let normalized = mime.trim().to_ascii_lowercase();
            if !M3U_MIME_TYPES.contains(&normalized.as_str()) {
                return Err(Error::UnsupportedFormat(mime.to_string()));
            }
        }

        let mut entries = Vec::new();
        let mut pending = Metadata::new();

        for line in text.lines() {
            let line = line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() {
                continue;
            }
            if line.starts_with("#EXTINF:") {
                pending = parse_extinf(line);
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            entries.push((std::mem::take(&mut pending), line.to_string()));
        }

        Ok(entries)
    }
}
