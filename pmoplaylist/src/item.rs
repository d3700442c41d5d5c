//! ItemSpec : descripteur non résolu d'un élément à jouer
//!
//! Un `ItemSpec` est produit par le chargeur de playlist (ou par un `push`)
//! et n'est transformé en [`ItemHandle`](crate::ItemHandle) qu'au moment de
//! la sélection. Les métadonnées survivent à la sérialisation grâce à la
//! forme `annotate:` :
//!
//! ```text
//! annotate:artist="Miles Davis",title="So What":/music/so_what.flac
//! ```

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Préfixe des URI annotées
pub const ANNOTATE_PREFIX: &str = "annotate:";

/// Métadonnées associées à un élément (clés triées)
pub type Metadata = BTreeMap<String, String>;

/// Descripteur immuable d'un élément de playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    uri: String,
    metadata: Metadata,
}

impl ItemSpec {
    /// Crée un descripteur sans métadonnées
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            metadata: Metadata::new(),
        }
    }

    /// Crée un descripteur avec métadonnées
    pub fn with_metadata(uri: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            uri: uri.into(),
            metadata,
        }
    }

    /// URI nue (sans annotation)
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Valeur d'une métadonnée
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Sérialise le descripteur en URI simple
    ///
    /// Sans métadonnées, l'URI est retournée telle quelle. Sinon elle est
    /// préfixée par `annotate:k="v",...:`.
    pub fn to_uri(&self) -> String {
        if self.metadata.is_empty() {
            return self.uri.clone();
        }

        let pairs: Vec<String> = self
            .metadata
            .iter()
            .map(|(key, value)| format!("{}=\"{}\"", key, escape(value)))
            .collect();

        format!("{}{}:{}", ANNOTATE_PREFIX, pairs.join(","), self.uri)
    }

    /// Décode une URI, annotée ou non
    pub fn parse(input: &str) -> Result<Self> {
        let Some(rest) = input.strip_prefix(ANNOTATE_PREFIX) else {
            return Ok(Self::new(input));
        };

        let (metadata, uri) = parse_annotation(rest)?;
        if uri.is_empty() {
            return Err(Error::InvalidAnnotation(format!("missing uri in {input}")));
        }

        Ok(Self::with_metadata(uri, metadata))
    }
}

impl fmt::Display for ItemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

impl FromStr for ItemSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Lit `k1="v1",k2="v2":uri` et retourne (métadonnées, uri)
fn parse_annotation(rest: &str) -> Result<(Metadata, &str)> {
    let mut metadata = Metadata::new();

    if let Some(uri) = rest.strip_prefix(':') {
        return Ok((metadata, uri));
    }

    let invalid = || Error::InvalidAnnotation(rest.to_string());
    let mut chars = rest.char_indices().peekable();

    loop {
        // Clé jusqu'au '='
        let key_start = chars.peek().map(|(i, _)| *i).ok_or_else(invalid)?;
        let key_end = loop {
            match chars.next() {
                Some((i, '=')) => break i,
                Some((_, ':')) | Some((_, ',')) | None => return Err(invalid()),
                Some(_) => {}
            }
        };
        let key = rest[key_start..key_end].trim();
        if key.is_empty() {
            return Err(invalid());
        }

        // Valeur entre guillemets, avec échappements
        if !matches!(chars.next(), Some((_, '"'))) {
            return Err(invalid());
        }
        let mut value = String::new();
        loop {
            match chars.next() {
                Some((_, '\\')) => match chars.next() {
                    Some((_, c)) => value.push(c),
                    None => return Err(invalid()),
                },
                Some((_, '"')) => break,
                Some((_, c)) => value.push(c),
                None => return Err(invalid()),
            }
        }
        metadata.insert(key.to_string(), value);

        match chars.next() {
            Some((_, ',')) => continue,
            Some((i, ':')) => return Ok((metadata, &rest[i + 1..])),
            _ => return Err(invalid()),
        }
    }
}
