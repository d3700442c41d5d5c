//! SelectionQueue : file des descripteurs en attente d'un ordonnanceur

use crate::item::ItemSpec;
use crate::shuffle::ShuffleMode;
use std::collections::VecDeque;

/// File de sélection avec l'instantané du dernier chargement
#[derive(Debug, Clone, Default)]
pub struct SelectionQueue {
    original: Vec<ItemSpec>,
    remaining: VecDeque<ItemSpec>,
}

impl SelectionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remplace le contenu après un chargement
    ///
    /// La transformation du mode (permutation éventuelle) est appliquée une
    /// seule fois ; le résultat devient à la fois la file et l'instantané.
    pub fn replace(&mut self, items: Vec<ItemSpec>, mode: ShuffleMode) {
        self.original = mode.on_load(items);
        self.remaining = self.original.iter().cloned().collect();
    }

    /// Restaure la file depuis l'instantané du chargement
    pub fn reset(&mut self) {
        self.remaining = self.original.iter().cloned().collect();
    }

    /// Choisit le prochain descripteur selon le mode
    ///
    /// En mode `Random` l'élément n'est pas retiré : la file ne se vide
    /// jamais par la seule sélection.
    pub fn pick(&mut self, mode: ShuffleMode) -> Option<ItemSpec> {
        let index = mode.pick_index(self.remaining.len())?;
        if mode.consumes() {
            self.remaining.remove(index)
        } else {
            self.remaining.get(index).cloned()
        }
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    /// Vrai si le dernier chargement n'a rien produit
    pub fn snapshot_is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Descripteurs restants, dans l'ordre
    pub fn pending(&self) -> impl Iterator<Item = &ItemSpec> {
        self.remaining.iter()
    }
}
