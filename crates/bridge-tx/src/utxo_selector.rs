//! UTXO selection
//!
//! Picks inputs covering a set of per-asset targets while staying under an
//! input cap. Candidates are consumed in the order given; callers sort them
//! first (token-free outputs before token-carrying ones).

use std::collections::BTreeMap;

use bridge_core::{constants::LOVELACE, TxInputRef, Utxo};

// =============================================================================
// Error type
// =============================================================================

/// Error returned when UTXO selection cannot satisfy requirements
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// No window of at most `max_inputs` candidates covers `asset`
    #[error("Insufficient {asset}: need {required}, selected {available} within {max_inputs} inputs")]
    InsufficientFunds {
        asset: String,
        required: u64,
        available: u64,
        max_inputs: usize,
    },
}

// =============================================================================
// Selected inputs result
// =============================================================================

/// Result of UTXO selection
#[derive(Debug, Clone, Default)]
pub struct SelectedInputs {
    pub utxos: Vec<Utxo>,
    /// Per-asset totals of `utxos`; lovelace under [`LOVELACE`]
    pub sums: BTreeMap<String, u64>,
}

impl SelectedInputs {
    pub fn inputs(&self) -> Vec<TxInputRef> {
        self.utxos.iter().map(Utxo::input).collect()
    }

    pub fn total_lovelace(&self) -> u64 {
        self.sums.get(LOVELACE).copied().unwrap_or(0)
    }

    fn push(&mut self, utxo: &Utxo) {
        add_utxo_to_sums(&mut self.sums, utxo);
        self.utxos.push(utxo.clone());
    }

    /// Drop one input to get back under the cap.
    ///
    /// An input is kept when it carries a target token whose total would
    /// fall (or already is) below target without it. Among the rest, the one
    /// holding the least lovelace goes. If every input is kept that way, the
    /// least-lovelace input goes regardless.
    fn evict(&mut self, targets: &BTreeMap<String, u64>) {
        let unprotected = self
            .utxos
            .iter()
            .enumerate()
            .filter(|(_, utxo)| !self.holds_needed_token(utxo, targets))
            .min_by_key(|(_, utxo)| utxo.amount)
            .map(|(i, _)| i);

        let victim = unprotected.or_else(|| {
            self.utxos
                .iter()
                .enumerate()
                .min_by_key(|(_, utxo)| utxo.amount)
                .map(|(i, _)| i)
        });

        if let Some(i) = victim {
            let removed = self.utxos.remove(i);
            subtract_utxo_from_sums(&mut self.sums, &removed);
        }
    }

    fn holds_needed_token(&self, utxo: &Utxo, targets: &BTreeMap<String, u64>) -> bool {
        utxo.tokens.iter().any(|token| {
            let Some(required) = targets.get(&token.token_id) else {
                return false;
            };
            let total = self.sums.get(&token.token_id).copied().unwrap_or(0);
            token.amount > 0 && total.saturating_sub(token.amount) < *required
        })
    }

    /// First asset whose target is not met, with the shortfall details
    fn first_unmet<'a>(&self, targets: &'a BTreeMap<String, u64>) -> Option<(&'a str, u64)> {
        targets
            .iter()
            .find(|(asset, required)| self.sums.get(*asset).copied().unwrap_or(0) < **required)
            .map(|(asset, required)| (asset.as_str(), *required))
    }
}

// =============================================================================
// Sums
// =============================================================================

/// Add `utxo` (lovelace and tokens) to per-asset `sums`, saturating at `u64::MAX`
pub fn add_utxo_to_sums(sums: &mut BTreeMap<String, u64>, utxo: &Utxo) {
    let lovelace = sums.entry(LOVELACE.to_string()).or_insert(0);
    *lovelace = lovelace.saturating_add(utxo.amount);
    for token in &utxo.tokens {
        let total = sums.entry(token.token_id.clone()).or_insert(0);
        *total = total.saturating_add(token.amount);
    }
}

fn subtract_utxo_from_sums(sums: &mut BTreeMap<String, u64>, utxo: &Utxo) {
    if let Some(total) = sums.get_mut(LOVELACE) {
        *total = total.saturating_sub(utxo.amount);
    }
    for token in &utxo.tokens {
        if let Some(total) = sums.get_mut(&token.token_id) {
            *total = total.saturating_sub(token.amount);
        }
    }
    sums.retain(|asset, total| asset == LOVELACE || *total > 0);
}

/// Per-asset totals of a UTXO set
pub fn sum_utxos<'a>(utxos: impl IntoIterator<Item = &'a Utxo>) -> BTreeMap<String, u64> {
    let mut sums = BTreeMap::new();
    sums.insert(LOVELACE.to_string(), 0);
    for utxo in utxos {
        add_utxo_to_sums(&mut sums, utxo);
    }
    sums
}

// =============================================================================
// Selection functions
// =============================================================================

/// Select inputs covering every per-asset target in `targets`.
///
/// Candidates are added in order until all targets are met. Once more than
/// `max_inputs` are held, one input is dropped: never one that a token target
/// still depends on while another choice exists, otherwise the one holding
/// the least lovelace. The selection slides toward the largest outputs seen
/// so far.
pub fn select_utxos(
    utxos: &[Utxo],
    targets: &BTreeMap<String, u64>,
    max_inputs: usize,
) -> Result<SelectedInputs, SelectionError> {
    let max_inputs = max_inputs.max(1);
    let mut selected = SelectedInputs::default();
    selected.sums.insert(LOVELACE.to_string(), 0);

    if selected.first_unmet(targets).is_none() {
        return Ok(selected);
    }

    for utxo in utxos {
        selected.push(utxo);
        if selected.utxos.len() > max_inputs {
            selected.evict(targets);
        }

        if selected.first_unmet(targets).is_none() {
            return Ok(selected);
        }
    }

    let (asset, required) = selected
        .first_unmet(targets)
        .unwrap_or((LOVELACE, 0));
    Err(SelectionError::InsufficientFunds {
        asset: asset.to_string(),
        required,
        available: selected.sums.get(asset).copied().unwrap_or(0),
        max_inputs,
    })
}

/// Order candidates so token-free outputs come first, keeping relative order
pub fn sort_token_free_first(utxos: &mut [Utxo]) {
    utxos.sort_by_key(Utxo::has_tokens);
}
