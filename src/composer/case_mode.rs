//! Case transforms applied to candidate display phrases

use serde::{Deserialize, Serialize};

use super::Candidate;
use crate::text::{capitalize_first, title_case};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseMode {
    /// As stored
    #[default]
    Orig,
    Capitalize,
    Title,
    Upper,
    Lower,
}

impl CaseMode {
    /// Next mode in the user-facing cycle orig -> capitalize -> upper ->
    /// lower -> orig. Title case is reachable only by setting it directly.
    pub fn next(self) -> Self {
        match self {
            CaseMode::Orig => CaseMode::Capitalize,
            CaseMode::Capitalize | CaseMode::Title => CaseMode::Upper,
            CaseMode::Upper => CaseMode::Lower,
            CaseMode::Lower => CaseMode::Orig,
        }
    }

    pub fn apply(self, phrase: &str) -> String {
        match self {
            CaseMode::Orig => phrase.to_string(),
            CaseMode::Capitalize => capitalize_first(phrase),
            CaseMode::Title => title_case(phrase),
            CaseMode::Upper => phrase.to_uppercase(),
            CaseMode::Lower => phrase.to_lowercase(),
        }
    }
}

/// Ranked candidates of one keystroke.
///
/// The untransformed candidates are kept so that changing the case mode
/// never needs another round trip through the store.
#[derive(Debug, Clone, Default)]
pub struct CandidateList {
    originals: Vec<Candidate>,
    candidates: Vec<Candidate>,
    case_mode: CaseMode,
    auto_selected: Option<usize>,
}

impl CandidateList {
    pub fn new(originals: Vec<Candidate>, case_mode: CaseMode, auto_select: bool) -> Self {
        let auto_selected = (auto_select && !originals.is_empty()).then_some(0);
        let mut list = Self {
            candidates: Vec::new(),
            originals,
            case_mode,
            auto_selected,
        };
        list.apply_case_mode();
        list
    }

    fn apply_case_mode(&mut self) {
        let mode = self.case_mode;
        self.candidates = self
            .originals
            .iter()
            .map(|candidate| {
                let mut shown = candidate.clone();
                if !candidate.is_emoji {
                    shown.phrase = mode.apply(&candidate.phrase);
                }
                shown
            })
            .collect();
    }

    /// Candidates with the case mode applied
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn originals(&self) -> &[Candidate] {
        &self.originals
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn case_mode(&self) -> CaseMode {
        self.case_mode
    }

    pub fn auto_selected(&self) -> Option<usize> {
        self.auto_selected
    }

    pub fn selected(&self) -> Option<&Candidate> {
        self.auto_selected.and_then(|i| self.candidates.get(i))
    }

    /// Candidates of page `index` (0-based)
    pub fn page(&self, index: usize, page_size: usize) -> &[Candidate] {
        let page_size = page_size.max(1);
        let start = index.saturating_mul(page_size).min(self.candidates.len());
        let end = start.saturating_add(page_size).min(self.candidates.len());
        &self.candidates[start..end]
    }

    pub fn set_case_mode(&mut self, mode: CaseMode) {
        self.case_mode = mode;
        self.apply_case_mode();
    }

    pub fn with_case_mode(mut self, mode: CaseMode) -> Self {
        self.set_case_mode(mode);
        self
    }

    /// Advance to the next case mode and return it
    pub fn cycle_case_mode(&mut self) -> CaseMode {
        self.set_case_mode(self.case_mode.next());
        self.case_mode
    }
}
