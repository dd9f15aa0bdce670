use shared::domain::CandidateDiagnosis;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSelection {
    candidates: Vec<CandidateDiagnosis>,
    selected: Option<String>,
}

impl CandidateSelection {
    pub fn new(candidates: Vec<CandidateDiagnosis>) -> Self {
        let mut selection = Self::default();
        selection.replace(candidates);
        selection
    }

    pub fn replace(&mut self, candidates: Vec<CandidateDiagnosis>) {
        self.selected = candidates.first().map(|c| c.disease.clone());
        self.candidates = candidates;
    }

    /// Returns `false` and leaves the selection untouched when `disease` is
    /// not in the current list.
    pub fn select(&mut self, disease: &str) -> bool {
        match self.candidates.iter().find(|c| c.disease == disease) {
            Some(candidate) => {
                self.selected = Some(candidate.disease.clone());
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> Option<&CandidateDiagnosis> {
        let selected = self.selected.as_deref()?;
        self.candidates.iter().find(|c| c.disease == selected)
    }

    pub fn selected_disease(&self) -> Option<&str> {
        self.current().map(|c| c.disease.as_str())
    }

    pub fn candidates(&self) -> &[CandidateDiagnosis] {
        &self.candidates
    }
}
