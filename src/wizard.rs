use serde::{Deserialize, Serialize};

use crate::capabilities::PlaceSuggestion;
use crate::feed::ReportCategory;
use crate::media::StagedPhoto;
use crate::ValidatedCoordinate;

/// Which step sequence and mandatory-field policy the wizard runs under.
///
/// This is configuration, not inference: the host picks a variant at
/// startup and the gating table below is the only place that branches
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WizardPolicy {
    /// Location → Description → Photo → Confirm.
    /// Description is mandatory, the photo is optional.
    #[default]
    FourStep,
    /// Location → Details → Confirm.
    /// A photo is mandatory, the description is optional.
    ThreeStep,
}

impl WizardPolicy {
    #[must_use]
    pub const fn steps(self) -> &'static [WizardStep] {
        match self {
            Self::FourStep => &[
                WizardStep::Location,
                WizardStep::Description,
                WizardStep::Photo,
                WizardStep::Confirm,
            ],
            Self::ThreeStep => &[
                WizardStep::Location,
                WizardStep::Details,
                WizardStep::Confirm,
            ],
        }
    }

    #[must_use]
    pub const fn description_required(self) -> bool {
        matches!(self, Self::FourStep)
    }

    #[must_use]
    pub const fn photo_required(self) -> bool {
        matches!(self, Self::ThreeStep)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Location,
    Description,
    Photo,
    /// Combined photo + description step of the three-step policy.
    Details,
    Confirm,
}

impl WizardStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Description => "description",
            Self::Photo => "photo",
            Self::Details => "details",
            Self::Confirm => "confirm",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Location => "Location",
            Self::Description => "Description",
            Self::Photo => "Photo",
            Self::Details => "Details",
            Self::Confirm => "Confirm",
        }
    }
}

/// Which source is authoritative for the final report location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DraftLocation {
    /// Captured from a map click when the wizard opened.
    Coordinates(ValidatedCoordinate),
    /// Free-text entry; `chosen` marks that the text is a canonical
    /// suggestion label rather than raw keystrokes.
    ManualText { text: String, chosen: bool },
}

impl DraftLocation {
    #[must_use]
    pub const fn is_manual(&self) -> bool {
        matches!(self, Self::ManualText { .. })
    }

    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        match self {
            Self::Coordinates(_) => true,
            Self::ManualText { text, .. } => !text.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    #[default]
    Idle,
    InFlight,
    Failed {
        message: String,
    },
}

impl SubmissionState {
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// The in-progress report, owned exclusively by the open wizard session.
///
/// Dropped whole on cancel/close/submit; nothing here ever leaks into the
/// feed except through `finalize` after a successful submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDraft {
    policy: WizardPolicy,
    step_index: usize,
    location: DraftLocation,
    /// Map-click coordinates remembered so the user can switch back from
    /// manual text entry.
    origin_coordinates: Option<ValidatedCoordinate>,
    category: ReportCategory,
    description: String,
    photo: Option<StagedPhoto>,
    /// Download URL of an already-uploaded photo; survives a failed
    /// document insert so a retry does not re-upload the blob.
    uploaded_photo_url: Option<String>,
    suggestions: Vec<PlaceSuggestion>,
    suggest_generation: u64,
    submission: SubmissionState,
}

impl ReportDraft {
    #[must_use]
    pub fn at_location(coordinates: ValidatedCoordinate, policy: WizardPolicy) -> Self {
        Self {
            policy,
            step_index: 0,
            location: DraftLocation::Coordinates(coordinates),
            origin_coordinates: Some(coordinates),
            category: ReportCategory::default(),
            description: String::new(),
            photo: None,
            uploaded_photo_url: None,
            suggestions: Vec::new(),
            suggest_generation: 0,
            submission: SubmissionState::Idle,
        }
    }

    /// Open without a map click; location starts in manual-text mode.
    #[must_use]
    pub fn blank(policy: WizardPolicy) -> Self {
        Self {
            policy,
            step_index: 0,
            location: DraftLocation::ManualText {
                text: String::new(),
                chosen: false,
            },
            origin_coordinates: None,
            category: ReportCategory::default(),
            description: String::new(),
            photo: None,
            uploaded_photo_url: None,
            suggestions: Vec::new(),
            suggest_generation: 0,
            submission: SubmissionState::Idle,
        }
    }

    #[must_use]
    pub const fn policy(&self) -> WizardPolicy {
        self.policy
    }

    #[must_use]
    pub fn step(&self) -> WizardStep {
        // step_index is kept within bounds by advance/retreat.
        self.policy.steps()[self.step_index]
    }

    #[must_use]
    pub const fn step_index(&self) -> usize {
        self.step_index
    }

    #[must_use]
    pub const fn is_first_step(&self) -> bool {
        self.step_index == 0
    }

    #[must_use]
    pub fn is_terminal_step(&self) -> bool {
        self.step_index + 1 == self.policy.steps().len()
    }

    #[must_use]
    pub fn step_satisfied(&self, step: WizardStep) -> bool {
        match step {
            WizardStep::Location => self.location.is_satisfied(),
            WizardStep::Description => !self.description.trim().is_empty(),
            WizardStep::Photo | WizardStep::Confirm => true,
            WizardStep::Details => self.photo.is_some(),
        }
    }

    /// Pure gate for leaving the current step (or submitting, on the
    /// terminal step). Never mutates.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        self.step_satisfied(self.step())
    }

    /// Every mandatory field of every step of the active policy.
    #[must_use]
    pub fn mandatory_satisfied(&self) -> bool {
        self.policy
            .steps()
            .iter()
            .all(|step| self.step_satisfied(*step))
    }

    /// Move to the next step. Returns false (and changes nothing) when the
    /// gate refuses, the draft is already on the terminal step, or a
    /// submission is in flight.
    pub fn advance(&mut self) -> bool {
        if self.submission.is_in_flight() {
            return false;
        }
        if self.is_terminal_step() || !self.can_advance() {
            return false;
        }
        self.step_index += 1;
        true
    }

    /// Move to the previous step. Returns false on the first step or while
    /// a submission is in flight.
    pub fn retreat(&mut self) -> bool {
        if self.submission.is_in_flight() || self.is_first_step() {
            return false;
        }
        self.step_index -= 1;
        true
    }

    #[must_use]
    pub const fn location(&self) -> &DraftLocation {
        &self.location
    }

    /// Switch between map-click coordinates and manual text entry.
    /// Switching back to coordinates requires the wizard to have been
    /// opened from a map click.
    pub fn toggle_location_mode(&mut self) -> bool {
        if self.location.is_manual() {
            match self.origin_coordinates {
                Some(coordinates) => {
                    self.location = DraftLocation::Coordinates(coordinates);
                    self.suggestions.clear();
                    true
                }
                None => false,
            }
        } else {
            self.location = DraftLocation::ManualText {
                text: String::new(),
                chosen: false,
            };
            true
        }
    }

    /// Record a keystroke in the manual location field. Bumps the
    /// suggestion generation (superseding any in-flight lookup) and
    /// returns the new generation, or None when not in manual mode.
    pub fn set_manual_text(&mut self, text: impl Into<String>) -> Option<u64> {
        let DraftLocation::ManualText { .. } = self.location else {
            return None;
        };
        self.location = DraftLocation::ManualText {
            text: text.into(),
            chosen: false,
        };
        self.suggestions.clear();
        self.suggest_generation += 1;
        Some(self.suggest_generation)
    }

    #[must_use]
    pub const fn suggest_generation(&self) -> u64 {
        self.suggest_generation
    }

    #[must_use]
    pub fn manual_text(&self) -> Option<&str> {
        match &self.location {
            DraftLocation::ManualText { text, .. } => Some(text),
            DraftLocation::Coordinates(_) => None,
        }
    }

    pub fn set_suggestions(&mut self, suggestions: Vec<PlaceSuggestion>) {
        self.suggestions = suggestions;
    }

    #[must_use]
    pub fn suggestions(&self) -> &[PlaceSuggestion] {
        &self.suggestions
    }

    /// Adopt a suggestion's canonical label as the location text and
    /// clear the list.
    pub fn choose_suggestion(&mut self, index: usize) -> bool {
        if !self.location.is_manual() {
            return false;
        }
        let Some(suggestion) = self.suggestions.get(index) else {
            return false;
        };
        self.location = DraftLocation::ManualText {
            text: suggestion.label.clone(),
            chosen: true,
        };
        self.suggestions.clear();
        self.suggest_generation += 1;
        true
    }

    pub fn set_description(&mut self, text: impl Into<String>) {
        self.description = text.into();
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_category(&mut self, category: ReportCategory) {
        self.category = category;
    }

    #[must_use]
    pub const fn category(&self) -> ReportCategory {
        self.category
    }

    /// Attach an image, replacing any previous one. A stale upload URL is
    /// discarded so the new bytes get their own upload.
    pub fn attach_photo(&mut self, photo: StagedPhoto) {
        self.photo = Some(photo);
        self.uploaded_photo_url = None;
    }

    pub fn clear_photo(&mut self) {
        self.photo = None;
        self.uploaded_photo_url = None;
    }

    #[must_use]
    pub const fn photo(&self) -> Option<&StagedPhoto> {
        self.photo.as_ref()
    }

    #[must_use]
    pub fn uploaded_photo_url(&self) -> Option<&str> {
        self.uploaded_photo_url.as_deref()
    }

    pub fn set_uploaded_photo_url(&mut self, url: impl Into<String>) {
        self.uploaded_photo_url = Some(url.into());
    }

    #[must_use]
    pub const fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    /// Submit is reachable iff the draft sits on the terminal step, every
    /// mandatory field has been satisfied, and no submission is in flight.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.is_terminal_step() && self.mandatory_satisfied() && !self.submission.is_in_flight()
    }

    /// Flip into the in-flight state. Refused (false) unless `can_submit`.
    pub fn begin_submission(&mut self) -> bool {
        if !self.can_submit() {
            return false;
        }
        self.submission = SubmissionState::InFlight;
        true
    }

    /// Terminal failure outcome: draft stays intact on the confirm step
    /// and the user may retry.
    pub fn submission_failed(&mut self, message: impl Into<String>) {
        self.submission = SubmissionState::Failed {
            message: message.into(),
        };
    }

    /// Package the draft into the submission payload. The photo bytes
    /// travel separately (they go to blob storage, not the document).
    #[must_use]
    pub fn finalize(&self) -> ReportPayload {
        let (location, location_text) = match &self.location {
            DraftLocation::Coordinates(coordinates) => (Some(*coordinates), None),
            DraftLocation::ManualText { text, .. } => (None, Some(text.trim().to_string())),
        };

        ReportPayload {
            category: self.category,
            description: self.description.trim().to_string(),
            location,
            location_text,
            has_photo: self.photo.is_some(),
        }
    }
}

/// The report-shaped payload handed to the feed's submission collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub category: ReportCategory,
    pub description: String,
    pub location: Option<ValidatedCoordinate>,
    pub location_text: Option<String>,
    pub has_photo: bool,
}
