//! The upload/recognition workflow.
//!
//! This is the heart of the client: a small state machine that owns the
//! single "current file" slot and decides which panel of the interface is
//! showing. Transitions never perform I/O themselves. Instead, each event
//! returns a list of [`Effect`]s for the caller to carry out, which is what
//! lets us unit-test the whole contract without a server or a terminal.

use crate::validate::{self, ValidationError};

/// Which single panel the interface is currently presenting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Waiting for a file to be selected and submitted.
    Idle,
    /// Exactly one recognition request is in flight.
    Loading,
    /// A successful recognition result is on display.
    Result,
}

/// A candidate file, as picked by the user but not yet validated.
#[derive(Debug, Clone)]
pub struct FileCandidate {
    /// The file's name, for display and for the upload form.
    pub name: String,

    /// The declared MIME type. We trust the caller's declaration here;
    /// validation checks it against the allowed set.
    pub mime_type: String,

    /// The raw file contents.
    pub bytes: Vec<u8>,
}

/// A file accepted into the workflow's selection slot.
///
/// Replaced wholesale on every new selection, cleared on reset.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    /// The file's name.
    pub name: String,

    /// The declared MIME type.
    pub mime_type: String,

    /// The raw file contents.
    pub bytes: Vec<u8>,

    /// Pixel dimensions, once decoded from the blob. Decoding happens after
    /// acceptance, so this starts out `None`.
    pub dimensions: Option<(u32, u32)>,
}

impl SelectedFile {
    /// The file's size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// What the recognition service said about one submitted image.
#[derive(Debug, Clone)]
pub struct RecognitionOutcome {
    /// Did recognition succeed?
    pub success: bool,

    /// The recognized text, when `success` is true.
    pub text: Option<String>,

    /// Was this result served from the service's cache?
    pub cache_hit: bool,

    /// The service's error message, when `success` is false.
    pub error: Option<String>,
}

/// A successful result currently on display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayedResult {
    /// The recognized text.
    pub text: String,

    /// Whether the service flagged this as a cached result.
    pub cache_hit: bool,
}

/// A user-facing notice. These are non-fatal and delivered through a single
/// notification channel; none of them stop the user from trying again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The selected file is not an accepted image type.
    InvalidFileType,

    /// The selected file exceeds the size limit.
    FileTooLarge,

    /// Submit was requested with no file selected.
    NoFileSelected,

    /// Recognition finished and the result is on display.
    RecognitionComplete,

    /// The service answered, but reported a failure.
    RecognitionFailed(String),

    /// The service could not be reached, or sent back something unreadable.
    NetworkError,
}

/// Fallback message when the service reports a failure without saying why.
const GENERIC_PROCESSING_ERROR: &str = "Error processing image";

impl Notice {
    /// The message to show the user.
    pub fn message(&self) -> &str {
        match self {
            Notice::InvalidFileType => {
                "Please select a valid image file (PNG, JPG, JPEG, BMP)"
            }
            Notice::FileTooLarge => "File size must be less than 16MB",
            Notice::NoFileSelected => "Please select an image first",
            Notice::RecognitionComplete => "Recognition completed successfully!",
            Notice::RecognitionFailed(message) => message,
            Notice::NetworkError => "Network error. Please try again.",
        }
    }
}

impl From<ValidationError> for Notice {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidType => Notice::InvalidFileType,
            ValidationError::TooLarge => Notice::FileTooLarge,
        }
    }
}

/// An instruction returned by a transition for the adapter to carry out.
///
/// The workflow never renders, decodes, or sends anything itself. Whoever
/// drives it (the CLI, or a test) interprets these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Render preview metadata for the newly selected file.
    ShowPreview {
        /// File name to display.
        name: String,
        /// Human-readable size, e.g. "1.37 MB".
        size: String,
    },

    /// Decode pixel dimensions from the selected blob and report them back
    /// via [`UploadWorkflow::dimensions_decoded`].
    DecodeDimensions,

    /// Render the decoded pixel dimensions.
    ShowDimensions { width: u32, height: u32 },

    /// Present the loading panel.
    ShowLoading,

    /// Send the current selection to the recognition service, then report
    /// back via `on_response` or `on_transport_failure`.
    SendRequest,

    /// Present the result panel with the recognized text.
    ShowResult { text: String, cache_hit: bool },

    /// Return to the upload panel.
    ShowUpload,

    /// Deliver a notice to the user.
    Notify(Notice),
}

/// The workflow state machine.
///
/// Owns the selected file and the current view. Instances are independent,
/// so tests can construct as many as they like.
#[derive(Debug)]
pub struct UploadWorkflow {
    /// The current view.
    view: ViewState,

    /// The single selection slot.
    selected: Option<SelectedFile>,

    /// The result on display, present exactly when `view` is `Result`.
    result: Option<DisplayedResult>,

    /// Has the displayed result been persisted anywhere yet?
    result_saved: bool,
}

impl UploadWorkflow {
    /// Create a new workflow in the idle state with nothing selected.
    pub fn new() -> Self {
        Self {
            view: ViewState::Idle,
            selected: None,
            result: None,
            result_saved: false,
        }
    }

    /// The current view.
    pub fn view(&self) -> ViewState {
        self.view
    }

    /// The currently selected file, if any.
    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.selected.as_ref()
    }

    /// The result currently on display, if any.
    pub fn displayed_result(&self) -> Option<&DisplayedResult> {
        self.result.as_ref()
    }

    /// Is a result on display that has not been saved anywhere?
    ///
    /// Adapters should check this before discarding the workflow's state, so
    /// recognized text is never lost silently.
    pub fn has_unsaved_result(&self) -> bool {
        self.view == ViewState::Result && !self.result_saved
    }

    /// Record that the displayed result has been persisted somewhere.
    pub fn mark_result_saved(&mut self) {
        if self.result.is_some() {
            self.result_saved = true;
        }
    }

    /// Offer a candidate file for selection. Only meaningful while idle.
    ///
    /// On acceptance the previous selection (if any) is replaced and the
    /// adapter is asked to decode pixel dimensions from the blob. On
    /// rejection the state is left completely untouched.
    pub fn select_file(&mut self, candidate: FileCandidate) -> Vec<Effect> {
        if self.view != ViewState::Idle {
            return vec![];
        }

        if let Err(err) = validate::check(&candidate.mime_type, candidate.bytes.len())
        {
            return vec![Effect::Notify(err.into())];
        }

        let name = candidate.name.clone();
        let size = format_size(candidate.bytes.len() as u64);
        self.selected = Some(SelectedFile {
            name: candidate.name,
            mime_type: candidate.mime_type,
            bytes: candidate.bytes,
            dimensions: None,
        });
        vec![Effect::ShowPreview { name, size }, Effect::DecodeDimensions]
    }

    /// Record the pixel dimensions decoded from the selected blob.
    ///
    /// Ignored if the file was replaced or cleared since the decode started,
    /// or if dimensions were already recorded.
    pub fn dimensions_decoded(&mut self, width: u32, height: u32) -> Vec<Effect> {
        match &mut self.selected {
            Some(file) if file.dimensions.is_none() => {
                file.dimensions = Some((width, height));
                vec![Effect::ShowDimensions { width, height }]
            }
            _ => vec![],
        }
    }

    /// Submit the current selection for recognition.
    ///
    /// While a request is already in flight this is a no-op, which is what
    /// guarantees at most one outstanding request.
    pub fn submit(&mut self) -> Vec<Effect> {
        match self.view {
            ViewState::Loading | ViewState::Result => vec![],
            ViewState::Idle => {
                if self.selected.is_none() {
                    return vec![Effect::Notify(Notice::NoFileSelected)];
                }
                self.view = ViewState::Loading;
                vec![Effect::ShowLoading, Effect::SendRequest]
            }
        }
    }

    /// Handle a well-formed answer from the recognition service.
    ///
    /// A reported failure returns to idle with the service's own message, or
    /// a generic one if it didn't provide any.
    pub fn on_response(&mut self, outcome: RecognitionOutcome) -> Vec<Effect> {
        if self.view != ViewState::Loading {
            return vec![];
        }

        if outcome.success {
            let text = outcome.text.unwrap_or_default();
            let cache_hit = outcome.cache_hit;
            self.view = ViewState::Result;
            self.result = Some(DisplayedResult {
                text: text.clone(),
                cache_hit,
            });
            self.result_saved = false;
            vec![
                Effect::ShowResult { text, cache_hit },
                Effect::Notify(Notice::RecognitionComplete),
            ]
        } else {
            self.view = ViewState::Idle;
            let message = outcome
                .error
                .unwrap_or_else(|| GENERIC_PROCESSING_ERROR.to_owned());
            vec![
                Effect::ShowUpload,
                Effect::Notify(Notice::RecognitionFailed(message)),
            ]
        }
    }

    /// Handle a transport-level failure: the service was unreachable, or its
    /// answer could not be parsed. Distinct from a well-formed failure reply.
    pub fn on_transport_failure(&mut self) -> Vec<Effect> {
        if self.view != ViewState::Loading {
            return vec![];
        }
        self.view = ViewState::Idle;
        vec![Effect::ShowUpload, Effect::Notify(Notice::NetworkError)]
    }

    /// Clear the selection and any displayed result, returning to idle.
    /// Valid from any state.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.view = ViewState::Idle;
        self.selected = None;
        self.result = None;
        self.result_saved = false;
        vec![Effect::ShowUpload]
    }
}

impl Default for UploadWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a byte count the way the upload preview displays it, rounding to
/// at most two decimal places: "0 Bytes", "512 Bytes", "1.5 KB", "2 MB".
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_owned();
    }
    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = (bytes as f64 / 1024f64.powi(exp as i32) * 100.0).round() / 100.0;
    format!("{} {}", value, UNITS[exp])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, mime_type: &str, size: usize) -> FileCandidate {
        FileCandidate {
            name: name.to_owned(),
            mime_type: mime_type.to_owned(),
            bytes: vec![0u8; size],
        }
    }

    fn success_outcome(text: &str, cache_hit: bool) -> RecognitionOutcome {
        RecognitionOutcome {
            success: true,
            text: Some(text.to_owned()),
            cache_hit,
            error: None,
        }
    }

    #[test]
    fn rejects_disallowed_mime_type_without_touching_state() {
        let mut workflow = UploadWorkflow::new();
        let effects = workflow.select_file(candidate("notes.pdf", "application/pdf", 1024));
        assert_eq!(effects, vec![Effect::Notify(Notice::InvalidFileType)]);
        assert_eq!(workflow.view(), ViewState::Idle);
        assert!(workflow.selected_file().is_none());
    }

    #[test]
    fn rejection_leaves_previous_selection_in_place() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("first.png", "image/png", 100));
        workflow.select_file(candidate("second.gif", "image/gif", 100));
        assert_eq!(workflow.selected_file().unwrap().name, "first.png");
    }

    #[test]
    fn accepts_allowed_types_up_to_the_size_limit() {
        for mime_type in ["image/png", "image/jpeg", "image/jpg", "image/bmp"] {
            let mut workflow = UploadWorkflow::new();
            let effects = workflow.select_file(candidate("scan.img", mime_type, 2048));
            assert_eq!(
                effects,
                vec![
                    Effect::ShowPreview {
                        name: "scan.img".to_owned(),
                        size: "2 KB".to_owned(),
                    },
                    Effect::DecodeDimensions,
                ],
                "mime type {mime_type} should be accepted"
            );
            assert_eq!(workflow.selected_file().unwrap().size(), 2048);
        }
    }

    #[test]
    fn rejects_oversized_files_regardless_of_type() {
        let mut workflow = UploadWorkflow::new();
        let effects =
            workflow.select_file(candidate("huge.jpg", "image/jpeg", 20 * 1024 * 1024));
        assert_eq!(effects, vec![Effect::Notify(Notice::FileTooLarge)]);
        assert_eq!(workflow.view(), ViewState::Idle);
        assert!(workflow.selected_file().is_none());
    }

    #[test]
    fn accepts_a_file_of_exactly_the_size_limit() {
        let mut workflow = UploadWorkflow::new();
        let effects =
            workflow.select_file(candidate("edge.png", "image/png", 16 * 1024 * 1024));
        assert!(matches!(effects[0], Effect::ShowPreview { .. }));
    }

    #[test]
    fn dimensions_are_recorded_once() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        let effects = workflow.dimensions_decoded(640, 480);
        assert_eq!(effects, vec![Effect::ShowDimensions { width: 640, height: 480 }]);
        assert_eq!(workflow.selected_file().unwrap().dimensions, Some((640, 480)));

        // A stale second decode must not overwrite the recorded dimensions.
        assert!(workflow.dimensions_decoded(1, 1).is_empty());
        assert_eq!(workflow.selected_file().unwrap().dimensions, Some((640, 480)));
    }

    #[test]
    fn stale_dimension_decode_after_reset_is_ignored() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.reset();
        assert!(workflow.dimensions_decoded(640, 480).is_empty());
    }

    #[test]
    fn submit_without_a_selection_asks_for_one() {
        let mut workflow = UploadWorkflow::new();
        let effects = workflow.submit();
        assert_eq!(effects, vec![Effect::Notify(Notice::NoFileSelected)]);
        assert_eq!(workflow.view(), ViewState::Idle);
    }

    #[test]
    fn submit_is_idempotent_while_loading() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));

        let first = workflow.submit();
        let send_count = first
            .iter()
            .filter(|effect| **effect == Effect::SendRequest)
            .count();
        assert_eq!(send_count, 1);
        assert_eq!(workflow.view(), ViewState::Loading);

        // A second submit while the request is in flight does nothing.
        assert!(workflow.submit().is_empty());
        assert_eq!(workflow.view(), ViewState::Loading);
    }

    #[test]
    fn select_file_is_ignored_while_loading() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();
        assert!(
            workflow
                .select_file(candidate("other.png", "image/png", 200))
                .is_empty()
        );
        assert_eq!(workflow.selected_file().unwrap().name, "scan.png");
    }

    #[test]
    fn happy_path_shows_result_with_cache_indicator() {
        let mut workflow = UploadWorkflow::new();
        let effects =
            workflow.select_file(candidate("note.png", "image/png", 2 * 1024 * 1024));
        assert_eq!(
            effects[0],
            Effect::ShowPreview {
                name: "note.png".to_owned(),
                size: "2 MB".to_owned(),
            }
        );
        assert_eq!(workflow.view(), ViewState::Idle);

        workflow.submit();
        assert_eq!(workflow.view(), ViewState::Loading);

        let effects = workflow.on_response(success_outcome("Hello", true));
        assert_eq!(workflow.view(), ViewState::Result);
        assert_eq!(
            effects,
            vec![
                Effect::ShowResult {
                    text: "Hello".to_owned(),
                    cache_hit: true,
                },
                Effect::Notify(Notice::RecognitionComplete),
            ]
        );
        assert_eq!(
            workflow.displayed_result(),
            Some(&DisplayedResult {
                text: "Hello".to_owned(),
                cache_hit: true,
            })
        );
    }

    #[test]
    fn service_failure_returns_to_idle_with_the_service_message() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();

        let effects = workflow.on_response(RecognitionOutcome {
            success: false,
            text: None,
            cache_hit: false,
            error: Some("blurry image".to_owned()),
        });
        assert_eq!(workflow.view(), ViewState::Idle);
        assert_eq!(
            effects,
            vec![
                Effect::ShowUpload,
                Effect::Notify(Notice::RecognitionFailed("blurry image".to_owned())),
            ]
        );
    }

    #[test]
    fn service_failure_without_a_message_uses_the_generic_one() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();

        let effects = workflow.on_response(RecognitionOutcome {
            success: false,
            text: None,
            cache_hit: false,
            error: None,
        });
        assert_eq!(
            effects[1],
            Effect::Notify(Notice::RecognitionFailed(
                "Error processing image".to_owned()
            ))
        );
    }

    #[test]
    fn transport_failure_uses_the_network_notice_not_the_service_path() {
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();

        let effects = workflow.on_transport_failure();
        assert_eq!(workflow.view(), ViewState::Idle);
        assert_eq!(
            effects,
            vec![Effect::ShowUpload, Effect::Notify(Notice::NetworkError)]
        );
    }

    #[test]
    fn responses_are_ignored_unless_a_request_is_in_flight() {
        let mut workflow = UploadWorkflow::new();
        assert!(workflow.on_response(success_outcome("late", false)).is_empty());
        assert!(workflow.on_transport_failure().is_empty());
        assert_eq!(workflow.view(), ViewState::Idle);
    }

    #[test]
    fn reset_clears_everything_from_any_state() {
        // From the result view.
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();
        workflow.on_response(success_outcome("Hello", false));
        workflow.reset();
        assert_eq!(workflow.view(), ViewState::Idle);
        assert!(workflow.selected_file().is_none());
        assert!(workflow.displayed_result().is_none());

        // From the loading view.
        let mut workflow = UploadWorkflow::new();
        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();
        workflow.reset();
        assert_eq!(workflow.view(), ViewState::Idle);
        assert!(workflow.selected_file().is_none());
    }

    #[test]
    fn unsaved_result_tracking() {
        let mut workflow = UploadWorkflow::new();
        assert!(!workflow.has_unsaved_result());

        workflow.select_file(candidate("scan.png", "image/png", 100));
        workflow.submit();
        workflow.on_response(success_outcome("Hello", false));
        assert!(workflow.has_unsaved_result());

        workflow.mark_result_saved();
        assert!(!workflow.has_unsaved_result());

        workflow.reset();
        assert!(!workflow.has_unsaved_result());
    }

    #[test]
    fn format_size_matches_the_preview_display() {
        assert_eq!(format_size(0), "0 Bytes");
        assert_eq!(format_size(512), "512 Bytes");
        assert_eq!(format_size(1024), "1 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3 GB");
    }
}
