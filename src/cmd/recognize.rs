//! The `recognize` subcommand.
//!
//! This is the adapter between the pure [`UploadWorkflow`] state machine and
//! the real world: it reads files, decodes preview metadata, performs the
//! HTTP calls, and renders results and notices. Images run through the
//! workflow strictly one at a time, so at most one recognition request is
//! ever in flight.

use std::{collections::VecDeque, io::Cursor};

use clap::Args;
use image::ImageReader;
use indicatif::ProgressBar;
use tokio::fs;

use crate::{
    client::RecognitionClient,
    cmd::ServerOpts,
    output,
    prelude::*,
    ui::{ProgressConfig, Ui},
    workflow::{Effect, FileCandidate, Notice, UploadWorkflow},
};

/// Options for the `recognize` subcommand.
#[derive(Debug, Clone, Args)]
pub struct RecognizeOpts {
    /// Image files to recognize.
    #[clap(required = true)]
    paths: Vec<PathBuf>,

    #[clap(flatten)]
    server: ServerOpts,

    /// Write the recognized text to this file instead of printing it.
    #[clap(short = 'o', long = "output", value_name = "PATH")]
    output_path: Option<PathBuf>,

    /// Write the recognized text to `recognized_text.txt`.
    #[clap(long, conflicts_with = "output_path")]
    save: bool,

    /// Copy the recognized text to the system clipboard.
    #[clap(long)]
    copy: bool,
}

impl RecognizeOpts {
    /// Will recognized text be printed to stdout?
    pub fn using_stdout_for_output(&self) -> bool {
        self.output_path.is_none() && !self.save
    }

    /// Where to save recognized text, if anywhere.
    fn save_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.output_path {
            Some(path.clone())
        } else if self.save {
            Some(PathBuf::from(output::DEFAULT_SAVE_NAME))
        } else {
            None
        }
    }
}

/// Run the `recognize` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_recognize(ui: Ui, opts: &RecognizeOpts) -> Result<()> {
    if opts.paths.len() > 1 && (opts.save_path().is_some() || opts.copy) {
        return Err(anyhow!(
            "--output, --save and --copy work with a single image"
        ));
    }

    let client = opts.server.client()?;
    let mut workflow = UploadWorkflow::new();

    // Only show a progress bar when there's an actual batch to track.
    let pb = (opts.paths.len() > 1).then(|| {
        ui.new_progress_bar(
            &ProgressConfig {
                emoji: "✍️",
                msg: "Recognizing images",
            },
            opts.paths.len() as u64,
        )
    });

    let mut failed = 0;
    for path in &opts.paths {
        if !recognize_one(&ui, &client, &mut workflow, opts, path).await? {
            failed += 1;
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = &pb {
        pb.finish_with_message("Recognized images");
    }

    if failed > 0 {
        return Err(anyhow!(
            "failed to recognize {} of {} images",
            failed,
            opts.paths.len()
        ));
    }
    Ok(())
}

/// Run a single image through the workflow: select, submit, deliver the
/// result, reset. Returns `true` if a result was produced.
///
/// Per-image failures are reported as notices and `false`; they never abort
/// the rest of a batch. Only failures of the output sinks are fatal.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
async fn recognize_one(
    ui: &Ui,
    client: &RecognitionClient,
    workflow: &mut UploadWorkflow,
    opts: &RecognizeOpts,
    path: &Path,
) -> Result<bool> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Could not read {:?}: {}", path, err);
            return Ok(false);
        }
    };
    let candidate = FileCandidate {
        name: file_name(path),
        mime_type: declared_mime_type(path, &bytes),
        bytes,
    };

    let effects = workflow.select_file(candidate);
    run_effects(ui, client, workflow, opts, effects).await?;
    if workflow.selected_file().is_none() {
        // Validation rejected the file. The notice has already been shown.
        return Ok(false);
    }

    let effects = workflow.submit();
    run_effects(ui, client, workflow, opts, effects).await?;
    let recognized = workflow.displayed_result().is_some();

    if workflow.has_unsaved_result() {
        warn!("Discarding a recognition result that was never saved");
    }
    let effects = workflow.reset();
    run_effects(ui, client, workflow, opts, effects).await?;
    Ok(recognized)
}

/// Carry out the effects returned by workflow transitions, feeding follow-up
/// events back into the workflow until the queue drains.
async fn run_effects(
    ui: &Ui,
    client: &RecognitionClient,
    workflow: &mut UploadWorkflow,
    opts: &RecognizeOpts,
    effects: Vec<Effect>,
) -> Result<()> {
    let mut queue = VecDeque::from(effects);
    let mut spinner: Option<ProgressBar> = None;
    while let Some(effect) = queue.pop_front() {
        match effect {
            Effect::ShowPreview { name, size } => {
                info!(%name, %size, "Selected image");
            }
            Effect::DecodeDimensions => {
                let Some(file) = workflow.selected_file() else {
                    continue;
                };
                match decode_dimensions(&file.bytes) {
                    Ok((width, height)) => {
                        queue.extend(workflow.dimensions_decoded(width, height));
                    }
                    Err(err) => debug!("Could not decode image dimensions: {err:#}"),
                }
            }
            Effect::ShowDimensions { width, height } => {
                info!("Image is {width} × {height} px");
            }
            Effect::ShowLoading => {
                spinner = Some(ui.new_spinner(&ProgressConfig {
                    emoji: "✍️",
                    msg: "Recognizing handwriting",
                }));
            }
            Effect::SendRequest => {
                let Some(file) = workflow.selected_file() else {
                    continue;
                };
                match client.predict(file).await {
                    Ok(response) => {
                        queue.extend(workflow.on_response(response.into()));
                    }
                    Err(err) => {
                        debug!("Transport failure: {err:#}");
                        queue.extend(workflow.on_transport_failure());
                    }
                }
            }
            Effect::ShowResult { text, cache_hit } => {
                if let Some(spinner) = spinner.take() {
                    spinner.finish_and_clear();
                }
                if cache_hit {
                    info!("Result served from the service's cache");
                }
                deliver_result(ui, workflow, opts, &text).await?;
            }
            Effect::ShowUpload => {
                if let Some(spinner) = spinner.take() {
                    spinner.finish_and_clear();
                }
            }
            Effect::Notify(notice) => match &notice {
                Notice::RecognitionComplete => info!("{}", notice.message()),
                _ => warn!("{}", notice.message()),
            },
        }
    }
    Ok(())
}

/// Hand the recognized text to the configured sinks, and mark the result
/// saved so it isn't flagged as discarded later.
async fn deliver_result(
    ui: &Ui,
    workflow: &mut UploadWorkflow,
    opts: &RecognizeOpts,
    text: &str,
) -> Result<()> {
    if let Some(path) = opts.save_path() {
        output::save_text(&path, text).await?;
        info!("Recognized text written to {:?}", path);
    } else {
        ui.multi_progress().suspend(|| println!("{}", text));
    }
    if opts.copy {
        output::copy_to_clipboard(text)?;
        info!("Recognized text copied to the clipboard");
    }
    workflow.mark_result_saved();
    Ok(())
}

/// The file's display name.
fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// The declared MIME type for a local file: guessed from the extension,
/// falling back to content sniffing for files without a useful one.
fn declared_mime_type(path: &Path, bytes: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        return mime.to_owned();
    }
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_owned())
        .unwrap_or_else(|| "application/octet-stream".to_owned())
}

/// Decode just the pixel dimensions from an image blob. This reads only the
/// image header, so it stays cheap even for files near the size limit.
fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to probe image format")?
        .into_dimensions()
        .context("failed to decode image dimensions")
}
