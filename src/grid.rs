//! Grid presenter: view model, event routing and HTML.
//!
//! [`GridView::build`] snapshots a manager into plain data: one tile per
//! occupied position, at most one "add" tile, a progress indicator and the
//! crop dialog when a session is live. Renderers turn that into Maud markup;
//! [`dispatch`] routes user gestures back to the manager.
//!
//! Drag indices are compact indices (occupied positions only), which is what
//! the manager's `reorder` takes, so no translation happens here.

use crate::crop::{CropKind, CropPhase};
use crate::imaging::{CropRect, ImageBackend};
use crate::manager::{AddOutcome, CommitOutcome, SlotManager, ValidationState};
use crate::types::Candidate;
use maud::{DOCTYPE, Markup, html};
use std::time::Instant;

const CSS: &str = include_str!("../static/grid.css");

/// Per-tile affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileAction {
    Remove,
    Crop,
    MakePrimary,
    Preview,
}

impl TileAction {
    pub fn name(self) -> &'static str {
        match self {
            Self::Remove => "remove",
            Self::Crop => "crop",
            Self::MakePrimary => "make-primary",
            Self::Preview => "preview",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Remove => "Remove",
            Self::Crop => "Crop",
            Self::MakePrimary => "Make main photo",
            Self::Preview => "View",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotTile {
    pub position: usize,
    pub name: String,
    pub preview_uri: Option<String>,
    pub is_primary: bool,
    pub draggable: bool,
    pub animating: bool,
    pub error: Option<String>,
    pub actions: Vec<TileAction>,
}

/// The empty tile that opens the file picker.
#[derive(Debug, Clone, PartialEq)]
pub struct AddTile {
    pub position: usize,
    /// Comma-separated MIME list for the picker's `accept`.
    pub accept: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub occupied: usize,
    pub max: usize,
    /// A crop commit is outstanding.
    pub busy: bool,
}

impl Progress {
    pub fn percent(&self) -> usize {
        if self.max == 0 {
            0
        } else {
            self.occupied * 100 / self.max
        }
    }

    pub fn label(&self) -> String {
        format!("{} / {} photos", self.occupied, self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CropDialogView {
    pub kind: CropKind,
    pub target: usize,
    pub source_name: String,
    pub preview_uri: Option<String>,
    pub zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub rotation: f32,
    pub aspect: (u32, u32),
    pub area: Option<CropRect>,
    pub can_commit: bool,
    pub committing: bool,
}

/// Everything the grid shows at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct GridView {
    pub tiles: Vec<SlotTile>,
    pub add_tile: Option<AddTile>,
    pub progress: Progress,
    pub crop: Option<CropDialogView>,
    pub validation: ValidationState,
}

impl GridView {
    pub fn build<B: ImageBackend>(manager: &SlotManager<B>, now: Instant) -> Self {
        let config = manager.config();
        let validation = manager.validation_state();
        let error_for = |position: usize| validation.errors.get(&position).cloned();

        let tiles: Vec<SlotTile> = manager
            .images()
            .iter()
            .enumerate()
            .map(|(position, image)| {
                let mut actions = vec![TileAction::Remove];
                if config.slots.enable_crop {
                    actions.push(TileAction::Crop);
                }
                if position != 0 && config.slots.enable_reorder {
                    actions.push(TileAction::MakePrimary);
                }
                actions.push(TileAction::Preview);
                SlotTile {
                    position,
                    name: image.name().to_string(),
                    preview_uri: manager.preview_uri(position).map(str::to_string),
                    is_primary: position == 0,
                    draggable: config.slots.enable_reorder,
                    animating: manager.is_animating(position, now),
                    error: error_for(position),
                    actions,
                }
            })
            .collect();

        let occupied = tiles.len();
        let add_tile = (occupied < manager.max_images()).then(|| AddTile {
            position: occupied,
            accept: config.validation.allowed_types.join(","),
            error: error_for(occupied),
        });

        let crop = manager.crop_session().map(|session| CropDialogView {
            kind: session.kind(),
            target: session.target(),
            source_name: session.source().name().to_string(),
            preview_uri: manager.crop_preview_uri().map(str::to_string),
            zoom: session.transform().zoom,
            min_zoom: config.crop.min_zoom,
            max_zoom: config.crop.max_zoom,
            rotation: session.transform().rotation_degrees,
            aspect: session.aspect(),
            area: session.area(),
            can_commit: manager.crop_phase() == CropPhase::Open && session.area().is_some(),
            committing: manager.crop_phase() == CropPhase::Committing,
        });

        Self {
            tiles,
            add_tile,
            progress: Progress {
                occupied,
                max: manager.max_images(),
                busy: manager.crop_phase() == CropPhase::Committing,
            },
            crop,
            validation,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// A user gesture on the grid or the crop dialog.
#[derive(Debug)]
pub enum GridEvent {
    FilesSelected(Vec<Candidate>),
    /// Drag finished; compact indices.
    DragEnd { from: usize, to: usize },
    Remove(usize),
    Crop(usize),
    MakePrimary(usize),
    Preview(usize),
    Zoom(f32),
    Rotate(f32),
    Pan(f32, f32),
    CropLayout,
    CropCommit,
    CropCancel,
}

/// What handling an event produced.
#[derive(Debug, PartialEq)]
pub enum Dispatched {
    Batch(AddOutcome),
    /// Whether the operation took effect.
    Applied(bool),
    PreviewUri(Option<String>),
    CropArea(Option<CropRect>),
    Commit(CommitOutcome),
}

/// Route one event to the manager.
pub fn dispatch<B: ImageBackend>(manager: &mut SlotManager<B>, event: GridEvent) -> Dispatched {
    log::trace!("grid event {event:?}");
    match event {
        GridEvent::FilesSelected(candidates) => Dispatched::Batch(manager.add_batch(candidates)),
        GridEvent::DragEnd { from, to } => Dispatched::Applied(manager.reorder(from, to)),
        GridEvent::Remove(position) => Dispatched::Applied(manager.remove_at(position)),
        GridEvent::Crop(position) => Dispatched::Applied(manager.open_crop_for(position)),
        GridEvent::MakePrimary(position) => Dispatched::Applied(manager.set_primary(position)),
        GridEvent::Preview(position) => {
            Dispatched::PreviewUri(manager.preview_uri(position).map(str::to_string))
        }
        GridEvent::Zoom(zoom) => Dispatched::Applied(manager.set_crop_zoom(zoom)),
        GridEvent::Rotate(degrees) => Dispatched::Applied(manager.set_crop_rotation(degrees)),
        GridEvent::Pan(x, y) => Dispatched::Applied(manager.set_crop_pan(x, y)),
        GridEvent::CropLayout => Dispatched::CropArea(manager.crop_layout()),
        GridEvent::CropCommit => Dispatched::Commit(manager.commit_crop()),
        GridEvent::CropCancel => Dispatched::Applied(manager.cancel_crop()),
    }
}

// ============================================================================
// HTML
// ============================================================================

pub fn render_progress(progress: &Progress) -> Markup {
    html! {
        div.slot-progress role="progressbar"
            aria-valuenow=(progress.occupied) aria-valuemin="0" aria-valuemax=(progress.max)
            aria-busy=[progress.busy.then_some("true")] {
            span.label { (progress.label()) }
            div.bar {
                div.fill style={ "width: " (progress.percent()) "%" } {}
            }
        }
    }
}

fn render_tile(tile: &SlotTile) -> Markup {
    let class = [
        Some("slot-tile"),
        tile.is_primary.then_some("primary"),
        tile.animating.then_some("animating"),
        tile.error.is_some().then_some("has-error"),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>()
    .join(" ");

    html! {
        div class=(class) data-position=(tile.position)
            draggable=[tile.draggable.then_some("true")] {
            @if let Some(uri) = &tile.preview_uri {
                img src=(uri) alt=(tile.name);
            }
            @if tile.is_primary {
                span.primary-badge { "Main" }
            }
            @if let Some(error) = &tile.error {
                span.slot-error title=(error) { (error) }
            }
            div.tile-actions {
                @for action in &tile.actions {
                    button type="button" data-action=(action.name()) data-position=(tile.position) {
                        (action.label())
                    }
                }
            }
        }
    }
}

fn render_add_tile(tile: &AddTile) -> Markup {
    html! {
        label.slot-tile.add-tile data-position=(tile.position) {
            input type="file" multiple accept=(tile.accept);
            span { "+ Add photo" }
            @if let Some(error) = &tile.error {
                span.slot-error { (error) }
            }
        }
    }
}

/// Tiles, add tile and the error list.
pub fn render_grid(view: &GridView) -> Markup {
    html! {
        section.slots {
            (render_progress(&view.progress))
            div.slot-grid {
                @for tile in &view.tiles {
                    (render_tile(tile))
                }
                @if let Some(add) = &view.add_tile {
                    (render_add_tile(add))
                }
            }
            @if view.validation.is_required_but_empty {
                p.slot-error { "Please add at least one photo." }
            }
            @if view.validation.has_errors {
                ul.slot-errors {
                    @for (position, reason) in &view.validation.errors {
                        li.slot-error data-position=(position) { (reason) }
                    }
                }
            }
        }
    }
}

/// The modal crop dialog.
pub fn render_crop_dialog(dialog: &CropDialogView) -> Markup {
    let title = match dialog.kind {
        CropKind::New => "Crop new photo",
        CropKind::Edit => "Edit photo",
    };
    html! {
        div.crop-dialog role="dialog" aria-modal="true" data-target=(dialog.target) {
            h2 { (title) }
            div.crop-stage {
                @if let Some(uri) = &dialog.preview_uri {
                    img src=(uri) alt=(dialog.source_name)
                        style={ "transform: rotate(" (dialog.rotation) "deg)" };
                }
                @if let Some(area) = dialog.area {
                    div.crop-frame
                        data-x=(area.x) data-y=(area.y)
                        data-width=(area.width) data-height=(area.height) {}
                }
            }
            label {
                "Zoom "
                input type="range" name="zoom" step="0.1"
                    min=(dialog.min_zoom) max=(dialog.max_zoom) value=(dialog.zoom);
            }
            label {
                "Rotate "
                input type="range" name="rotation" min="0" max="359" value=(dialog.rotation);
            }
            p.aspect { "Aspect " (dialog.aspect.0) ":" (dialog.aspect.1) }
            div.crop-buttons {
                button type="button" data-action="crop-cancel" { "Cancel" }
                button type="button" data-action="crop-commit"
                    disabled[!dialog.can_commit] {
                    @if dialog.committing { "Saving…" } @else { "Save" }
                }
            }
        }
    }
}

/// Standalone HTML document with the grid and, if open, the crop dialog.
pub fn render_page(view: &GridView, title: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (CSS) }
            }
            body {
                h1 { (title) }
                (render_grid(view))
                @if let Some(dialog) = &view.crop {
                    (render_crop_dialog(dialog))
                }
            }
        }
    }
}
